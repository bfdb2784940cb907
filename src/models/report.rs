// src/models/report.rs

use serde::Serialize;

use crate::models::topic::Material;

/// Average score of every graded attempt whose activity carries `tag`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagAverage {
    pub tag: String,
    pub average: f64,
    /// Number of graded attempts that contributed to the average.
    pub attempts: usize,
}

/// Student-facing performance report. Derived on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub student_id: i64,
    pub threshold: f64,
    pub averages: Vec<TagAverage>,
    pub weak_points: Vec<TagAverage>,
    pub suggestions: Vec<Material>,
}

/// Instructor overview of a whole class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassReport {
    pub class_id: i64,
    pub students: usize,
    pub averages: Vec<TagAverage>,
}
