// src/models/topic.rs

use serde::{Deserialize, Serialize};

/// A remediation resource attached to a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Material {
    pub id: i64,
    pub name: String,
    pub url: String,
}

/// A topic with its own tag set and materials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub name: String,
    pub tags: Vec<String>,
    pub materials: Vec<Material>,
}
