// src/services/performance.rs

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use futures::future::try_join_all;

use crate::{
    config::ScoringConfig,
    error::AppError,
    models::{
        attempt::Attempt,
        report::{ClassReport, PerformanceReport, TagAverage},
        topic::{Material, Topic},
    },
    repository::{AttemptStore, Directory, TopicCatalog},
    services::attempts_of_student,
};

/// Read-only aggregation of graded attempts into per-tag reports.
#[derive(Clone)]
pub struct PerformanceService {
    directory: Arc<dyn Directory>,
    store: Arc<dyn AttemptStore>,
    topics: Arc<dyn TopicCatalog>,
    scoring: ScoringConfig,
}

impl PerformanceService {
    pub fn new(
        directory: Arc<dyn Directory>,
        store: Arc<dyn AttemptStore>,
        topics: Arc<dyn TopicCatalog>,
        scoring: ScoringConfig,
    ) -> Self {
        Self {
            directory,
            store,
            topics,
            scoring,
        }
    }

    /// Builds a student's report: per-tag averages, weak points and
    /// remediation materials for the weak tags.
    pub async fn student_report(&self, student_id: i64) -> Result<PerformanceReport, AppError> {
        self.directory
            .find_student(student_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;

        let attempts = attempts_of_student(self.store.as_ref(), student_id).await?;
        let averages = self.tag_averages(&attempts).await?;
        let weak_points = weak_points(&averages, self.scoring.weak_point_threshold);

        let suggestions = if weak_points.is_empty() {
            Vec::new()
        } else {
            let weak_tags: Vec<String> = weak_points.iter().map(|w| w.tag.clone()).collect();
            let topics = self.topics.find_topics_by_any_tag(&weak_tags).await?;
            suggested_materials(&topics)
        };

        tracing::debug!(
            "Report for student {}: {} tags, {} weak, {} suggestions",
            student_id,
            averages.len(),
            weak_points.len(),
            suggestions.len()
        );

        Ok(PerformanceReport {
            student_id,
            threshold: self.scoring.weak_point_threshold,
            averages,
            weak_points,
            suggestions,
        })
    }

    /// Per-tag averages over every student enrolled in a class.
    pub async fn class_report(&self, class_id: i64) -> Result<ClassReport, AppError> {
        let members = self
            .directory
            .find_class_members(class_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Class not found".to_string()))?;

        let store = self.store.as_ref();
        let per_student =
            try_join_all(members.iter().map(|id| attempts_of_student(store, *id))).await?;
        let attempts: Vec<Attempt> = per_student.into_iter().flatten().collect();

        let averages = self.tag_averages(&attempts).await?;

        Ok(ClassReport {
            class_id,
            students: members.len(),
            averages,
        })
    }

    /// Emits one (tag, score) contribution per tag of each graded attempt's
    /// activity and averages them by tag.
    async fn tag_averages(&self, attempts: &[Attempt]) -> Result<Vec<TagAverage>, AppError> {
        let mut tags_by_activity: HashMap<i64, Vec<String>> = HashMap::new();
        let mut contributions = Vec::new();

        for attempt in attempts {
            let Some(score) = attempt.score else {
                continue;
            };

            if !tags_by_activity.contains_key(&attempt.activity_id) {
                let tags = match self.directory.find_activity(attempt.activity_id).await? {
                    Some(activity) => activity.tags,
                    None => {
                        tracing::warn!(
                            "Attempt {} references missing activity {}, skipping",
                            attempt.id,
                            attempt.activity_id
                        );
                        Vec::new()
                    }
                };
                tags_by_activity.insert(attempt.activity_id, tags);
            }

            let mut seen = HashSet::new();
            for tag in &tags_by_activity[&attempt.activity_id] {
                if seen.insert(tag.as_str()) {
                    contributions.push((tag.clone(), score));
                }
            }
        }

        Ok(average_by_tag(contributions))
    }
}

/// Arithmetic mean per tag, ordered by tag name.
pub fn average_by_tag(contributions: impl IntoIterator<Item = (String, f64)>) -> Vec<TagAverage> {
    let mut grouped: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    for (tag, score) in contributions {
        let entry = grouped.entry(tag).or_insert((0.0, 0));
        entry.0 += score;
        entry.1 += 1;
    }

    grouped
        .into_iter()
        .map(|(tag, (sum, count))| TagAverage {
            tag,
            average: sum / count as f64,
            attempts: count,
        })
        .collect()
}

/// Tags whose average is strictly below `threshold`.
pub fn weak_points(averages: &[TagAverage], threshold: f64) -> Vec<TagAverage> {
    averages
        .iter()
        .filter(|a| a.average < threshold)
        .cloned()
        .collect()
}

/// Materials of `topics`, deduplicated by id in first-seen order.
pub fn suggested_materials(topics: &[Topic]) -> Vec<Material> {
    let mut seen = HashSet::new();
    topics
        .iter()
        .flat_map(|topic| topic.materials.iter())
        .filter(|material| seen.insert(material.id))
        .cloned()
        .collect()
}
