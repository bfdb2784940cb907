// src/services/mod.rs

pub mod attempts;
pub mod grader;
pub mod performance;

use crate::{
    error::AppError,
    models::attempt::{Attempt, AttemptKind},
    repository::AttemptStore,
};

/// Collects a student's quiz, text and file attempts. No kind is skipped.
pub(crate) async fn attempts_of_student(
    store: &dyn AttemptStore,
    student_id: i64,
) -> Result<Vec<Attempt>, AppError> {
    let (quiz, text, file) = futures::try_join!(
        store.find_by_student(AttemptKind::Quiz, student_id),
        store.find_by_student(AttemptKind::Text, student_id),
        store.find_by_student(AttemptKind::File, student_id),
    )?;

    let mut attempts = quiz;
    attempts.extend(text);
    attempts.extend(file);
    Ok(attempts)
}
