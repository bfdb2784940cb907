// src/services/attempts.rs

use std::sync::Arc;

use crate::{
    config::ScoringConfig,
    error::AppError,
    models::{
        activity::{Activity, ActivityConfig},
        attempt::{
            Attempt, AttemptKind, AttemptPayload, GradeAttemptRequest, NewAttempt, OwnerPatch,
            QuizResponse, QuizSubmission, UploadedFile,
        },
        user::Caller,
    },
    repository::{AttemptStore, Directory},
    services::{attempts_of_student, grader},
    storage::FileStorage,
    utils::html::clean_html,
};

/// Attempt lifecycle manager.
///
/// Creates, edits and deletes quiz, text and file attempts, enforcing attempt
/// ceilings, ownership and post-grading immutability.
#[derive(Clone)]
pub struct AttemptService {
    directory: Arc<dyn Directory>,
    store: Arc<dyn AttemptStore>,
    storage: Arc<dyn FileStorage>,
    scoring: ScoringConfig,
}

impl AttemptService {
    pub fn new(
        directory: Arc<dyn Directory>,
        store: Arc<dyn AttemptStore>,
        storage: Arc<dyn FileStorage>,
        scoring: ScoringConfig,
    ) -> Self {
        Self {
            directory,
            store,
            storage,
            scoring,
        }
    }

    /// Submits a quiz attempt. The attempt is graded immediately and is final for the student.
    pub async fn submit_quiz(
        &self,
        student_id: i64,
        activity_id: i64,
        responses: Vec<QuizResponse>,
    ) -> Result<QuizSubmission, AppError> {
        let activity = self
            .resolve(student_id, activity_id, AttemptKind::Quiz)
            .await?;
        self.ensure_below_ceiling(&activity, student_id).await?;

        let questions = match &activity.config {
            ActivityConfig::Quiz { questions, .. } => questions.as_slice(),
            _ => &[],
        };
        let grade = grader::grade(questions, &responses, self.scoring.max_score);

        let attempt = self
            .store
            .insert_within_limit(
                NewAttempt {
                    student_id,
                    activity_id,
                    payload: AttemptPayload::Quiz { responses },
                    score: Some(grade.score),
                },
                activity.attempt_ceiling(),
            )
            .await?;

        tracing::info!(
            "Student {} scored {:.2} on quiz {} ({}/{})",
            student_id,
            grade.score,
            activity_id,
            grade.correct_count,
            grade.total_questions
        );

        Ok(QuizSubmission {
            attempt,
            correct_count: grade.correct_count,
            total_questions: grade.total_questions,
        })
    }

    /// Submits a free-text attempt, left ungraded for an instructor.
    pub async fn submit_text(
        &self,
        student_id: i64,
        activity_id: i64,
        text: String,
    ) -> Result<Attempt, AppError> {
        let activity = self
            .resolve(student_id, activity_id, AttemptKind::Text)
            .await?;
        let text = validate_text(&activity, &text)?;
        self.ensure_below_ceiling(&activity, student_id).await?;

        let attempt = self
            .store
            .insert_within_limit(
                NewAttempt {
                    student_id,
                    activity_id,
                    payload: AttemptPayload::Text { text },
                    score: None,
                },
                activity.attempt_ceiling(),
            )
            .await?;

        tracing::info!(
            "Student {} submitted text attempt {} for activity {}",
            student_id,
            attempt.id,
            activity_id
        );
        Ok(attempt)
    }

    /// Submits a file attempt. The upload is stored first; if the record cannot
    /// be persisted the upload is removed again.
    pub async fn submit_file(
        &self,
        student_id: i64,
        activity_id: i64,
        file: UploadedFile,
    ) -> Result<Attempt, AppError> {
        let activity = self
            .resolve(student_id, activity_id, AttemptKind::File)
            .await?;
        validate_file(&activity, &file)?;
        self.ensure_below_ceiling(&activity, student_id).await?;

        let file_url = self.storage.store(file).await?;

        let inserted = self
            .store
            .insert_within_limit(
                NewAttempt {
                    student_id,
                    activity_id,
                    payload: AttemptPayload::File {
                        file_url: file_url.clone(),
                    },
                    score: None,
                },
                activity.attempt_ceiling(),
            )
            .await;

        match inserted {
            Ok(attempt) => {
                tracing::info!(
                    "Student {} submitted file attempt {} for activity {}",
                    student_id,
                    attempt.id,
                    activity_id
                );
                Ok(attempt)
            }
            Err(e) => {
                self.discard_upload(&file_url).await;
                Err(e)
            }
        }
    }

    /// Applies a student's edit to their own ungraded text or file attempt.
    pub async fn update_by_owner(
        &self,
        kind: AttemptKind,
        attempt_id: i64,
        student_id: i64,
        patch: OwnerPatch,
    ) -> Result<Attempt, AppError> {
        let mut attempt = self.find(kind, attempt_id).await?;

        if attempt.student_id != student_id {
            return Err(AppError::AccessDenied(
                "Only the author can edit this attempt".to_string(),
            ));
        }
        if attempt.is_graded() {
            return Err(AppError::AccessDenied(
                "Attempt has already been graded".to_string(),
            ));
        }

        match (attempt.kind(), patch) {
            (AttemptKind::Quiz, _) => Err(AppError::AccessDenied(
                "Quiz attempts cannot be edited".to_string(),
            )),
            (AttemptKind::Text, OwnerPatch { text: Some(text), .. }) => {
                let activity = self.activity_of(&attempt).await?;
                attempt.payload = AttemptPayload::Text {
                    text: validate_text(&activity, &text)?,
                };
                self.store
                    .update_payload(attempt_id, student_id, &attempt.payload, None)
                    .await?;

                tracing::info!("Student {} edited text attempt {}", student_id, attempt_id);
                Ok(attempt)
            }
            (AttemptKind::File, OwnerPatch { file: Some(file), .. }) => {
                let old_url = attempt.stored_file().unwrap_or_default().to_string();
                let activity = self.activity_of(&attempt).await?;
                validate_file(&activity, &file)?;

                let new_url = self.storage.store(file).await?;
                attempt.payload = AttemptPayload::File {
                    file_url: new_url.clone(),
                };

                // The old file goes inside the transaction; if that fails the
                // old reference stays authoritative and the new upload is dropped.
                let replaced = self
                    .store
                    .update_payload(
                        attempt_id,
                        student_id,
                        &attempt.payload,
                        Some(self.storage.delete(&old_url)),
                    )
                    .await;

                if let Err(e) = replaced {
                    tracing::warn!(
                        "Replacing file of attempt {} failed, keeping {}: {}",
                        attempt_id,
                        old_url,
                        e
                    );
                    self.discard_upload(&new_url).await;
                    return Err(e);
                }

                tracing::info!("Student {} replaced file of attempt {}", student_id, attempt_id);
                Ok(attempt)
            }
            // Nothing applicable in the patch.
            _ => Ok(attempt),
        }
    }

    /// Records an instructor's score and/or feedback on a text or file attempt.
    /// Scores are stored as given.
    pub async fn update_by_instructor(
        &self,
        kind: AttemptKind,
        attempt_id: i64,
        patch: GradeAttemptRequest,
    ) -> Result<Attempt, AppError> {
        let attempt = self.find(kind, attempt_id).await?;

        if attempt.kind() == AttemptKind::Quiz {
            return Err(AppError::BadRequest(
                "Quiz attempts are graded automatically".to_string(),
            ));
        }

        // Only score and feedback are written; the payload stays as the student left it.
        let feedback = patch.feedback.as_deref().map(clean_html);
        let attempt = self
            .store
            .record_grade(kind, attempt_id, patch.score, feedback)
            .await?;

        tracing::info!(
            "Graded {} attempt {} with score {:?}",
            kind.as_str(),
            attempt_id,
            attempt.score
        );
        Ok(attempt)
    }

    /// Deletes an attempt. Students may only delete their own ungraded attempts;
    /// instructors and admins may delete any attempt.
    ///
    /// For file attempts the stored file is removed before the deletion commits,
    /// and a storage failure keeps the record.
    pub async fn delete(
        &self,
        kind: AttemptKind,
        attempt_id: i64,
        caller: &Caller,
    ) -> Result<(), AppError> {
        let attempt = self.find(kind, attempt_id).await?;

        if !caller.is_privileged() {
            if attempt.student_id != caller.id {
                return Err(AppError::AccessDenied(
                    "Only the author can delete this attempt".to_string(),
                ));
            }
            if attempt.is_graded() {
                return Err(AppError::AccessDenied(
                    "Graded attempts cannot be deleted".to_string(),
                ));
            }
        }

        let remove_file = attempt.stored_file().map(|reference| self.storage.delete(reference));

        // The store re-checks ownership and grading state for students.
        let owner = (!caller.is_privileged()).then_some(caller.id);

        self.store
            .delete(kind, attempt_id, owner, remove_file)
            .await
            .map_err(|e| {
                tracing::warn!("Failed to delete {} attempt {}: {}", kind.as_str(), attempt_id, e);
                e
            })?;

        tracing::info!(
            "{} attempt {} deleted by {} {}",
            kind.as_str(),
            attempt_id,
            caller.role.as_str(),
            caller.id
        );
        Ok(())
    }

    /// Reads one attempt. Visible to its author and to privileged callers.
    pub async fn get(
        &self,
        kind: AttemptKind,
        attempt_id: i64,
        caller: &Caller,
    ) -> Result<Attempt, AppError> {
        let attempt = self.find(kind, attempt_id).await?;

        if !caller.is_privileged() && attempt.student_id != caller.id {
            return Err(AppError::AccessDenied(
                "This attempt belongs to another student".to_string(),
            ));
        }

        Ok(attempt)
    }

    /// Every attempt of a student across the three kinds, newest first.
    pub async fn list_for_student(&self, student_id: i64) -> Result<Vec<Attempt>, AppError> {
        self.directory
            .find_student(student_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;

        let mut attempts = attempts_of_student(self.store.as_ref(), student_id).await?;
        attempts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(attempts)
    }

    /// All attempts submitted to one activity.
    pub async fn list_for_activity(&self, activity_id: i64) -> Result<Vec<Attempt>, AppError> {
        let activity = self
            .directory
            .find_activity(activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Activity not found".to_string()))?;

        self.store.find_by_activity(activity.kind(), activity_id).await
    }

    async fn find(&self, kind: AttemptKind, attempt_id: i64) -> Result<Attempt, AppError> {
        self.store
            .find_by_id(kind, attempt_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} attempt not found", kind.as_str())))
    }

    /// Looks up both parties of a submission and checks the activity kind.
    async fn resolve(
        &self,
        student_id: i64,
        activity_id: i64,
        kind: AttemptKind,
    ) -> Result<Activity, AppError> {
        self.directory
            .find_student(student_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;

        let activity = self
            .directory
            .find_activity(activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Activity not found".to_string()))?;

        if activity.kind() != kind {
            return Err(AppError::BadRequest(format!(
                "Activity {} expects {} attempts, not {}",
                activity_id,
                activity.kind().as_str(),
                kind.as_str()
            )));
        }

        Ok(activity)
    }

    async fn activity_of(&self, attempt: &Attempt) -> Result<Activity, AppError> {
        self.directory
            .find_activity(attempt.activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Activity not found".to_string()))
    }

    /// Fails fast before any upload is stored. The store re-checks atomically on insert.
    async fn ensure_below_ceiling(&self, activity: &Activity, student_id: i64) -> Result<(), AppError> {
        let Some(limit) = activity.attempt_ceiling() else {
            return Ok(());
        };

        let existing = self
            .store
            .count_by_student_and_activity(activity.kind(), student_id, activity.id)
            .await?;

        if existing >= i64::from(limit) {
            tracing::warn!(
                "Student {} hit the attempt limit ({}) on activity {}",
                student_id,
                limit,
                activity.id
            );
            return Err(AppError::AttemptLimitExceeded { limit });
        }

        Ok(())
    }

    async fn discard_upload(&self, reference: &str) {
        if let Err(e) = self.storage.delete(reference).await {
            tracing::error!("Failed to remove orphaned upload {}: {}", reference, e);
        }
    }
}

/// Checks a text answer against the activity limits and returns the sanitised text.
fn validate_text(activity: &Activity, text: &str) -> Result<String, AppError> {
    if text.trim().is_empty() {
        return Err(AppError::BadRequest("Text answer cannot be empty".to_string()));
    }

    if let ActivityConfig::Text {
        max_chars: Some(max),
    } = activity.config
    {
        if text.chars().count() > max as usize {
            return Err(AppError::BadRequest(format!(
                "Text answer exceeds {} characters",
                max
            )));
        }
    }

    Ok(clean_html(text))
}

fn validate_file(activity: &Activity, file: &UploadedFile) -> Result<(), AppError> {
    if file.bytes.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
    }
    if !activity.accepts_file(&file.file_name) {
        return Err(AppError::BadRequest(format!(
            "'{}' is not an accepted file type for this activity",
            file.file_name
        )));
    }
    Ok(())
}
