// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use crate::models::activity::ActivityKind as AttemptKind;

/// A student's chosen alternative for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResponse {
    pub question_id: i64,
    pub alternative_id: i64,
}

/// Kind-specific content of an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AttemptPayload {
    Quiz { responses: Vec<QuizResponse> },
    Text { text: String },
    File { file_url: String },
}

impl AttemptPayload {
    pub fn kind(&self) -> AttemptKind {
        match self {
            AttemptPayload::Quiz { .. } => AttemptKind::Quiz,
            AttemptPayload::Text { .. } => AttemptKind::Text,
            AttemptPayload::File { .. } => AttemptKind::File,
        }
    }
}

/// Common envelope shared by quiz, text and file attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub student_id: i64,
    pub activity_id: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub payload: AttemptPayload,
    /// `None` until graded. Quiz attempts are scored on creation.
    pub score: Option<f64>,
    pub feedback: Option<String>,
}

impl Attempt {
    pub fn kind(&self) -> AttemptKind {
        self.payload.kind()
    }

    pub fn is_graded(&self) -> bool {
        self.score.is_some()
    }

    /// Reference of the backing file, for file attempts.
    pub fn stored_file(&self) -> Option<&str> {
        match &self.payload {
            AttemptPayload::File { file_url } => Some(file_url),
            _ => None,
        }
    }
}

/// An attempt that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub student_id: i64,
    pub activity_id: i64,
    pub payload: AttemptPayload,
    pub score: Option<f64>,
}

impl NewAttempt {
    pub fn kind(&self) -> AttemptKind {
        self.payload.kind()
    }
}

/// Raw upload handed to the storage collaborator.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    #[serde(default)]
    pub responses: Vec<QuizResponse>,
}

/// DTO for submitting a free-text attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitTextRequest {
    #[validate(length(min = 1, max = 100000))]
    pub text: String,
}

/// DTO for a student editing their own ungraded text attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTextRequest {
    #[validate(length(min = 1, max = 100000))]
    pub text: Option<String>,
}

/// DTO for an instructor grading a text or file attempt. Fields are optional.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct GradeAttemptRequest {
    pub score: Option<f64>,
    #[validate(length(max = 5000))]
    pub feedback: Option<String>,
}

/// Fields a student may change on their own attempt. Absent fields stay untouched.
#[derive(Debug, Default)]
pub struct OwnerPatch {
    pub text: Option<String>,
    pub file: Option<UploadedFile>,
}

/// Result of a quiz submission: the stored attempt plus grading counts.
#[derive(Debug, Serialize)]
pub struct QuizSubmission {
    #[serde(flatten)]
    pub attempt: Attempt,
    pub correct_count: usize,
    pub total_questions: usize,
}
