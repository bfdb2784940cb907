// src/repository/mod.rs

//! Contracts of the persistence collaborators the core depends on.
//!
//! The lifecycle manager and the report aggregator only talk to these traits.
//! `postgres` provides the production implementations.

pub mod postgres;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::{
    error::AppError,
    models::{
        activity::Activity,
        attempt::{Attempt, AttemptKind, AttemptPayload, NewAttempt},
        topic::Topic,
        user::Student,
    },
};

/// Work awaited after a store mutation is issued and before it commits.
/// An error rolls the mutation back.
pub type CommitHook<'a> = BoxFuture<'a, Result<(), AppError>>;

/// Identity lookups: students, activities and class rosters.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_student(&self, id: i64) -> Result<Option<Student>, AppError>;

    /// Returns the activity with questions, alternatives, tags and ceiling populated.
    async fn find_activity(&self, id: i64) -> Result<Option<Activity>, AppError>;

    /// Ids of the students enrolled in a class, or `None` for an unknown class.
    async fn find_class_members(&self, class_id: i64) -> Result<Option<Vec<i64>>, AppError>;
}

/// Durable storage for the three attempt tables.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Inserts `attempt` unless (student, activity) already holds `ceiling` attempts.
    ///
    /// The count and the insert must be atomic with respect to concurrent calls
    /// for the same (kind, student, activity).
    async fn insert_within_limit(
        &self,
        attempt: NewAttempt,
        ceiling: Option<u32>,
    ) -> Result<Attempt, AppError>;

    async fn count_by_student_and_activity(
        &self,
        kind: AttemptKind,
        student_id: i64,
        activity_id: i64,
    ) -> Result<i64, AppError>;

    async fn find_by_id(&self, kind: AttemptKind, id: i64) -> Result<Option<Attempt>, AppError>;

    async fn find_by_student(
        &self,
        kind: AttemptKind,
        student_id: i64,
    ) -> Result<Vec<Attempt>, AppError>;

    async fn find_by_activity(
        &self,
        kind: AttemptKind,
        activity_id: i64,
    ) -> Result<Vec<Attempt>, AppError>;

    /// Replaces the payload of an attempt owned by `student_id` that is still ungraded.
    ///
    /// Ownership and grading state are re-checked by the write itself:
    /// `AccessDenied` when either no longer holds, `NotFound` when the row is gone.
    async fn update_payload<'a>(
        &'a self,
        id: i64,
        student_id: i64,
        payload: &'a AttemptPayload,
        before_commit: Option<CommitHook<'a>>,
    ) -> Result<(), AppError>;

    /// Sets score and/or feedback, leaving absent fields and the payload untouched.
    /// Returns the attempt as stored afterwards.
    async fn record_grade(
        &self,
        kind: AttemptKind,
        id: i64,
        score: Option<f64>,
        feedback: Option<String>,
    ) -> Result<Attempt, AppError>;

    /// Deletes an attempt. With `owner` set, only an ungraded attempt of that
    /// student is removed, otherwise `AccessDenied`.
    async fn delete<'a>(
        &'a self,
        kind: AttemptKind,
        id: i64,
        owner: Option<i64>,
        before_commit: Option<CommitHook<'a>>,
    ) -> Result<(), AppError>;
}

/// Topic and material lookups used for remediation suggestions.
#[async_trait]
pub trait TopicCatalog: Send + Sync {
    /// Topics carrying at least one of `tags`, each with its materials.
    async fn find_topics_by_any_tag(&self, tags: &[String]) -> Result<Vec<Topic>, AppError>;
}
