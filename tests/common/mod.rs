// tests/common/mod.rs
//
// In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use assessment_backend::{
    config::{Config, ScoringConfig},
    error::AppError,
    models::{
        activity::{Activity, ActivityConfig, Alternative, Question},
        attempt::{Attempt, AttemptKind, AttemptPayload, NewAttempt, QuizResponse, UploadedFile},
        topic::{Material, Topic},
        user::Student,
    },
    repository::{AttemptStore, CommitHook, Directory, TopicCatalog},
    services::{attempts::AttemptService, performance::PerformanceService},
    state::AppState,
    storage::FileStorage,
};
use async_trait::async_trait;

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

#[derive(Default)]
pub struct MemoryDirectory {
    students: Mutex<HashMap<i64, Student>>,
    activities: Mutex<HashMap<i64, Activity>>,
    classes: Mutex<HashMap<i64, Vec<i64>>>,
}

impl MemoryDirectory {
    pub fn add_student(&self, id: i64) {
        self.students.lock().unwrap().insert(
            id,
            Student {
                id,
                name: format!("Student {}", id),
            },
        );
    }

    pub fn add_activity(&self, activity: Activity) {
        self.activities.lock().unwrap().insert(activity.id, activity);
    }

    pub fn add_class(&self, id: i64, members: &[i64]) {
        self.classes.lock().unwrap().insert(id, members.to_vec());
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn find_student(&self, id: i64) -> Result<Option<Student>, AppError> {
        Ok(self.students.lock().unwrap().get(&id).cloned())
    }

    async fn find_activity(&self, id: i64) -> Result<Option<Activity>, AppError> {
        Ok(self.activities.lock().unwrap().get(&id).cloned())
    }

    async fn find_class_members(&self, class_id: i64) -> Result<Option<Vec<i64>>, AppError> {
        Ok(self.classes.lock().unwrap().get(&class_id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryAttemptStore {
    rows: Mutex<Vec<Attempt>>,
    next_id: AtomicU64,
}

impl MemoryAttemptStore {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn get(&self, kind: AttemptKind, id: i64) -> Option<Attempt> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.kind() == kind && a.id == id)
            .cloned()
    }

    /// Sets a score directly, bypassing the service.
    pub fn set_score(&self, kind: AttemptKind, id: i64, score: f64) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|a| a.kind() == kind && a.id == id) {
            row.score = Some(score);
        }
    }

    /// Same conditions as the guarded SQL writes: the row must exist and, with
    /// `owner` set, belong to that student and still be ungraded.
    fn guard(&self, kind: AttemptKind, id: i64, owner: Option<i64>) -> Result<(), AppError> {
        let attempt = self
            .get(kind, id)
            .ok_or_else(|| AppError::NotFound("attempt not found".to_string()))?;

        match owner {
            Some(student_id) if attempt.student_id != student_id || attempt.is_graded() => Err(
                AppError::AccessDenied("attempt is graded or not owned".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn insert_within_limit(
        &self,
        attempt: NewAttempt,
        ceiling: Option<u32>,
    ) -> Result<Attempt, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let kind = attempt.kind();

        if let Some(limit) = ceiling {
            let existing = rows
                .iter()
                .filter(|a| {
                    a.kind() == kind
                        && a.student_id == attempt.student_id
                        && a.activity_id == attempt.activity_id
                })
                .count();
            if existing >= limit as usize {
                return Err(AppError::AttemptLimitExceeded { limit });
            }
        }

        let stored = Attempt {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1,
            student_id: attempt.student_id,
            activity_id: attempt.activity_id,
            created_at: chrono::Utc::now(),
            payload: attempt.payload,
            score: attempt.score,
            feedback: None,
        };
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn count_by_student_and_activity(
        &self,
        kind: AttemptKind,
        student_id: i64,
        activity_id: i64,
    ) -> Result<i64, AppError> {
        let count = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.kind() == kind && a.student_id == student_id && a.activity_id == activity_id)
            .count();
        Ok(count as i64)
    }

    async fn find_by_id(&self, kind: AttemptKind, id: i64) -> Result<Option<Attempt>, AppError> {
        Ok(self.get(kind, id))
    }

    async fn find_by_student(
        &self,
        kind: AttemptKind,
        student_id: i64,
    ) -> Result<Vec<Attempt>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.kind() == kind && a.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn find_by_activity(
        &self,
        kind: AttemptKind,
        activity_id: i64,
    ) -> Result<Vec<Attempt>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.kind() == kind && a.activity_id == activity_id)
            .cloned()
            .collect())
    }

    async fn update_payload<'a>(
        &'a self,
        id: i64,
        student_id: i64,
        payload: &'a AttemptPayload,
        before_commit: Option<CommitHook<'a>>,
    ) -> Result<(), AppError> {
        let kind = payload.kind();
        self.guard(kind, id, Some(student_id))?;
        if let Some(hook) = before_commit {
            hook.await?;
        }

        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|a| a.kind() == kind && a.id == id && a.student_id == student_id && a.score.is_none())
            .ok_or_else(|| AppError::AccessDenied("attempt changed concurrently".to_string()))?;
        row.payload = payload.clone();
        Ok(())
    }

    async fn record_grade(
        &self,
        kind: AttemptKind,
        id: i64,
        score: Option<f64>,
        feedback: Option<String>,
    ) -> Result<Attempt, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|a| a.kind() == kind && a.id == id)
            .ok_or_else(|| AppError::NotFound("attempt not found".to_string()))?;

        if score.is_some() {
            row.score = score;
        }
        if feedback.is_some() {
            row.feedback = feedback;
        }
        Ok(row.clone())
    }

    async fn delete<'a>(
        &'a self,
        kind: AttemptKind,
        id: i64,
        owner: Option<i64>,
        before_commit: Option<CommitHook<'a>>,
    ) -> Result<(), AppError> {
        self.guard(kind, id, owner)?;
        if let Some(hook) = before_commit {
            hook.await?;
        }

        self.rows
            .lock()
            .unwrap()
            .retain(|a| !(a.kind() == kind && a.id == id));
        Ok(())
    }
}

/// File storage kept in a map. Deletions can be switched to fail.
#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
    next_id: AtomicU64,
    fail_deletes: AtomicBool,
}

impl MemoryStorage {
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.files.lock().unwrap().contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn store(&self, file: UploadedFile) -> Result<String, AppError> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let reference = format!("/uploads/{}-{}", n, file.file_name);
        self.files
            .lock()
            .unwrap()
            .insert(reference.clone(), file.bytes);
        Ok(reference)
    }

    async fn delete(&self, reference: &str) -> Result<(), AppError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::StorageFailure("disk unavailable".to_string()));
        }
        self.files.lock().unwrap().remove(reference);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTopics {
    topics: Mutex<Vec<Topic>>,
}

impl MemoryTopics {
    pub fn add_topic(&self, id: i64, tags: &[&str], material_ids: &[i64]) {
        self.topics.lock().unwrap().push(Topic {
            id,
            name: format!("Topic {}", id),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            materials: material_ids.iter().map(|m| material(*m)).collect(),
        });
    }
}

#[async_trait]
impl TopicCatalog for MemoryTopics {
    async fn find_topics_by_any_tag(&self, tags: &[String]) -> Result<Vec<Topic>, AppError> {
        Ok(self
            .topics
            .lock()
            .unwrap()
            .iter()
            .filter(|topic| topic.tags.iter().any(|t| tags.contains(t)))
            .cloned()
            .collect())
    }
}

pub fn material(id: i64) -> Material {
    Material {
        id,
        name: format!("Material {}", id),
        url: format!("https://materials.example.com/{}", id),
    }
}

/// Every collaborator plus both services wired on top of them.
pub struct Harness {
    pub directory: Arc<MemoryDirectory>,
    pub store: Arc<MemoryAttemptStore>,
    pub storage: Arc<MemoryStorage>,
    pub topics: Arc<MemoryTopics>,
    pub scoring: ScoringConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_scoring(ScoringConfig::default())
    }

    pub fn with_scoring(scoring: ScoringConfig) -> Self {
        Self {
            directory: Arc::new(MemoryDirectory::default()),
            store: Arc::new(MemoryAttemptStore::default()),
            storage: Arc::new(MemoryStorage::default()),
            topics: Arc::new(MemoryTopics::default()),
            scoring,
        }
    }

    pub fn attempts(&self) -> AttemptService {
        AttemptService::new(
            self.directory.clone(),
            self.store.clone(),
            self.storage.clone(),
            self.scoring,
        )
    }

    pub fn reports(&self) -> PerformanceService {
        PerformanceService::new(
            self.directory.clone(),
            self.store.clone(),
            self.topics.clone(),
            self.scoring,
        )
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(
            test_config(self.scoring),
            self.directory.clone(),
            self.store.clone(),
            self.storage.clone(),
            self.topics.clone(),
        )
    }
}

pub fn test_config(scoring: ScoringConfig) -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        upload_dir: std::env::temp_dir()
            .join("assessment-backend-tests")
            .to_string_lossy()
            .into_owned(),
        upload_base_url: "/uploads".to_string(),
        scoring,
    }
}

/// Question `id` with alternatives `id*10 + 1` (correct) and `id*10 + 2`.
pub fn question(id: i64) -> Question {
    Question {
        id,
        statement: format!("Question {}", id),
        alternatives: vec![
            Alternative {
                id: id * 10 + 1,
                content: "Right".to_string(),
                correct: true,
            },
            Alternative {
                id: id * 10 + 2,
                content: "Wrong".to_string(),
                correct: false,
            },
        ],
    }
}

pub fn right(question_id: i64) -> QuizResponse {
    QuizResponse {
        question_id,
        alternative_id: question_id * 10 + 1,
    }
}

pub fn wrong(question_id: i64) -> QuizResponse {
    QuizResponse {
        question_id,
        alternative_id: question_id * 10 + 2,
    }
}

fn tags(names: &[&str]) -> Vec<String> {
    names.iter().map(|t| t.to_string()).collect()
}

/// Two-question quiz; questions are `id*100 + 1` and `id*100 + 2`.
pub fn quiz_activity(id: i64, tag_names: &[&str], max_attempts: Option<u32>) -> Activity {
    Activity {
        id,
        topic_id: 1,
        title: format!("Quiz {}", id),
        tags: tags(tag_names),
        config: ActivityConfig::Quiz {
            questions: vec![question(id * 100 + 1), question(id * 100 + 2)],
            max_attempts,
        },
    }
}

pub fn text_activity(id: i64, tag_names: &[&str], max_chars: Option<u32>) -> Activity {
    Activity {
        id,
        topic_id: 1,
        title: format!("Essay {}", id),
        tags: tags(tag_names),
        config: ActivityConfig::Text { max_chars },
    }
}

pub fn file_activity(id: i64, tag_names: &[&str], extensions: &[&str]) -> Activity {
    Activity {
        id,
        topic_id: 1,
        title: format!("Upload {}", id),
        tags: tags(tag_names),
        config: ActivityConfig::File {
            allowed_extensions: tags(extensions),
        },
    }
}

pub fn upload(name: &str) -> UploadedFile {
    UploadedFile {
        file_name: name.to_string(),
        content_type: Some("application/pdf".to_string()),
        bytes: b"%PDF-1.4 test".to_vec(),
    }
}
