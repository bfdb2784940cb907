// src/repository/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgConnection, PgPool, types::Json};

use crate::{
    error::AppError,
    models::{
        activity::{Activity, ActivityConfig, ActivityKind, Alternative, Question},
        attempt::{Attempt, AttemptKind, AttemptPayload, NewAttempt, QuizResponse},
        topic::{Material, Topic},
        user::Student,
    },
    repository::{AttemptStore, CommitHook, Directory, TopicCatalog},
};

fn table(kind: AttemptKind) -> &'static str {
    match kind {
        AttemptKind::Quiz => "quiz_attempts",
        AttemptKind::Text => "text_attempts",
        AttemptKind::File => "file_attempts",
    }
}

/// Column list shared by every attempt query. The payload column of each
/// table is aliased so a single row type can decode all three.
fn returning(kind: AttemptKind) -> &'static str {
    match kind {
        AttemptKind::Quiz => {
            "id, student_id, activity_id, created_at, score, feedback, responses, NULL::TEXT AS body"
        }
        AttemptKind::Text => {
            "id, student_id, activity_id, created_at, score, feedback, NULL::JSONB AS responses, text AS body"
        }
        AttemptKind::File => {
            "id, student_id, activity_id, created_at, score, feedback, NULL::JSONB AS responses, file_url AS body"
        }
    }
}

/// Helper struct for decoding a row of any attempt table.
#[derive(FromRow)]
struct AttemptRow {
    id: i64,
    student_id: i64,
    activity_id: i64,
    created_at: chrono::DateTime<chrono::Utc>,
    score: Option<f64>,
    feedback: Option<String>,
    responses: Option<Json<Vec<QuizResponse>>>,
    body: Option<String>,
}

impl AttemptRow {
    fn into_attempt(self, kind: AttemptKind) -> Result<Attempt, AppError> {
        let payload = match (kind, self.responses, self.body) {
            (AttemptKind::Quiz, Some(Json(responses)), _) => AttemptPayload::Quiz { responses },
            (AttemptKind::Text, _, Some(text)) => AttemptPayload::Text { text },
            (AttemptKind::File, _, Some(file_url)) => AttemptPayload::File { file_url },
            _ => {
                return Err(AppError::InternalServerError(format!(
                    "{} row {} has no payload",
                    table(kind),
                    self.id
                )));
            }
        };

        Ok(Attempt {
            id: self.id,
            student_id: self.student_id,
            activity_id: self.activity_id,
            created_at: self.created_at,
            payload,
            score: self.score,
            feedback: self.feedback,
        })
    }
}

/// Attempt tables backed by PostgreSQL.
#[derive(Clone)]
pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_many(
        &self,
        kind: AttemptKind,
        column: &str,
        value: i64,
    ) -> Result<Vec<Attempt>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1 ORDER BY created_at DESC, id DESC",
            returning(kind),
            table(kind),
            column
        );

        let rows: Vec<AttemptRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list {}: {:?}", table(kind), e);
                AppError::from(e)
            })?;

        rows.into_iter().map(|row| row.into_attempt(kind)).collect()
    }
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn insert_within_limit(
        &self,
        attempt: NewAttempt,
        ceiling: Option<u32>,
    ) -> Result<Attempt, AppError> {
        let kind = attempt.kind();
        let mut tx = self.pool.begin().await?;

        // Serialise concurrent submissions for the same (kind, student, activity)
        // until this transaction ends.
        let lock_key = format!(
            "{}:{}:{}",
            kind.as_str(),
            attempt.student_id,
            attempt.activity_id
        );
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(lock_key)
            .execute(&mut *tx)
            .await?;

        if let Some(limit) = ceiling {
            let sql = format!(
                "SELECT COUNT(*) FROM {} WHERE student_id = $1 AND activity_id = $2",
                table(kind)
            );
            let existing: i64 = sqlx::query_scalar(&sql)
                .bind(attempt.student_id)
                .bind(attempt.activity_id)
                .fetch_one(&mut *tx)
                .await?;

            if existing >= i64::from(limit) {
                return Err(AppError::AttemptLimitExceeded { limit });
            }
        }

        let row: AttemptRow = match &attempt.payload {
            AttemptPayload::Quiz { responses } => {
                let sql = format!(
                    "INSERT INTO quiz_attempts (student_id, activity_id, responses, score) \
                     VALUES ($1, $2, $3, $4) RETURNING {}",
                    returning(kind)
                );
                sqlx::query_as(&sql)
                    .bind(attempt.student_id)
                    .bind(attempt.activity_id)
                    .bind(Json(responses))
                    .bind(attempt.score)
                    .fetch_one(&mut *tx)
                    .await?
            }
            AttemptPayload::Text { text } => {
                let sql = format!(
                    "INSERT INTO text_attempts (student_id, activity_id, text, score) \
                     VALUES ($1, $2, $3, $4) RETURNING {}",
                    returning(kind)
                );
                sqlx::query_as(&sql)
                    .bind(attempt.student_id)
                    .bind(attempt.activity_id)
                    .bind(text)
                    .bind(attempt.score)
                    .fetch_one(&mut *tx)
                    .await?
            }
            AttemptPayload::File { file_url } => {
                let sql = format!(
                    "INSERT INTO file_attempts (student_id, activity_id, file_url, score) \
                     VALUES ($1, $2, $3, $4) RETURNING {}",
                    returning(kind)
                );
                sqlx::query_as(&sql)
                    .bind(attempt.student_id)
                    .bind(attempt.activity_id)
                    .bind(file_url)
                    .bind(attempt.score)
                    .fetch_one(&mut *tx)
                    .await?
            }
        };

        tx.commit().await?;

        row.into_attempt(kind)
    }

    async fn count_by_student_and_activity(
        &self,
        kind: AttemptKind,
        student_id: i64,
        activity_id: i64,
    ) -> Result<i64, AppError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE student_id = $1 AND activity_id = $2",
            table(kind)
        );

        let count: i64 = sqlx::query_scalar(&sql)
            .bind(student_id)
            .bind(activity_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn find_by_id(&self, kind: AttemptKind, id: i64) -> Result<Option<Attempt>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            returning(kind),
            table(kind)
        );

        let row: Option<AttemptRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row.into_attempt(kind)).transpose()
    }

    async fn find_by_student(
        &self,
        kind: AttemptKind,
        student_id: i64,
    ) -> Result<Vec<Attempt>, AppError> {
        self.fetch_many(kind, "student_id", student_id).await
    }

    async fn find_by_activity(
        &self,
        kind: AttemptKind,
        activity_id: i64,
    ) -> Result<Vec<Attempt>, AppError> {
        self.fetch_many(kind, "activity_id", activity_id).await
    }

    async fn update_payload<'a>(
        &'a self,
        id: i64,
        student_id: i64,
        payload: &'a AttemptPayload,
        before_commit: Option<CommitHook<'a>>,
    ) -> Result<(), AppError> {
        let kind = payload.kind();
        let (column, value) = match payload {
            AttemptPayload::Text { text } => ("text", text),
            AttemptPayload::File { file_url } => ("file_url", file_url),
            AttemptPayload::Quiz { .. } => {
                return Err(AppError::AccessDenied(
                    "Quiz attempts cannot be edited".to_string(),
                ));
            }
        };

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE {} SET {} = $1 WHERE id = $2 AND student_id = $3 AND score IS NULL",
            table(kind),
            column
        );
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(id)
            .bind(student_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(guard_failure(&mut tx, kind, id).await);
        }

        // Dropping `tx` on error rolls the update back.
        if let Some(hook) = before_commit {
            hook.await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn record_grade(
        &self,
        kind: AttemptKind,
        id: i64,
        score: Option<f64>,
        feedback: Option<String>,
    ) -> Result<Attempt, AppError> {
        let sql = format!(
            "UPDATE {} SET score = COALESCE($1, score), feedback = COALESCE($2, feedback) \
             WHERE id = $3 RETURNING {}",
            table(kind),
            returning(kind)
        );

        let row: Option<AttemptRow> = sqlx::query_as(&sql)
            .bind(score)
            .bind(feedback)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| AppError::NotFound(format!("{} attempt not found", kind.as_str())))?
            .into_attempt(kind)
    }

    async fn delete<'a>(
        &'a self,
        kind: AttemptKind,
        id: i64,
        owner: Option<i64>,
        before_commit: Option<CommitHook<'a>>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let result = match owner {
            Some(student_id) => {
                let sql = format!(
                    "DELETE FROM {} WHERE id = $1 AND student_id = $2 AND score IS NULL",
                    table(kind)
                );
                sqlx::query(&sql)
                    .bind(id)
                    .bind(student_id)
                    .execute(&mut *tx)
                    .await?
            }
            None => {
                let sql = format!("DELETE FROM {} WHERE id = $1", table(kind));
                sqlx::query(&sql).bind(id).execute(&mut *tx).await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(guard_failure(&mut tx, kind, id).await);
        }

        if let Some(hook) = before_commit {
            hook.await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Explains a guarded write that matched no row: the attempt is either gone
/// or no longer owned and ungraded.
async fn guard_failure(conn: &mut PgConnection, kind: AttemptKind, id: i64) -> AppError {
    let sql = format!("SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)", table(kind));

    match sqlx::query_scalar::<_, bool>(&sql).bind(id).fetch_one(conn).await {
        Ok(true) => AppError::AccessDenied(format!(
            "{} attempt {} is graded or belongs to another student",
            kind.as_str(),
            id
        )),
        Ok(false) => AppError::NotFound(format!("{} attempt not found", kind.as_str())),
        Err(e) => e.into(),
    }
}

#[derive(FromRow)]
struct ActivityRow {
    id: i64,
    topic_id: i64,
    title: String,
    kind: String,
    max_attempts: Option<i32>,
    max_chars: Option<i32>,
    allowed_extensions: Json<Vec<String>>,
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    statement: String,
}

#[derive(FromRow)]
struct AlternativeRow {
    id: i64,
    question_id: i64,
    content: String,
    correct: bool,
}

/// Student, activity and class lookups backed by PostgreSQL.
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_questions(&self, activity_id: i64) -> Result<Vec<Question>, AppError> {
        let questions: Vec<QuestionRow> = sqlx::query_as(
            "SELECT id, statement FROM questions WHERE activity_id = $1 ORDER BY position, id",
        )
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await?;

        let alternatives: Vec<AlternativeRow> = sqlx::query_as(
            r#"
            SELECT a.id, a.question_id, a.content, a.correct
            FROM alternatives a
            JOIN questions q ON a.question_id = q.id
            WHERE q.activity_id = $1
            ORDER BY a.position, a.id
            "#,
        )
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_question: HashMap<i64, Vec<Alternative>> = HashMap::new();
        for alt in alternatives {
            by_question.entry(alt.question_id).or_default().push(Alternative {
                id: alt.id,
                content: alt.content,
                correct: alt.correct,
            });
        }

        Ok(questions
            .into_iter()
            .map(|q| Question {
                alternatives: by_question.remove(&q.id).unwrap_or_default(),
                id: q.id,
                statement: q.statement,
            })
            .collect())
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn find_student(&self, id: i64) -> Result<Option<Student>, AppError> {
        let student = sqlx::query_as::<_, Student>("SELECT id, name FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(student)
    }

    async fn find_activity(&self, id: i64) -> Result<Option<Activity>, AppError> {
        let row: Option<ActivityRow> = sqlx::query_as(
            r#"
            SELECT id, topic_id, title, kind, max_attempts, max_chars, allowed_extensions
            FROM activities
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let tags: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT t.name
            FROM activity_tags at
            JOIN tags t ON at.tag_id = t.id
            WHERE at.activity_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let kind = ActivityKind::parse(&row.kind).ok_or_else(|| {
            AppError::InternalServerError(format!("activity {} has unknown kind '{}'", id, row.kind))
        })?;

        let config = match kind {
            ActivityKind::Quiz => ActivityConfig::Quiz {
                questions: self.load_questions(id).await?,
                max_attempts: row.max_attempts.and_then(|n| u32::try_from(n).ok()),
            },
            ActivityKind::Text => ActivityConfig::Text {
                max_chars: row.max_chars.and_then(|n| u32::try_from(n).ok()),
            },
            ActivityKind::File => ActivityConfig::File {
                allowed_extensions: row.allowed_extensions.0,
            },
        };

        Ok(Some(Activity {
            id: row.id,
            topic_id: row.topic_id,
            title: row.title,
            tags,
            config,
        }))
    }

    async fn find_class_members(&self, class_id: i64) -> Result<Option<Vec<i64>>, AppError> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM classes WHERE id = $1")
            .bind(class_id)
            .fetch_optional(&self.pool)
            .await?;

        if exists.is_none() {
            return Ok(None);
        }

        let members: Vec<i64> = sqlx::query_scalar(
            "SELECT student_id FROM class_enrollments WHERE class_id = $1 ORDER BY student_id",
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(members))
    }
}

#[derive(FromRow)]
struct TopicRow {
    id: i64,
    name: String,
}

#[derive(FromRow)]
struct TopicTagRow {
    topic_id: i64,
    name: String,
}

#[derive(FromRow)]
struct MaterialRow {
    id: i64,
    topic_id: i64,
    name: String,
    url: String,
}

/// Topic/material lookups backed by PostgreSQL.
#[derive(Clone)]
pub struct PgTopicCatalog {
    pool: PgPool,
}

impl PgTopicCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TopicCatalog for PgTopicCatalog {
    async fn find_topics_by_any_tag(&self, tags: &[String]) -> Result<Vec<Topic>, AppError> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let topics: Vec<TopicRow> = sqlx::query_as(
            r#"
            SELECT DISTINCT tp.id, tp.name
            FROM topics tp
            JOIN topic_tags tt ON tt.topic_id = tp.id
            JOIN tags t ON tt.tag_id = t.id
            WHERE t.name = ANY($1)
            ORDER BY tp.id
            "#,
        )
        .bind(tags)
        .fetch_all(&self.pool)
        .await?;

        if topics.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = topics.iter().map(|t| t.id).collect();

        let topic_tags: Vec<TopicTagRow> = sqlx::query_as(
            r#"
            SELECT tt.topic_id, t.name
            FROM topic_tags tt
            JOIN tags t ON tt.tag_id = t.id
            WHERE tt.topic_id = ANY($1)
            ORDER BY t.name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let materials: Vec<MaterialRow> = sqlx::query_as(
            "SELECT id, topic_id, name, url FROM materials WHERE topic_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut tags_by_topic: HashMap<i64, Vec<String>> = HashMap::new();
        for row in topic_tags {
            tags_by_topic.entry(row.topic_id).or_default().push(row.name);
        }

        let mut materials_by_topic: HashMap<i64, Vec<Material>> = HashMap::new();
        for row in materials {
            materials_by_topic.entry(row.topic_id).or_default().push(Material {
                id: row.id,
                name: row.name,
                url: row.url,
            });
        }

        Ok(topics
            .into_iter()
            .map(|t| Topic {
                tags: tags_by_topic.remove(&t.id).unwrap_or_default(),
                materials: materials_by_topic.remove(&t.id).unwrap_or_default(),
                id: t.id,
                name: t.name,
            })
            .collect())
    }
}
