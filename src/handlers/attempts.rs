// src/handlers/attempts.rs

use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::{
            AttemptKind, GradeAttemptRequest, OwnerPatch, SubmitQuizRequest, SubmitTextRequest,
            UpdateTextRequest, UploadedFile,
        },
        user::Caller,
    },
    services::attempts::AttemptService,
};

/// Reads the multipart field named `file`, if present.
async fn read_upload(multipart: &mut Multipart) -> Result<Option<UploadedFile>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_owned)
            .ok_or_else(|| AppError::BadRequest("Uploaded file has no name".to_string()))?;
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field.bytes().await?.to_vec();

        return Ok(Some(UploadedFile {
            file_name,
            content_type,
            bytes,
        }));
    }

    Ok(None)
}

/// Submits a quiz attempt; the response carries the computed score.
pub async fn submit_quiz(
    State(service): State<AttemptService>,
    caller: Caller,
    Path(activity_id): Path<i64>,
    Json(req): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let submission = service
        .submit_quiz(caller.id, activity_id, req.responses)
        .await?;

    Ok((StatusCode::CREATED, Json(submission)))
}

pub async fn submit_text(
    State(service): State<AttemptService>,
    caller: Caller,
    Path(activity_id): Path<i64>,
    Json(req): Json<SubmitTextRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let attempt = service.submit_text(caller.id, activity_id, req.text).await?;

    Ok((StatusCode::CREATED, Json(attempt)))
}

/// Submits a file attempt from a multipart form with a `file` field.
pub async fn submit_file(
    State(service): State<AttemptService>,
    caller: Caller,
    Path(activity_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let upload = read_upload(&mut multipart)
        .await?
        .ok_or_else(|| AppError::BadRequest("Missing 'file' field".to_string()))?;

    let attempt = service.submit_file(caller.id, activity_id, upload).await?;

    Ok((StatusCode::CREATED, Json(attempt)))
}

/// Lists the caller's own attempts of every kind.
pub async fn list_my_attempts(
    State(service): State<AttemptService>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    let attempts = service.list_for_student(caller.id).await?;
    Ok(Json(attempts))
}

/// Lists every attempt submitted to an activity.
/// Instructor only.
pub async fn list_activity_attempts(
    State(service): State<AttemptService>,
    Path(activity_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = service.list_for_activity(activity_id).await?;
    Ok(Json(attempts))
}

pub async fn get_attempt(
    State(service): State<AttemptService>,
    caller: Caller,
    Path((kind, id)): Path<(AttemptKind, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = service.get(kind, id, &caller).await?;
    Ok(Json(attempt))
}

/// Applies the caller's edit to their own ungraded attempt.
///
/// Text attempts take a JSON body with `text`; file attempts take a multipart
/// form with a `file` field. Quiz attempts are never editable.
pub async fn update_own_attempt(
    State(service): State<AttemptService>,
    caller: Caller,
    Path((kind, id)): Path<(AttemptKind, i64)>,
    req: Request,
) -> Result<impl IntoResponse, AppError> {
    let patch = match kind {
        AttemptKind::Text => {
            let Json(body) = Json::<UpdateTextRequest>::from_request(req, &())
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            body.validate()?;
            OwnerPatch {
                text: body.text,
                file: None,
            }
        }
        AttemptKind::File => {
            let mut multipart = Multipart::from_request(req, &())
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            OwnerPatch {
                text: None,
                file: read_upload(&mut multipart).await?,
            }
        }
        AttemptKind::Quiz => OwnerPatch::default(),
    };

    let attempt = service.update_by_owner(kind, id, caller.id, patch).await?;

    Ok(Json(attempt))
}

/// Sets score and/or feedback on a text or file attempt.
/// Instructor only.
pub async fn grade_attempt(
    State(service): State<AttemptService>,
    Path((kind, id)): Path<(AttemptKind, i64)>,
    Json(req): Json<GradeAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let attempt = service.update_by_instructor(kind, id, req).await?;
    Ok(Json(attempt))
}

pub async fn delete_attempt(
    State(service): State<AttemptService>,
    caller: Caller,
    Path((kind, id)): Path<(AttemptKind, i64)>,
) -> Result<impl IntoResponse, AppError> {
    service.delete(kind, id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}
