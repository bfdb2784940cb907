// src/handlers/reports.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{error::AppError, models::user::Caller, services::performance::PerformanceService};

/// Performance report of the current student.
pub async fn my_report(
    State(service): State<PerformanceService>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    let report = service.student_report(caller.id).await?;
    Ok(Json(report))
}

/// Performance report of any student.
/// Instructor only.
pub async fn student_report(
    State(service): State<PerformanceService>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let report = service.student_report(student_id).await?;
    Ok(Json(report))
}

/// Per-tag overview of a class.
/// Instructor only.
pub async fn class_report(
    State(service): State<PerformanceService>,
    Path(class_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let report = service.class_report(class_id).await?;
    Ok(Json(report))
}
