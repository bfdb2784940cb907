// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    config::MAX_UPLOAD_BYTES,
    handlers::{attempts, reports},
    state::AppState,
    utils::jwt::{auth_middleware, instructor_middleware},
};

/// Assembles the main application router.
///
/// * Student routes: submissions, own attempts, own report.
/// * Instructor routes: grading, activity listings, student and class reports.
/// * Serves stored uploads under `/uploads`.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let instructor_routes = Router::new()
        .route(
            "/activities/{id}/attempts",
            get(attempts::list_activity_attempts),
        )
        .route("/attempts/{kind}/{id}/grade", put(attempts::grade_attempt))
        .route("/reports/students/{id}", get(reports::student_report))
        .route("/reports/classes/{id}", get(reports::class_report))
        .layer(middleware::from_fn(instructor_middleware));

    // Auth first, then the instructor check on the nested routes.
    let api_routes = Router::new()
        .route("/activities/{id}/attempts/quiz", post(attempts::submit_quiz))
        .route("/activities/{id}/attempts/text", post(attempts::submit_text))
        .route("/activities/{id}/attempts/file", post(attempts::submit_file))
        .route("/attempts/me", get(attempts::list_my_attempts))
        .route(
            "/attempts/{kind}/{id}",
            get(attempts::get_attempt)
                .put(attempts::update_own_attempt)
                .delete(attempts::delete_attempt),
        )
        .route("/reports/me", get(reports::my_report))
        .merge(instructor_routes)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", api_routes)
        // Files written by the local storage backend.
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
