use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use super::error::AppError;
use super::state::AppState;
use crate::core::feedback::{NewFeedback, SubmissionOutcome};

#[derive(Deserialize)]
pub struct ListParams {
    limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct CheckRequest {
    text: String,
}

pub fn router(state: AppState) -> Router {
    // The frontend is served from its own origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/feedback",
            post(submit_feedback_handler).get(list_feedback_handler),
        )
        .route("/api/feedback/{id}", get(get_feedback_handler))
        .route("/api/moderation/check", post(check_moderation_handler))
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn submit_feedback_handler(
    State(state): State<AppState>,
    Json(payload): Json<NewFeedback>,
) -> Result<Response, AppError> {
    let response = match state.feedback.submit(payload).await? {
        SubmissionOutcome::Accepted {
            feedback,
            moderation,
            notified,
        } => (
            StatusCode::CREATED,
            Json(json!({
                "feedback": feedback,
                "moderation": moderation,
                "notified": notified,
            })),
        )
            .into_response(),
        SubmissionOutcome::Rejected { moderation } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": "Feedback was flagged by moderation",
                "moderation": moderation,
            })),
        )
            .into_response(),
    };

    Ok(response)
}

async fn list_feedback_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    let entries = state.feedback.list_recent(params.limit).await?;
    Ok(Json(entries).into_response())
}

async fn get_feedback_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    match state.feedback.get(id).await? {
        Some(feedback) => Ok(Json(feedback).into_response()),
        None => Err(AppError::NotFound),
    }
}

/// Dry run: moderate text without storing it.
async fn check_moderation_handler(
    State(state): State<AppState>,
    Json(payload): Json<CheckRequest>,
) -> impl IntoResponse {
    Json(state.feedback.preview(&payload.text).await)
}
