use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::RejectRequest;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/approve/:id", post(approve))
        .route("/reject/:id", post(reject))
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let reviewer = reviewer_from(&headers);
    info!("POST /review/approve/{} - Approving as {}", id, reviewer);
    let outcome = state.review.approve(id, &reviewer).await?;
    Ok(Json(outcome))
}

pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(data): Json<RejectRequest>,
) -> Result<Json<Value>, AppError> {
    let reviewer = reviewer_from(&headers);
    info!("POST /review/reject/{} - Rejecting as {}", id, reviewer);
    let outcome = state.review.reject(id, &reviewer, data.reason).await?;
    Ok(Json(outcome))
}

/// No auth layer here; the reviewer identity rides in on a header and
/// defaults to the shared admin account.
fn reviewer_from(headers: &HeaderMap) -> String {
    headers
        .get("X-User")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("admin")
        .to_string()
}
