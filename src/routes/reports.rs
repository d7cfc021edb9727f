use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::errors::AppError;
use crate::models::{GenerateReport, Report, STATUS_PENDING};
use crate::services::text::trim_summary;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pending", get(fetch_pending))
        .route("/generate", post(generate_report))
}

pub async fn fetch_pending(State(state): State<AppState>) -> Result<Json<Vec<Report>>, AppError> {
    info!("GET /reports/pending - Fetching pending reports");
    let reports = db::report_queries::fetch_by_status(&state.pool, STATUS_PENDING).await?;
    Ok(Json(reports))
}

/// Manual escape hatch: enqueue a PENDING report without running the
/// analysis workflows. Carries no plan columns, so approval will refuse it.
pub async fn generate_report(
    State(state): State<AppState>,
    Json(data): Json<GenerateReport>,
) -> Result<Json<Report>, AppError> {
    info!("POST /reports/generate - Creating manual report");
    let summary = data
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("summary must not be blank".to_string()))?;

    let report = Report {
        id: Uuid::new_v4(),
        summary: trim_summary(summary),
        status: STATUS_PENDING.to_string(),
        message_id: data.message_id,
        sentiment: None,
        key_points: None,
        impact_strength: None,
        risk_notes: None,
        confidence: None,
        plan_json: None,
        analysis_json: None,
        positions_snapshot_json: None,
        adjustments_json: None,
        reviewer: None,
        reviewed_at: None,
        review_reason: None,
        created_at: Utc::now(),
    };
    db::report_queries::insert(&state.pool, &report).await?;
    Ok(Json(report))
}
