use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use crate::db;
use crate::errors::AppError;
use crate::models::{OperationLog, STATUS_PENDING};
use crate::state::AppState;

/// How many audit entries the dashboard log panel shows.
const RECENT_LOG_LIMIT: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(overview))
        .route("/logs", get(recent_logs))
}

pub async fn overview(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    info!("GET /overview - Fetching dashboard counters");
    let unread_messages = db::message_queries::count_unread(&state.pool).await?;
    let pending_reports =
        db::report_queries::count_by_status(&state.pool, STATUS_PENDING).await?;
    let total_asset_usd = db::position_queries::total_amount_current(&state.pool).await?;

    Ok(Json(json!({
        "unreadMessages": unread_messages,
        "pendingReports": pending_reports,
        "totalAssetUsd": total_asset_usd,
    })))
}

pub async fn recent_logs(
    State(state): State<AppState>,
) -> Result<Json<Vec<OperationLog>>, AppError> {
    info!("GET /overview/logs - Fetching recent operation logs");
    let logs = db::operation_log_queries::recent(&state.pool, RECENT_LOG_LIMIT).await?;
    Ok(Json(logs))
}
