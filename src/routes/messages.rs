use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::errors::AppError;
use crate::models::{IngestMessage, Message};
use crate::services::sentinel;
use crate::state::AppState;

/// Fallback when a feed item carries no (or a sentinel) source link.
const DEFAULT_SOURCE_URL: &str = "https://www.binance.com/en/support/announcement";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(fetch_messages))
        .route("/ingest", post(ingest_messages))
        .route("/collect", post(collect))
        .route("/read", post(mark_read))
}

/// Bulk ingest. Items without a usable title are skipped rather than
/// failing the whole batch; the response carries the saved count.
pub async fn ingest_messages(
    State(state): State<AppState>,
    Json(data): Json<Vec<IngestMessage>>,
) -> Result<Json<Value>, AppError> {
    info!("POST /messages/ingest - Ingesting {} messages", data.len());
    let mut saved = 0u32;
    for item in data {
        let title = item.title.trim();
        if title.is_empty() {
            continue;
        }
        let message = Message {
            id: Uuid::new_v4(),
            title: title.to_string(),
            symbol: sentinel::normalize(item.symbol.as_deref()),
            sentiment: sentinel::normalize(item.sentiment.as_deref()),
            source_url: Some(
                sentinel::normalize(item.source_url.as_deref())
                    .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            ),
            content: sentinel::normalize(item.content.as_deref()),
            summary: None,
            impact_description: None,
            created_at: Utc::now(),
            read_flag: false,
        };
        db::message_queries::insert(&state.pool, &message).await?;
        saved += 1;
    }
    Ok(Json(json!({"count": saved})))
}

pub async fn fetch_messages(
    State(state): State<AppState>,
) -> Result<Json<Vec<Message>>, AppError> {
    info!("GET /messages - Fetching all messages");
    let messages = db::message_queries::fetch_all(&state.pool).await?;
    Ok(Json(messages))
}

/// Runs one analysis batch synchronously and reports how many reports were
/// generated. 202 signals "the batch ran", not "everything analyzed".
pub async fn collect(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    info!("POST /messages/collect - Running analysis batch");
    let processed = state.analysis.collect_and_analyze().await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"result": "collected", "processed": processed})),
    ))
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub ids: Vec<Uuid>,
}

pub async fn mark_read(
    State(state): State<AppState>,
    Json(data): Json<MarkReadRequest>,
) -> Result<Json<Value>, AppError> {
    info!("POST /messages/read - Marking {} messages read", data.ids.len());
    if data.ids.is_empty() {
        return Err(AppError::Validation("ids must not be empty".to_string()));
    }
    let updated = db::message_queries::mark_read(&state.pool, &data.ids).await?;
    Ok(Json(json!({"result": "read", "updated": updated})))
}
