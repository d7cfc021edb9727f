use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use crate::db;
use crate::errors::AppError;
use crate::models::{NewPosition, Position, UpdatePositionRequest};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/current", get(fetch_current))
        .route("/history", get(fetch_history))
        .route("/update", post(update_positions))
}

pub async fn fetch_current(State(state): State<AppState>) -> Result<Json<Vec<Position>>, AppError> {
    info!("GET /positions/current - Fetching current ledger");
    let positions = db::position_queries::current_set(&state.pool).await?;
    Ok(Json(positions))
}

pub async fn fetch_history(State(state): State<AppState>) -> Result<Json<Vec<Position>>, AppError> {
    info!("GET /positions/history - Fetching ledger history");
    let positions = db::position_queries::history(&state.pool).await?;
    Ok(Json(positions))
}

/// Manual full-replacement of the ledger. Stricter than an approved plan:
/// the human-entered set must already be a coherent allocation.
pub async fn update_positions(
    State(state): State<AppState>,
    Json(data): Json<Vec<UpdatePositionRequest>>,
) -> Result<Json<Value>, AppError> {
    info!("POST /positions/update - Replacing ledger with {} rows", data.len());
    let rows = validate_replacement(&data)?;

    let mut tx = state.pool.begin().await?;
    db::position_queries::insert_set(&mut tx, &rows, Utc::now()).await?;
    tx.commit().await?;

    Ok(Json(json!({"result": "updated", "count": rows.len()})))
}

fn validate_replacement(data: &[UpdatePositionRequest]) -> Result<Vec<NewPosition>, AppError> {
    if data.is_empty() {
        return Err(AppError::Validation("positions must not be empty".to_string()));
    }

    let zero = BigDecimal::from(0);
    let mut rows = Vec::with_capacity(data.len());
    let mut percent_total = BigDecimal::from(0);
    let mut amount_total = BigDecimal::from(0);
    for item in data {
        let symbol = item.symbol.trim();
        if symbol.is_empty() {
            return Err(AppError::Validation("symbol must not be blank".to_string()));
        }
        if item.percent < zero || item.amount_usd < zero {
            return Err(AppError::Validation(format!(
                "{}: percent and amountUsd must be >= 0",
                symbol
            )));
        }
        percent_total += &item.percent;
        amount_total += &item.amount_usd;
        rows.push(NewPosition {
            symbol: symbol.to_string(),
            percent: item.percent.clone(),
            amount_usd: item.amount_usd.clone(),
        });
    }

    if percent_total < BigDecimal::from(99) || percent_total > BigDecimal::from(101) {
        return Err(AppError::Validation(format!(
            "percent total must be close to 100, got {}",
            percent_total
        )));
    }
    if amount_total <= zero {
        return Err(AppError::Validation("amount total must be positive".to_string()));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn row(symbol: &str, percent: &str, amount: &str) -> UpdatePositionRequest {
        UpdatePositionRequest {
            symbol: symbol.to_string(),
            percent: BigDecimal::from_str(percent).unwrap(),
            amount_usd: BigDecimal::from_str(amount).unwrap(),
        }
    }

    #[test]
    fn test_accepts_allocation_near_100_percent() {
        let rows = validate_replacement(&[row("BTC", "60.5", "600"), row("ETH", "39.5", "400")])
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_rejects_unbalanced_or_negative_input() {
        assert!(validate_replacement(&[]).is_err());
        assert!(validate_replacement(&[row("BTC", "50", "100")]).is_err());
        assert!(validate_replacement(&[row(" ", "100", "100")]).is_err());
        assert!(validate_replacement(&[row("BTC", "100", "-1")]).is_err());
        assert!(validate_replacement(&[row("BTC", "100", "0")]).is_err());
    }
}
