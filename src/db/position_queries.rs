use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{NewPosition, Position};

/// The current ledger: the row set sharing the newest timestamp.
pub async fn current_set(pool: &PgPool) -> Result<Vec<Position>, sqlx::Error> {
    sqlx::query_as::<_, Position>(
        "SELECT * FROM positions
         WHERE created_at = (SELECT MAX(created_at) FROM positions)
         ORDER BY symbol",
    )
    .fetch_all(pool)
    .await
}

pub async fn history(pool: &PgPool) -> Result<Vec<Position>, sqlx::Error> {
    sqlx::query_as::<_, Position>(
        "SELECT * FROM positions ORDER BY created_at DESC, symbol",
    )
    .fetch_all(pool)
    .await
}

pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM positions")
        .fetch_one(pool)
        .await
}

pub async fn total_amount_current(pool: &PgPool) -> Result<BigDecimal, sqlx::Error> {
    sqlx::query_scalar::<_, BigDecimal>(
        "SELECT COALESCE(SUM(amount_usd), 0) FROM positions
         WHERE created_at = (SELECT MAX(created_at) FROM positions)",
    )
    .fetch_one(pool)
    .await
}

/// Writes a full replacement ledger under one shared timestamp. Runs inside
/// the caller's transaction so readers never observe a partial set.
pub async fn insert_set(
    tx: &mut Transaction<'_, Postgres>,
    rows: &[NewPosition],
    stamp: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    for row in rows {
        sqlx::query(
            "INSERT INTO positions (id, symbol, percent, amount_usd, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(&row.symbol)
        .bind(&row.percent)
        .bind(&row.amount_usd)
        .bind(stamp)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
