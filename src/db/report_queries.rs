use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Report;

pub async fn insert(pool: &PgPool, r: &Report) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO reports (id, summary, status, message_id, sentiment, key_points,
                              impact_strength, risk_notes, confidence, plan_json, analysis_json,
                              positions_snapshot_json, adjustments_json, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(r.id)
    .bind(&r.summary)
    .bind(&r.status)
    .bind(r.message_id)
    .bind(&r.sentiment)
    .bind(&r.key_points)
    .bind(&r.impact_strength)
    .bind(&r.risk_notes)
    .bind(&r.confidence)
    .bind(&r.plan_json)
    .bind(&r.analysis_json)
    .bind(&r.positions_snapshot_json)
    .bind(&r.adjustments_json)
    .bind(r.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_one(pool: &PgPool, id: Uuid) -> Result<Option<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_by_status(pool: &PgPool, status: &str) -> Result<Vec<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>(
        "SELECT * FROM reports WHERE status = $1 ORDER BY created_at DESC",
    )
    .bind(status)
    .fetch_all(pool)
    .await
}

pub async fn count_by_status(pool: &PgPool, status: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reports WHERE status = $1")
        .bind(status)
        .fetch_one(pool)
        .await
}

/// Records the review decision. Runs on whatever executor the caller hands
/// in so approval can share a transaction with the ledger replacement.
pub async fn update_review<'e, E>(
    executor: E,
    id: Uuid,
    status: &str,
    reviewer: &str,
    reviewed_at: DateTime<Utc>,
    reason: Option<&str>,
) -> Result<(), sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "UPDATE reports
         SET status = $2, reviewer = $3, reviewed_at = $4, review_reason = $5
         WHERE id = $1",
    )
    .bind(id)
    .bind(status)
    .bind(reviewer)
    .bind(reviewed_at)
    .bind(reason)
    .execute(executor)
    .await?;
    Ok(())
}
