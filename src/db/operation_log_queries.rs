use sqlx::PgPool;
use uuid::Uuid;

use crate::models::OperationLog;

pub async fn insert(
    pool: &PgPool,
    op_type: &str,
    status: &str,
    detail: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO operation_logs (id, op_type, status, detail, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(op_type)
    .bind(status)
    .bind(detail)
    .bind(chrono::Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<OperationLog>, sqlx::Error> {
    sqlx::query_as::<_, OperationLog>(
        "SELECT * FROM operation_logs ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
