use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Message;

pub async fn insert(pool: &PgPool, m: &Message) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO messages (id, title, symbol, sentiment, source_url, content, summary,
                               impact_description, created_at, read_flag)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(m.id)
    .bind(&m.title)
    .bind(&m.symbol)
    .bind(&m.sentiment)
    .bind(&m.source_url)
    .bind(&m.content)
    .bind(&m.summary)
    .bind(&m.impact_description)
    .bind(m.created_at)
    .bind(m.read_flag)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_all(pool: &PgPool) -> Result<Vec<Message>, sqlx::Error> {
    sqlx::query_as::<_, Message>("SELECT * FROM messages ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

/// Messages that no report has been generated for yet, newest first.
pub async fn find_unreported(pool: &PgPool, limit: i64) -> Result<Vec<Message>, sqlx::Error> {
    sqlx::query_as::<_, Message>(
        "SELECT m.* FROM messages m
         WHERE NOT EXISTS (SELECT 1 FROM reports r WHERE r.message_id = m.id)
         ORDER BY m.created_at DESC
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Persists the fields the analysis passes are allowed to touch.
pub async fn update_analysis(pool: &PgPool, m: &Message) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE messages
         SET symbol = $2, sentiment = $3, source_url = $4, summary = $5, impact_description = $6
         WHERE id = $1",
    )
    .bind(m.id)
    .bind(&m.symbol)
    .bind(&m.sentiment)
    .bind(&m.source_url)
    .bind(&m.summary)
    .bind(&m.impact_description)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_read(pool: &PgPool, ids: &[Uuid]) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE messages SET read_flag = TRUE WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn count_unread(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE read_flag = FALSE")
        .fetch_one(pool)
        .await
}
