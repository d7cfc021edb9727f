use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Append-only audit trail entry. Writes are best-effort: a failed insert is
// logged and swallowed, never surfaced to the operation that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OperationLog {
    pub id: uuid::Uuid,
    pub op_type: String,
    pub status: String,
    pub detail: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
