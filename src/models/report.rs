use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_APPROVED: &str = "APPROVED";
pub const STATUS_REJECTED: &str = "REJECTED";

// A persisted analysis report awaiting human review. The four *_json columns
// carry the workflow output verbatim so the reconciliation step can consume
// it unchanged after approval.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: uuid::Uuid,
    pub summary: String,
    pub status: String,
    pub message_id: Option<uuid::Uuid>,
    pub sentiment: Option<String>,
    pub key_points: Option<String>,
    pub impact_strength: Option<String>,
    pub risk_notes: Option<String>,
    pub confidence: Option<String>,
    pub plan_json: Option<String>,
    pub analysis_json: Option<String>,
    pub positions_snapshot_json: Option<String>,
    pub adjustments_json: Option<String>,
    pub reviewer: Option<String>,
    pub reviewed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub review_reason: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReport {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub message_id: Option<uuid::Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}
