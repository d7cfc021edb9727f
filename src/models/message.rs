use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// A collected market-news item. Symbol/sentiment/summary fields start out
// empty and are filled in by the analysis passes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: uuid::Uuid,
    pub title: String,
    pub symbol: Option<String>,
    pub sentiment: Option<String>,
    pub source_url: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub impact_description: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub read_flag: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestMessage {
    pub title: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}
