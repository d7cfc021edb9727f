use serde::{Deserialize, Serialize};

// Result of one workflow call after tolerant parsing. Every field is
// optional; an absent field must never overwrite a value the caller already
// knows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: Option<String>,
    pub sentiment: Option<String>,
    pub target_symbol: Option<String>,
    pub source_url: Option<String>,
    pub key_points: Option<String>,
    pub impact_strength: Option<String>,
    pub risk_notes: Option<String>,
    pub confidence: Option<String>,
    pub plan_json: Option<String>,
    pub analysis_json: Option<String>,
    pub positions_snapshot_json: Option<String>,
    pub adjustments_json: Option<String>,
}

impl AnalysisResult {
    /// A degraded placeholder carrying only the original title, returned when
    /// every workflow attempt (including the fix workflow) came up empty.
    pub fn placeholder(summary: impl Into<String>) -> Self {
        Self {
            summary: Some(summary.into()),
            ..Self::default()
        }
    }

    pub fn has_usable_output(&self) -> bool {
        self.summary.is_some() || self.plan_json.is_some() || self.sentiment.is_some()
    }
}
