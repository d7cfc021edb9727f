use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::Value;

use crate::models::AnalysisResult;
use crate::services::audit::AuditSink;
use crate::services::sentinel;

/// Structural gate in front of report persistence. Tracks a consecutive
/// invalid-output streak and stops accepting results once the streak reaches
/// the configured threshold, so a misbehaving workflow cannot keep feeding
/// garbage into the review queue.
pub struct OutputValidator {
    invalid_streak: AtomicU32,
    threshold: u32,
}

impl OutputValidator {
    pub fn new(threshold: u32) -> Self {
        Self {
            invalid_streak: AtomicU32::new(0),
            threshold,
        }
    }

    pub fn invalid_streak(&self) -> u32 {
        self.invalid_streak.load(Ordering::SeqCst)
    }

    /// May rewrite `plan_json` in place when the single repair heuristic
    /// (stripping backtick fencing) turns it into well-formed JSON.
    pub async fn validate(&self, result: &mut AnalysisResult, audit: &dyn AuditSink) -> bool {
        if sentinel::is_blank(result.summary.as_deref()) {
            return false;
        }
        let has_structured = !sentinel::is_blank(result.plan_json.as_deref())
            || !sentinel::is_blank(result.analysis_json.as_deref())
            || !sentinel::is_blank(result.positions_snapshot_json.as_deref())
            || !sentinel::is_blank(result.adjustments_json.as_deref());
        if !has_structured {
            return false;
        }

        if let Some(parse_error) = self.first_parse_error(result) {
            let streak = self.invalid_streak.fetch_add(1, Ordering::SeqCst) + 1;
            audit
                .record(
                    "WORKFLOW_OUTPUT",
                    "INVALID_JSON",
                    &format!("{}, count={}", parse_error, streak),
                )
                .await;
            if streak >= self.threshold {
                audit
                    .record(
                        "WORKFLOW_OUTPUT",
                        "ALERT",
                        &format!(
                            "invalid outputs >= {}, pause generation for manual check",
                            self.threshold
                        ),
                    )
                    .await;
                return false;
            }
            return self.try_repair(result);
        }

        // Well-formed but with no actionable instruction: nothing the
        // reconciliation engine could ever apply.
        if sentinel::is_blank(result.positions_snapshot_json.as_deref())
            && sentinel::is_blank(result.adjustments_json.as_deref())
        {
            return false;
        }

        self.invalid_streak.store(0, Ordering::SeqCst);
        true
    }

    fn first_parse_error(&self, result: &AnalysisResult) -> Option<String> {
        for json in [result.plan_json.as_deref(), result.analysis_json.as_deref()] {
            if let Some(json) = json.filter(|s| !s.trim().is_empty()) {
                if let Err(e) = serde_json::from_str::<Value>(json) {
                    return Some(e.to_string());
                }
            }
        }
        None
    }

    /// One bounded heuristic: models tend to wrap plans in backtick fences.
    fn try_repair(&self, result: &mut AnalysisResult) -> bool {
        let Some(plan) = result.plan_json.as_deref().filter(|s| !s.trim().is_empty()) else {
            return false;
        };
        let stripped = plan.replace('`', "");
        if serde_json::from_str::<Value>(&stripped).is_ok() {
            result.plan_json = Some(stripped);
            self.invalid_streak.store(0, Ordering::SeqCst);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::audit::testing::MemoryAudit;

    fn result_with(
        summary: Option<&str>,
        plan_json: Option<&str>,
        snapshot: Option<&str>,
    ) -> AnalysisResult {
        AnalysisResult {
            summary: summary.map(String::from),
            plan_json: plan_json.map(String::from),
            positions_snapshot_json: snapshot.map(String::from),
            ..AnalysisResult::default()
        }
    }

    #[tokio::test]
    async fn test_rejects_missing_summary() {
        let validator = OutputValidator::new(3);
        let audit = MemoryAudit::default();
        let mut result = result_with(None, Some(r#"{"a":1}"#), Some("[]"));

        assert!(!validator.validate(&mut result, &audit).await);
        assert_eq!(validator.invalid_streak(), 0);
    }

    #[tokio::test]
    async fn test_rejects_result_without_structured_content() {
        let validator = OutputValidator::new(3);
        let audit = MemoryAudit::default();
        let mut result = result_with(Some("just words"), None, None);

        assert!(!validator.validate(&mut result, &audit).await);
    }

    #[tokio::test]
    async fn test_rejects_well_formed_result_without_actionable_rows() {
        let validator = OutputValidator::new(3);
        let audit = MemoryAudit::default();
        let mut result = result_with(Some("summary"), Some(r#"{"note":"hold"}"#), None);

        assert!(!validator.validate(&mut result, &audit).await);
        // structural rejection, not a parse failure
        assert_eq!(validator.invalid_streak(), 0);
    }

    #[tokio::test]
    async fn test_accepts_valid_result_and_resets_streak() {
        let validator = OutputValidator::new(3);
        let audit = MemoryAudit::default();

        let mut broken = result_with(Some("s"), Some("{broken"), None);
        assert!(!validator.validate(&mut broken, &audit).await);
        assert_eq!(validator.invalid_streak(), 1);

        let mut ok = result_with(
            Some("s"),
            Some(r#"{"a":1}"#),
            Some(r#"[{"symbol":"BTC","percent":60}]"#),
        );
        assert!(validator.validate(&mut ok, &audit).await);
        assert_eq!(validator.invalid_streak(), 0);
    }

    #[tokio::test]
    async fn test_backtick_wrapped_plan_repaired_once() {
        let validator = OutputValidator::new(3);
        let audit = MemoryAudit::default();
        let mut result = result_with(Some("s"), Some("`{\"a\":1}`"), None);

        assert!(validator.validate(&mut result, &audit).await);
        assert_eq!(result.plan_json.as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(validator.invalid_streak(), 0);
        assert_eq!(audit.statuses("WORKFLOW_OUTPUT"), vec!["INVALID_JSON"]);
    }

    #[tokio::test]
    async fn test_streak_trips_alert_at_threshold() {
        let validator = OutputValidator::new(3);
        let audit = MemoryAudit::default();

        for _ in 0..3 {
            let mut result = result_with(Some("s"), Some("{broken"), None);
            assert!(!validator.validate(&mut result, &audit).await);
        }

        assert_eq!(validator.invalid_streak(), 3);
        let statuses = audit.statuses("WORKFLOW_OUTPUT");
        assert_eq!(
            statuses.iter().filter(|s| s.as_str() == "ALERT").count(),
            1
        );

        // past the threshold even a repairable plan is rejected outright
        let mut repairable = result_with(Some("s"), Some("`{\"a\":1}`"), None);
        assert!(!validator.validate(&mut repairable, &audit).await);
        assert_eq!(validator.invalid_streak(), 4);
    }
}
