use serde_json::{Map, Value};

use crate::models::AnalysisResult;
use crate::services::sentinel;

/// Extracts a structured result from the workflow's `outputs` value. The
/// remote schema drifts call-to-call, so extraction is field-by-field best
/// effort: a malformed field never aborts the rest.
pub fn parse_outputs(outputs: Option<&Value>) -> AnalysisResult {
    let mut result = AnalysisResult::default();
    let Some(outputs) = outputs else {
        return result;
    };

    match outputs {
        Value::Object(map) => parse_object(map, outputs, &mut result),
        Value::Array(_) => {
            result.summary = Some(flatten(outputs));
            result.plan_json = Some(to_json(outputs));
        }
        Value::Null => {}
        scalar => {
            result.summary = Some(flatten(scalar));
        }
    }

    result
}

fn parse_object(map: &Map<String, Value>, whole: &Value, result: &mut AnalysisResult) {
    let plan = non_null(map.get("plan"));
    let analysis = non_null(map.get("analysis"));

    let mut sentiment = pick(map, &["sentiment"]);
    let mut target_symbol = pick(map, &["target_symbol", "targetSymbol"]);
    let mut source_url = pick(map, &["source_url", "sourceUrl"]);
    let positions_snapshot = pick(map, &["positions_snapshot", "positions_sr"]);
    let adjustments = pick(map, &["adjustments"]);
    let risk_notes = pick(map, &["risk_notes", "riskNotes"]);
    let confidence = pick(map, &["confidence"]);
    let impact_strength = pick(map, &["impact_strength", "impact_streng", "impactStrength"]);
    let key_points = pick(map, &["key_points", "keyPoints"]);

    // First-pass workflows sometimes nest the classification under `analysis`
    // instead of emitting it top-level.
    if let Some(Value::Object(analysis_map)) = analysis {
        if sentiment.is_none() {
            if let Some(s) = non_null(analysis_map.get("sentiment")) {
                sentiment = Some(s);
            }
            if let Some(ts) = non_null(analysis_map.get("target_symbol")) {
                target_symbol = Some(ts);
            }
            if let Some(su) = non_null(analysis_map.get("source_url")) {
                source_url = Some(su);
            }
        }
    }

    result.sentiment = normalize_value(sentiment);
    result.target_symbol = normalize_value(target_symbol);
    result.source_url = normalize_value(source_url);
    result.impact_strength = normalize_value(impact_strength);
    result.risk_notes = normalize_value(risk_notes);
    result.confidence = normalize_value(confidence);
    if let Some(kp) = key_points {
        result.key_points = Some(flatten(kp));
    }
    // Snapshot/adjustment payloads round-trip verbatim; the reconciliation
    // engine parses them later with its own tolerance rules.
    if let Some(snapshot) = positions_snapshot {
        result.positions_snapshot_json = Some(to_json(snapshot));
    }
    if let Some(adj) = adjustments {
        result.adjustments_json = Some(to_json(adj));
    }

    // `plan` wins over `analysis`; either one short-circuits.
    if let Some(plan) = plan {
        result.plan_json = Some(to_json(plan));
        result.summary = Some(flatten(plan));
        return;
    }
    if let Some(analysis) = analysis {
        result.analysis_json = Some(to_json(analysis));
        result.summary = Some(flatten(analysis));
        return;
    }

    // No recognised wrapper at all: keep the whole object as an opaque
    // analysis blob for downstream usage.
    result.analysis_json = Some(to_json(whole));
    result.summary = Some(flatten(whole));
}

/// First present (non-null) value among the alias candidates for a field.
fn pick<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| non_null(map.get(*k)))
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn normalize_value(value: Option<&Value>) -> Option<String> {
    let s = flatten(value?);
    sentinel::normalize(Some(&s))
}

/// Headline form of an arbitrary value: strings verbatim, arrays joined by
/// newlines, everything else as compact JSON.
pub(crate) fn flatten(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten)
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

fn to_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| flatten(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_takes_precedence_over_analysis() {
        let outputs = json!({
            "plan": ["hold BTC", "trim ETH"],
            "analysis": {"sentiment": "positive"},
        });
        let result = parse_outputs(Some(&outputs));

        assert_eq!(result.summary.as_deref(), Some("hold BTC\ntrim ETH"));
        assert_eq!(
            result.plan_json.as_deref(),
            Some(r#"["hold BTC","trim ETH"]"#)
        );
        // plan short-circuits before the analysis blob is serialized
        assert_eq!(result.analysis_json, None);
    }

    #[test]
    fn test_analysis_object_when_no_plan() {
        let outputs = json!({"analysis": {"sentiment": "negative", "note": "sell-off"}});
        let result = parse_outputs(Some(&outputs));

        assert!(result.analysis_json.is_some());
        assert!(result.plan_json.is_none());
        assert!(result.summary.is_some());
    }

    #[test]
    fn test_alias_fallback_for_known_keys() {
        let outputs = json!({
            "targetSymbol": "BTC",
            "riskNotes": "volatile",
            "impact_streng": "high",
            "keyPoints": ["ETF inflows", "halving"],
            "positions_sr": [{"symbol": "BTC", "percent": 60}],
        });
        let result = parse_outputs(Some(&outputs));

        assert_eq!(result.target_symbol.as_deref(), Some("BTC"));
        assert_eq!(result.risk_notes.as_deref(), Some("volatile"));
        assert_eq!(result.impact_strength.as_deref(), Some("high"));
        assert_eq!(result.key_points.as_deref(), Some("ETF inflows\nhalving"));
        assert!(result.positions_snapshot_json.is_some());
    }

    #[test]
    fn test_backfill_from_nested_analysis() {
        let outputs = json!({
            "analysis": {
                "sentiment": "positive",
                "target_symbol": "ETH",
                "source_url": "https://example.com/a"
            }
        });
        let result = parse_outputs(Some(&outputs));

        assert_eq!(result.sentiment.as_deref(), Some("positive"));
        assert_eq!(result.target_symbol.as_deref(), Some("ETH"));
        assert_eq!(result.source_url.as_deref(), Some("https://example.com/a"));
    }

    #[test]
    fn test_top_level_sentiment_blocks_backfill() {
        let outputs = json!({
            "sentiment": "neutral",
            "analysis": {"sentiment": "positive", "target_symbol": "ETH"}
        });
        let result = parse_outputs(Some(&outputs));

        assert_eq!(result.sentiment.as_deref(), Some("neutral"));
        assert_eq!(result.target_symbol, None);
    }

    #[test]
    fn test_sentinel_values_are_dropped() {
        let outputs = json!({"sentiment": "NONE", "target_symbol": "  ", "confidence": "null"});
        let result = parse_outputs(Some(&outputs));

        assert_eq!(result.sentiment, None);
        assert_eq!(result.target_symbol, None);
        assert_eq!(result.confidence, None);
    }

    #[test]
    fn test_bare_object_kept_as_opaque_analysis() {
        let outputs = json!({"sentiment": "positive", "key_points": "ETF approved"});
        let result = parse_outputs(Some(&outputs));

        assert_eq!(result.sentiment.as_deref(), Some("positive"));
        assert!(result.analysis_json.is_some());
        assert!(result.summary.is_some());
    }

    #[test]
    fn test_array_outputs_become_plan() {
        let outputs = json!(["step one", "step two"]);
        let result = parse_outputs(Some(&outputs));

        assert_eq!(result.summary.as_deref(), Some("step one\nstep two"));
        assert_eq!(result.plan_json.as_deref(), Some(r#"["step one","step two"]"#));
    }

    #[test]
    fn test_scalar_outputs_stringify() {
        let result = parse_outputs(Some(&json!("all clear")));
        assert_eq!(result.summary.as_deref(), Some("all clear"));
        assert_eq!(result.plan_json, None);

        let result = parse_outputs(Some(&json!(42)));
        assert_eq!(result.summary.as_deref(), Some("42"));
    }

    #[test]
    fn test_missing_outputs_yield_empty_result() {
        let result = parse_outputs(None);
        assert!(!result.has_usable_output());

        let result = parse_outputs(Some(&Value::Null));
        assert!(!result.has_usable_output());
    }
}
