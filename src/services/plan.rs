use bigdecimal::BigDecimal;
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::models::{NewPosition, Report};

const PERCENT_KEYS: [&str; 3] = ["percent", "target_percent", "new_percent"];
const AMOUNT_KEYS: [&str; 4] = ["amountUsd", "amount_usd", "target_amount", "new_amount"];
const DELTA_PERCENT_KEYS: [&str; 2] = ["delta_percent", "percent_delta"];
const DELTA_AMOUNT_KEYS: [&str; 2] = ["delta_amount", "amount_delta"];

/// The plan columns of a report, borrowed for reconciliation.
#[derive(Debug, Clone, Copy)]
pub struct PlanMaterial<'a> {
    pub plan_json: Option<&'a str>,
    pub positions_snapshot_json: Option<&'a str>,
    pub adjustments_json: Option<&'a str>,
}

impl<'a> From<&'a Report> for PlanMaterial<'a> {
    fn from(r: &'a Report) -> Self {
        Self {
            plan_json: r.plan_json.as_deref(),
            positions_snapshot_json: r.positions_snapshot_json.as_deref(),
            adjustments_json: r.adjustments_json.as_deref(),
        }
    }
}

/// Derives the replacement ledger for an approved plan, or `None` when no
/// strategy could apply any rows. `errors` collects both hard failures and
/// per-row warnings so the caller can log/return the full story.
///
/// Candidates are tried in order and the first one that applies wins:
/// the primary source (plan_json, falling back to the snapshot column), then
/// the snapshot column directly, then the adjustments column directly.
/// Within a candidate a full snapshot replace is preferred over an
/// adjustment merge.
pub fn apply_plan(
    material: PlanMaterial<'_>,
    current: &[NewPosition],
    errors: &mut Vec<String>,
) -> Option<Vec<NewPosition>> {
    let primary = non_blank(material.plan_json).or(non_blank(material.positions_snapshot_json));
    if primary.is_none() {
        errors.push("plan is empty".to_string());
        return None;
    }

    let candidates = [
        primary,
        non_blank(material.positions_snapshot_json),
        non_blank(material.adjustments_json),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Some(rows) = try_apply_from_json(candidate, current, errors) {
            return Some(rows);
        }
    }

    errors.push("plan parse error: no valid snapshot or adjustments".to_string());
    None
}

fn try_apply_from_json(
    json: &str,
    current: &[NewPosition],
    errors: &mut Vec<String>,
) -> Option<Vec<NewPosition>> {
    let root: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            errors.push(format!("plan parse error: {}", e));
            return None;
        }
    };

    let (snapshot, adjustments) = match &root {
        Value::Object(map) => (map.get("positions_snapshot"), map.get("adjustments")),
        // a bare array is a positions snapshot
        Value::Array(_) => (Some(&root), None),
        _ => (None, None),
    };

    if let Some(rows) = apply_snapshot(snapshot, errors) {
        return Some(rows);
    }
    apply_adjustments(adjustments, current, errors)
}

/// Full replace: every surviving row becomes the new ledger.
fn apply_snapshot(snapshot: Option<&Value>, errors: &mut Vec<String>) -> Option<Vec<NewPosition>> {
    let rows = snapshot?.as_array().filter(|a| !a.is_empty())?;

    let mut positions = Vec::new();
    for row in rows {
        let Some(row) = row.as_object() else { continue };
        let symbol = symbol_of(row);
        if symbol.is_empty() {
            errors.push("snapshot missing symbol".to_string());
            continue;
        }
        let percent = to_decimal(row, &PERCENT_KEYS).unwrap_or_else(|| {
            errors.push(format!("snapshot {} missing percent, default 0", symbol));
            BigDecimal::from(0)
        });
        let amount = to_decimal(row, &AMOUNT_KEYS).unwrap_or_else(|| {
            errors.push(format!("snapshot {} missing amount, default 0", symbol));
            BigDecimal::from(0)
        });
        if percent < BigDecimal::from(0) || amount < BigDecimal::from(0) {
            errors.push(format!("snapshot {} negative value skipped", symbol));
            continue;
        }
        positions.push(NewPosition {
            symbol,
            percent,
            amount_usd: amount,
        });
    }

    if positions.is_empty() {
        errors.push("snapshot applied 0 rows".to_string());
        return None;
    }
    Some(positions)
}

/// Delta merge on top of the current ledger. A delta is applied first, then
/// an absolute value overrides it; rows that would go negative are skipped,
/// leaving the existing row untouched. The merged total percent must land in
/// [50, 200] or the whole attempt fails.
fn apply_adjustments(
    adjustments: Option<&Value>,
    current: &[NewPosition],
    errors: &mut Vec<String>,
) -> Option<Vec<NewPosition>> {
    let rows = adjustments?.as_array().filter(|a| !a.is_empty())?;

    let mut ledger: Vec<NewPosition> = current.to_vec();
    for row in rows {
        let Some(row) = row.as_object() else { continue };
        let symbol = symbol_of(row);
        if symbol.is_empty() {
            errors.push("adjustment missing symbol".to_string());
            continue;
        }

        let existing = ledger.iter().position(|p| p.symbol == symbol);
        let mut merged = match existing {
            Some(i) => ledger[i].clone(),
            None => NewPosition::zeroed(&symbol),
        };

        if let Some(delta) = to_decimal(row, &DELTA_PERCENT_KEYS) {
            merged.percent = &merged.percent + delta;
        }
        if let Some(target) = to_decimal(row, &PERCENT_KEYS) {
            merged.percent = target;
        }
        if let Some(delta) = to_decimal(row, &DELTA_AMOUNT_KEYS) {
            merged.amount_usd = &merged.amount_usd + delta;
        }
        if let Some(target) = to_decimal(row, &AMOUNT_KEYS) {
            merged.amount_usd = target;
        }

        if merged.percent < BigDecimal::from(0) {
            errors.push(format!("adjustment {} negative percent skipped", symbol));
            continue;
        }
        if merged.amount_usd < BigDecimal::from(0) {
            errors.push(format!("adjustment {} negative amount skipped", symbol));
            continue;
        }
        match existing {
            Some(i) => ledger[i] = merged,
            None => ledger.push(merged),
        }
    }

    if ledger.is_empty() {
        errors.push("adjustments applied 0 rows".to_string());
        return None;
    }

    // Post-condition on the merged result, not per row: deltas may move the
    // total off 100, but far outside the band the plan is not trustworthy.
    let total: BigDecimal = ledger
        .iter()
        .fold(BigDecimal::from(0), |acc, p| acc + &p.percent);
    if total < BigDecimal::from(50) || total > BigDecimal::from(200) {
        errors.push(format!("percent total out of range: {}", total));
        return None;
    }

    Some(ledger)
}

fn symbol_of(row: &Map<String, Value>) -> String {
    match row.get("symbol") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// First alias that holds a parseable number; numbers and numeric strings
/// both count, anything else is skipped.
fn to_decimal(row: &Map<String, Value>, keys: &[&str]) -> Option<BigDecimal> {
    for key in keys {
        match row.get(*key) {
            Some(Value::Number(n)) => {
                if let Ok(d) = BigDecimal::from_str(&n.to_string()) {
                    return Some(d);
                }
            }
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    if let Ok(d) = BigDecimal::from_str(trimmed) {
                        return Some(d);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(symbol: &str, percent: i64, amount: i64) -> NewPosition {
        NewPosition {
            symbol: symbol.to_string(),
            percent: BigDecimal::from(percent),
            amount_usd: BigDecimal::from(amount),
        }
    }

    fn material(
        plan: Option<&'static str>,
        snapshot: Option<&'static str>,
        adjustments: Option<&'static str>,
    ) -> PlanMaterial<'static> {
        PlanMaterial {
            plan_json: plan,
            positions_snapshot_json: snapshot,
            adjustments_json: adjustments,
        }
    }

    fn seed_ledger() -> Vec<NewPosition> {
        vec![
            pos("BTC", 40, 4_000_000),
            pos("ETH", 35, 3_500_000),
            pos("SOL", 15, 1_500_000),
            pos("USDT", 10, 1_000_000),
        ]
    }

    #[test]
    fn test_empty_plan_fails() {
        let mut errors = Vec::new();
        let result = apply_plan(material(None, None, None), &[], &mut errors);

        assert!(result.is_none());
        assert_eq!(errors, vec!["plan is empty"]);
    }

    #[test]
    fn test_snapshot_drops_negative_rows() {
        let plan = r#"[{"symbol":"BTC","percent":60,"amountUsd":100},
                       {"symbol":"ETH","percent":-5,"amountUsd":50}]"#;
        let mut errors = Vec::new();
        let result = apply_plan(material(Some(plan), None, None), &[], &mut errors);

        let rows = result.expect("one row survived");
        assert_eq!(rows, vec![pos("BTC", 60, 100)]);
        assert!(errors.iter().any(|e| e.contains("ETH negative value skipped")));
    }

    #[test]
    fn test_snapshot_defaults_missing_numerics_to_zero() {
        let plan = r#"[{"symbol":"BTC","percent":100}]"#;
        let mut errors = Vec::new();
        let rows = apply_plan(material(Some(plan), None, None), &[], &mut errors).unwrap();

        assert_eq!(rows, vec![pos("BTC", 100, 0)]);
        assert!(errors.iter().any(|e| e.contains("missing amount, default 0")));
    }

    #[test]
    fn test_snapshot_with_all_rows_invalid_fails() {
        let plan = r#"[{"symbol":"","percent":60},{"symbol":"ETH","percent":-1}]"#;
        let mut errors = Vec::new();
        let result = apply_plan(material(Some(plan), None, None), &[], &mut errors);

        assert!(result.is_none());
        assert!(errors.iter().any(|e| e == "snapshot applied 0 rows"));
    }

    #[test]
    fn test_snapshot_nested_under_wrapper_key() {
        let plan = r#"{"positions_snapshot":[{"symbol":"BTC","target_percent":70,"target_amount":7000}]}"#;
        let mut errors = Vec::new();
        let rows = apply_plan(material(Some(plan), None, None), &[], &mut errors).unwrap();

        assert_eq!(rows, vec![pos("BTC", 70, 7000)]);
    }

    #[test]
    fn test_snapshot_replace_is_idempotent() {
        let plan = r#"[{"symbol":"BTC","percent":60,"amountUsd":100}]"#;
        let mut errors = Vec::new();
        let first = apply_plan(material(Some(plan), None, None), &seed_ledger(), &mut errors)
            .unwrap();
        let second = apply_plan(material(Some(plan), None, None), &first, &mut errors).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_adjustment_delta_within_band_succeeds() {
        let plan = r#"{"adjustments":[{"symbol":"BTC","delta_percent":10}]}"#;
        let mut errors = Vec::new();
        let rows = apply_plan(material(Some(plan), None, None), &seed_ledger(), &mut errors)
            .expect("total 110 is inside [50, 200]");

        assert_eq!(rows[0], pos("BTC", 50, 4_000_000));
        assert_eq!(&rows[1..], &seed_ledger()[1..]);
    }

    #[test]
    fn test_adjustment_absolute_overrides_delta() {
        let plan =
            r#"{"adjustments":[{"symbol":"BTC","delta_percent":10,"percent":55,"new_amount":5500}]}"#;
        let mut errors = Vec::new();
        let rows = apply_plan(material(Some(plan), None, None), &seed_ledger(), &mut errors)
            .unwrap();

        assert_eq!(rows[0], pos("BTC", 55, 5500));
    }

    #[test]
    fn test_adjustment_creates_missing_symbol_from_zero() {
        let plan = r#"{"adjustments":[{"symbol":"DOGE","delta_percent":5,"delta_amount":500}]}"#;
        let mut errors = Vec::new();
        let rows = apply_plan(material(Some(plan), None, None), &seed_ledger(), &mut errors)
            .unwrap();

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[4], pos("DOGE", 5, 500));
    }

    #[test]
    fn test_adjustment_going_negative_keeps_existing_row() {
        let plan = r#"{"adjustments":[{"symbol":"USDT","delta_percent":-60}]}"#;
        let mut errors = Vec::new();
        let rows = apply_plan(material(Some(plan), None, None), &seed_ledger(), &mut errors)
            .unwrap();

        // the offending row is skipped; the ledger total stays at 100
        assert_eq!(rows, seed_ledger());
        assert!(errors.iter().any(|e| e.contains("USDT negative percent skipped")));
    }

    #[test]
    fn test_adjustment_total_below_band_fails() {
        let current = vec![pos("BTC", 40, 4000)];
        let plan = r#"{"adjustments":[{"symbol":"BTC","target_percent":30}]}"#;
        let mut errors = Vec::new();
        let result = apply_plan(material(Some(plan), None, None), &current, &mut errors);

        assert!(result.is_none());
        assert!(errors.iter().any(|e| e.contains("percent total out of range: 30")));
    }

    #[test]
    fn test_adjustment_total_above_band_fails() {
        let plan = r#"{"adjustments":[{"symbol":"BTC","delta_percent":150}]}"#;
        let mut errors = Vec::new();
        let result = apply_plan(material(Some(plan), None, None), &seed_ledger(), &mut errors);

        assert!(result.is_none());
        assert!(errors.iter().any(|e| e.contains("percent total out of range")));
    }

    #[test]
    fn test_fallback_from_broken_plan_to_adjustments_column() {
        let mut errors = Vec::new();
        let rows = apply_plan(
            material(
                Some("`not json`"),
                None,
                Some(r#"[{"symbol":"BTC","delta_percent":10}]"#),
            ),
            &seed_ledger(),
            &mut errors,
        );

        // The adjustments column holds a bare array, which parses as a
        // snapshot candidate first; its rows have no percent/amount and
        // default to zero, so the snapshot path applies them.
        assert!(rows.is_some());
        assert!(errors.iter().any(|e| e.starts_with("plan parse error:")));
    }

    #[test]
    fn test_snapshot_column_used_when_plan_column_blank() {
        let rows_json = r#"[{"symbol":"ETH","percent":100,"amount_usd":9000}]"#;
        let mut errors = Vec::new();
        let rows =
            apply_plan(material(None, Some(rows_json), None), &seed_ledger(), &mut errors)
                .unwrap();

        assert_eq!(rows, vec![pos("ETH", 100, 9000)]);
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let plan = r#"[{"symbol":"BTC","percent":"62.5","amountUsd":"100.25"}]"#;
        let mut errors = Vec::new();
        let rows = apply_plan(material(Some(plan), None, None), &[], &mut errors).unwrap();

        assert_eq!(rows[0].percent, BigDecimal::from_str("62.5").unwrap());
        assert_eq!(rows[0].amount_usd, BigDecimal::from_str("100.25").unwrap());
    }
}
