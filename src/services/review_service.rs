use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::errors::AppError;
use crate::models::{NewPosition, Report, STATUS_APPROVED, STATUS_PENDING, STATUS_REJECTED};
use crate::services::audit::AuditSink;
use crate::services::plan::{self, PlanMaterial};

/// Consecutive apply failures that trigger an operator alert.
const APPLY_FAIL_ALERT_THRESHOLD: u32 = 2;

/// Handles the human review decisions. Approval is the only path that
/// mutates the allocation ledger: the plan is reconciled against the current
/// ledger and, on success, the report flip and the replacement ledger commit
/// in one transaction.
pub struct ReviewService {
    pool: PgPool,
    audit: Arc<dyn AuditSink>,
    apply_fail_streak: AtomicU32,
    /// When set, a plan that cannot be applied still moves the report to
    /// APPROVED with the failure recorded as the review reason. Off by
    /// default: an unapplied plan stays PENDING for another look.
    approve_on_apply_failure: bool,
}

impl ReviewService {
    pub fn new(pool: PgPool, audit: Arc<dyn AuditSink>, approve_on_apply_failure: bool) -> Self {
        Self {
            pool,
            audit,
            apply_fail_streak: AtomicU32::new(0),
            approve_on_apply_failure,
        }
    }

    pub async fn approve(&self, id: Uuid, reviewer: &str) -> Result<Value, AppError> {
        let report = self.pending_report(id).await?;

        let current: Vec<NewPosition> = db::position_queries::current_set(&self.pool)
            .await?
            .iter()
            .map(NewPosition::from)
            .collect();

        let mut errors = Vec::new();
        match plan::apply_plan(PlanMaterial::from(&report), &current, &mut errors) {
            Some(rows) => {
                let mut tx = self.pool.begin().await?;
                let stamp = Utc::now();
                db::position_queries::insert_set(&mut tx, &rows, stamp).await?;
                db::report_queries::update_review(
                    &mut *tx,
                    id,
                    STATUS_APPROVED,
                    reviewer,
                    stamp,
                    None,
                )
                .await?;
                tx.commit().await?;

                self.apply_fail_streak.store(0, Ordering::SeqCst);
                self.audit
                    .record("APPLY_PLAN", "SUCCESS", &format!("reportId={}", id))
                    .await;
                info!("Approved report {}, ledger replaced with {} rows", id, rows.len());
                Ok(json!({"id": id, "result": "approved", "planApplied": true}))
            }
            None => {
                let reason = errors.join("; ");
                warn!("Plan apply failed for report {}: {}", id, reason);
                self.record_apply_failure(id, &reason).await;

                if self.approve_on_apply_failure {
                    db::report_queries::update_review(
                        &self.pool,
                        id,
                        STATUS_APPROVED,
                        reviewer,
                        Utc::now(),
                        Some(&reason),
                    )
                    .await?;
                    return Ok(json!({
                        "id": id,
                        "result": "approved",
                        "planApplied": false,
                        "errors": errors,
                    }));
                }

                Err(AppError::PlanNotApplied {
                    id,
                    message: "plan could not be applied".to_string(),
                    errors,
                })
            }
        }
    }

    pub async fn reject(
        &self,
        id: Uuid,
        reviewer: &str,
        reason: Option<String>,
    ) -> Result<Value, AppError> {
        self.pending_report(id).await?;

        db::report_queries::update_review(
            &self.pool,
            id,
            STATUS_REJECTED,
            reviewer,
            Utc::now(),
            reason.as_deref(),
        )
        .await?;
        self.audit
            .record("REVIEW", "REJECTED", &format!("reportId={}", id))
            .await;
        Ok(json!({"id": id, "result": "rejected", "reason": reason}))
    }

    pub fn apply_fail_streak(&self) -> u32 {
        self.apply_fail_streak.load(Ordering::SeqCst)
    }

    /// Bumps the consecutive apply-failure streak and writes the audit
    /// entries: FAILED always, ALERT once the streak hits the threshold.
    async fn record_apply_failure(&self, id: Uuid, reason: &str) -> u32 {
        let streak = self.apply_fail_streak.fetch_add(1, Ordering::SeqCst) + 1;
        self.audit
            .record(
                "APPLY_PLAN",
                "FAILED",
                &format!("reportId={}, reason={}, failCount={}", id, reason, streak),
            )
            .await;
        if streak >= APPLY_FAIL_ALERT_THRESHOLD {
            self.audit
                .record(
                    "APPLY_PLAN",
                    "ALERT",
                    &format!(
                        "apply failed >= {}, manual intervention needed",
                        APPLY_FAIL_ALERT_THRESHOLD
                    ),
                )
                .await;
        }
        streak
    }

    /// Only PENDING reports are reviewable; a second decision on the same
    /// report is a client error, not a silent overwrite.
    async fn pending_report(&self, id: Uuid) -> Result<Report, AppError> {
        let report = db::report_queries::fetch_one(&self.pool, id)
            .await?
            .ok_or(AppError::NotFound)?;
        ensure_pending(&report)?;
        Ok(report)
    }
}

fn ensure_pending(report: &Report) -> Result<(), AppError> {
    if report.status != STATUS_PENDING {
        return Err(AppError::Validation(format!(
            "report is {}, only PENDING reports can be reviewed",
            report.status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::audit::testing::MemoryAudit;

    fn report_with_status(status: &str) -> Report {
        Report {
            id: Uuid::new_v4(),
            summary: "BTC rallies".to_string(),
            status: status.to_string(),
            message_id: None,
            sentiment: None,
            key_points: None,
            impact_strength: None,
            risk_notes: None,
            confidence: None,
            plan_json: Some(r#"{"adjustments":[{"symbol":"BTC","delta_percent":5}]}"#.to_string()),
            analysis_json: None,
            positions_snapshot_json: None,
            adjustments_json: None,
            reviewer: None,
            reviewed_at: None,
            review_reason: None,
            created_at: Utc::now(),
        }
    }

    fn service(audit: Arc<MemoryAudit>) -> ReviewService {
        // Lazy pool: no connection is made unless a query runs.
        let pool = PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        ReviewService::new(pool, audit, false)
    }

    #[test]
    fn test_only_pending_reports_are_reviewable() {
        assert!(ensure_pending(&report_with_status(STATUS_PENDING)).is_ok());

        // A second decision on an already-reviewed report must fail even
        // though its plan material is still present: delta adjustments
        // double-count when re-applied.
        let err = ensure_pending(&report_with_status(STATUS_APPROVED)).unwrap_err();
        match err {
            AppError::Validation(msg) => assert!(msg.contains("APPROVED")),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(ensure_pending(&report_with_status(STATUS_REJECTED)).is_err());
    }

    #[tokio::test]
    async fn test_second_apply_failure_trips_alert() {
        let audit = Arc::new(MemoryAudit::default());
        let svc = service(audit.clone());
        let id = Uuid::new_v4();

        assert_eq!(svc.record_apply_failure(id, "plan is empty").await, 1);
        assert_eq!(audit.statuses("APPLY_PLAN"), vec!["FAILED"]);

        assert_eq!(svc.record_apply_failure(id, "plan is empty").await, 2);
        assert_eq!(svc.apply_fail_streak(), 2);
        assert_eq!(audit.statuses("APPLY_PLAN"), vec!["FAILED", "FAILED", "ALERT"]);
    }

    #[tokio::test]
    async fn test_failure_detail_carries_reason_and_count() {
        let audit = Arc::new(MemoryAudit::default());
        let svc = service(audit.clone());
        let id = Uuid::new_v4();

        svc.record_apply_failure(id, "percent total out of range: 30").await;

        let entries = audit.entries.lock().unwrap();
        let (_, status, detail) = &entries[0];
        assert_eq!(status, "FAILED");
        assert!(detail.contains(&format!("reportId={}", id)));
        assert!(detail.contains("reason=percent total out of range: 30"));
        assert!(detail.contains("failCount=1"));
    }
}
