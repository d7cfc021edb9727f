use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::errors::AppError;
use crate::models::{AnalysisResult, Message, Report, STATUS_PENDING};
use crate::services::audit::AuditSink;
use crate::services::sentinel;
use crate::services::text::{strip_html, trim_summary, truncate};
use crate::services::validator::OutputValidator;
use crate::services::workflow_invoker::{WorkflowConfig, WorkflowInvoker};

/// Raw feed content is trimmed before it goes into the second-pass prompt.
const CONTENT_PROMPT_LIMIT: usize = 1200;

/// Runs the two-pass analysis over unprocessed messages: the first pass
/// enriches the message itself, the second pass produces the report that
/// enters the review queue.
pub struct AnalysisService {
    pool: PgPool,
    invoker: WorkflowInvoker,
    validator: OutputValidator,
    audit: Arc<dyn AuditSink>,
    config: Arc<WorkflowConfig>,
}

impl AnalysisService {
    pub fn new(
        pool: PgPool,
        invoker: WorkflowInvoker,
        audit: Arc<dyn AuditSink>,
        config: Arc<WorkflowConfig>,
    ) -> Self {
        let validator = OutputValidator::new(config.invalid_threshold);
        Self {
            pool,
            invoker,
            validator,
            audit,
            config,
        }
    }

    /// One batch run. Returns the number of reports generated; individual
    /// message failures degrade instead of aborting the batch.
    pub async fn collect_and_analyze(&self) -> Result<usize, AppError> {
        if !self.config.is_enabled() {
            self.audit
                .record("WORKFLOW", "SKIP", "workflow not configured, skip analysis")
                .await;
            self.log_collect(0).await;
            return Ok(0);
        }

        let messages =
            db::message_queries::find_unreported(&self.pool, self.config.max_messages as i64)
                .await?;
        if messages.is_empty() {
            self.log_collect(0).await;
            return Ok(0);
        }

        let current = db::position_queries::current_set(&self.pool).await?;
        let positions_json = serde_json::to_string(&current).unwrap_or_else(|_| "[]".to_string());

        let mut processed = 0usize;
        for mut message in messages {
            // The budget caps generated reports; messages whose output fails
            // validation do not consume it.
            if budget_exhausted(processed, self.config.max_analyze) {
                break;
            }
            let first = self.run_first_analysis(&message).await;
            if let Some(first) = &first {
                merge_first_pass(&mut message, first);
                db::message_queries::update_analysis(&self.pool, &message).await?;
            }

            let first = first.unwrap_or_default();
            let mut result = self.run_second_analysis(&message, &first, &positions_json).await;
            if !self.validator.validate(&mut result, self.audit.as_ref()).await {
                warn!("Discarding unusable analysis output for message {}", message.id);
                self.audit
                    .record(
                        "WORKFLOW_OUTPUT",
                        "INVALID",
                        &format!("messageId={}", message.id),
                    )
                    .await;
                continue;
            }

            let report = build_report(&message, &result);
            db::report_queries::insert(&self.pool, &report).await?;
            info!("Generated report {} for message {}", report.id, message.id);
            processed += 1;
        }

        self.log_collect(processed).await;
        Ok(processed)
    }

    async fn log_collect(&self, processed: usize) {
        let (status, detail) = collect_entry(processed);
        self.audit.record("COLLECT", status, &detail).await;
    }

    pub fn invalid_streak(&self) -> u32 {
        self.validator.invalid_streak()
    }

    async fn run_first_analysis(&self, message: &Message) -> Option<AnalysisResult> {
        let (workflow_id, api_key) = self.config.first_pass()?;
        let inputs = first_pass_inputs(message);
        let mut result = self
            .invoker
            .invoke(workflow_id, api_key, inputs, "first-pass")
            .await;
        if sentinel::is_blank(result.summary.as_deref()) {
            result.summary = Some(message.title.clone());
        }
        Some(result)
    }

    async fn run_second_analysis(
        &self,
        message: &Message,
        first: &AnalysisResult,
        positions_json: &str,
    ) -> AnalysisResult {
        let Some((workflow_id, api_key)) = self.config.second_pass() else {
            // No second pass configured: the first pass output is all we get.
            return first.clone();
        };
        let inputs = second_pass_inputs(message, first, positions_json);
        self.invoker
            .invoke(workflow_id, api_key, inputs, "second-pass")
            .await
    }
}

fn budget_exhausted(processed: usize, max_analyze: usize) -> bool {
    max_analyze > 0 && processed >= max_analyze
}

/// A run that produced no reports is EMPTY, whether the backlog was empty
/// or every output failed validation.
fn collect_entry(processed: usize) -> (&'static str, String) {
    if processed > 0 {
        ("SUCCESS", format!("processed={}", processed))
    } else {
        ("EMPTY", "no new messages to process".to_string())
    }
}

fn first_pass_inputs(message: &Message) -> Map<String, Value> {
    let mut inputs = Map::new();
    inputs.insert("title".to_string(), Value::String(message.title.clone()));
    inputs.insert(
        "symbol".to_string(),
        Value::String(message.symbol.clone().unwrap_or_default()),
    );
    inputs
}

fn second_pass_inputs(
    message: &Message,
    first: &AnalysisResult,
    positions_json: &str,
) -> Map<String, Value> {
    let mut inputs = Map::new();
    inputs.insert("title".to_string(), Value::String(message.title.clone()));
    inputs.insert(
        "symbol".to_string(),
        Value::String(message.symbol.clone().unwrap_or_default()),
    );
    // The second-pass form requires sentiment; only the first pass's own
    // classification is forwarded, anything else falls back to neutral.
    inputs.insert(
        "sentiment".to_string(),
        Value::String(
            sentinel::normalize(first.sentiment.as_deref()).unwrap_or_else(|| "neutral".into()),
        ),
    );
    if let Some(analysis) = sentinel::normalize(first.analysis_json.as_deref()) {
        inputs.insert("analysis".to_string(), Value::String(analysis));
    }
    let analysis_text = sentinel::normalize(first.key_points.as_deref())
        .or_else(|| {
            sentinel::normalize(message.content.as_deref())
                .map(|c| truncate(&strip_html(&c), CONTENT_PROMPT_LIMIT))
        })
        .or_else(|| sentinel::normalize(first.summary.as_deref()));
    if let Some(text) = analysis_text {
        inputs.insert("analysis_text".to_string(), Value::String(text));
    }
    inputs.insert(
        "positions".to_string(),
        Value::String(positions_json.to_string()),
    );
    inputs
}

fn merge_first_pass(message: &mut Message, result: &AnalysisResult) {
    if let Some(symbol) = sentinel::normalize(result.target_symbol.as_deref()) {
        message.symbol = Some(symbol);
    }
    if let Some(sentiment) = sentinel::normalize(result.sentiment.as_deref()) {
        message.sentiment = Some(sentiment);
    }
    if let Some(url) = sentinel::normalize(result.source_url.as_deref()) {
        message.source_url = Some(url);
    }
    if let Some(key_points) = result.key_points.as_deref().filter(|s| !s.trim().is_empty()) {
        message.impact_description = Some(key_points.to_string());
        if sentinel::is_blank(message.summary.as_deref()) {
            message.summary = Some(key_points.to_string());
        }
    }
    // Last-resort summary: "<sentiment> <impact>" from whatever the first
    // pass classified.
    if let Some(impact) = result.impact_strength.as_deref().filter(|s| !s.trim().is_empty()) {
        if sentinel::is_blank(message.summary.as_deref()) {
            let sentiment = result.sentiment.as_deref().unwrap_or("");
            message.summary = Some(format!("{} {}", sentiment, impact).trim().to_string());
        }
    }
}

fn build_report(message: &Message, result: &AnalysisResult) -> Report {
    Report {
        id: Uuid::new_v4(),
        summary: trim_summary(result.summary.as_deref().unwrap_or(&message.title)),
        status: STATUS_PENDING.to_string(),
        message_id: Some(message.id),
        sentiment: sentinel::normalize(result.sentiment.as_deref())
            .or_else(|| message.sentiment.clone()),
        key_points: sentinel::normalize(result.key_points.as_deref()),
        impact_strength: sentinel::normalize(result.impact_strength.as_deref()),
        risk_notes: sentinel::normalize(result.risk_notes.as_deref()),
        confidence: sentinel::normalize(result.confidence.as_deref()),
        plan_json: result.plan_json.clone(),
        analysis_json: result.analysis_json.clone(),
        positions_snapshot_json: result.positions_snapshot_json.clone(),
        adjustments_json: result.adjustments_json.clone(),
        reviewer: None,
        reviewed_at: None,
        review_reason: None,
        created_at: Utc::now(),
    }
}
