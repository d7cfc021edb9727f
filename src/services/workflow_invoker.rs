use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::warn;

use crate::external::workflow_gateway::{
    WorkflowGateway, WorkflowGatewayError, WorkflowRunRequest,
};
use crate::models::AnalysisResult;
use crate::services::audit::AuditSink;
use crate::services::output_parser::{self, flatten};
use crate::services::sentinel;
use crate::services::text::truncate;

/// How much of a failed response body lands in the audit trail.
const LOG_BODY_LIMIT: usize = 800;

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub first_api_key: Option<String>,
    pub second_api_key: Option<String>,
    pub fix_api_key: Option<String>,
    pub workflow_id: Option<String>,
    pub first_workflow_id: Option<String>,
    pub second_workflow_id: Option<String>,
    pub fix_workflow_id: Option<String>,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub invalid_threshold: u32,
    pub max_analyze: usize,
    pub max_messages: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.dify.ai/v1".to_string(),
            api_key: None,
            first_api_key: None,
            second_api_key: None,
            fix_api_key: None,
            workflow_id: None,
            first_workflow_id: None,
            second_workflow_id: None,
            fix_workflow_id: None,
            max_attempts: 3,
            retry_delay: Duration::from_millis(2000),
            invalid_threshold: 3,
            max_analyze: 20,
            max_messages: 50,
        }
    }
}

impl WorkflowConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: opt_env("WORKFLOW_BASE_URL").unwrap_or(defaults.base_url),
            api_key: opt_env("WORKFLOW_API_KEY"),
            first_api_key: opt_env("WORKFLOW_FIRST_API_KEY"),
            second_api_key: opt_env("WORKFLOW_SECOND_API_KEY"),
            fix_api_key: opt_env("WORKFLOW_FIX_API_KEY"),
            workflow_id: opt_env("WORKFLOW_ID"),
            first_workflow_id: opt_env("WORKFLOW_FIRST_ID"),
            second_workflow_id: opt_env("WORKFLOW_SECOND_ID"),
            fix_workflow_id: opt_env("WORKFLOW_FIX_ID"),
            max_attempts: parsed_env("RETRY_MAX_ATTEMPTS", defaults.max_attempts),
            retry_delay: Duration::from_millis(parsed_env("RETRY_DELAY_MILLIS", 2000)),
            invalid_threshold: parsed_env("WORKFLOW_INVALID_THRESHOLD", defaults.invalid_threshold),
            max_analyze: parsed_env("COLLECT_MAX_ANALYZE", defaults.max_analyze),
            max_messages: parsed_env("COLLECT_MAX_MESSAGES", defaults.max_messages),
        }
    }

    /// Analysis can run as soon as any workflow id and any api key exist;
    /// per-pass settings fall back to the shared defaults.
    pub fn is_enabled(&self) -> bool {
        let has_workflow = self.workflow_id.is_some()
            || self.first_workflow_id.is_some()
            || self.second_workflow_id.is_some();
        let has_key = self.api_key.is_some()
            || self.first_api_key.is_some()
            || self.second_api_key.is_some()
            || self.fix_api_key.is_some();
        has_workflow && has_key
    }

    pub fn first_pass(&self) -> Option<(&str, &str)> {
        let workflow = self.first_workflow_id.as_deref().or(self.workflow_id.as_deref())?;
        let key = self.first_api_key.as_deref().or(self.api_key.as_deref())?;
        Some((workflow, key))
    }

    pub fn second_pass(&self) -> Option<(&str, &str)> {
        let workflow = self.second_workflow_id.as_deref().or(self.workflow_id.as_deref())?;
        let key = self.second_api_key.as_deref().or(self.api_key.as_deref())?;
        Some((workflow, key))
    }

    /// The fix workflow only exists when a dedicated fix id or at least the
    /// second-pass id is configured.
    pub fn fix_pass(&self) -> Option<(&str, &str)> {
        let workflow = self
            .fix_workflow_id
            .as_deref()
            .or(self.second_workflow_id.as_deref())?;
        let key = self
            .fix_api_key
            .as_deref()
            .or(self.second_api_key.as_deref())
            .or(self.api_key.as_deref())?;
        Some((workflow, key))
    }
}

fn opt_env(name: &str) -> Option<String> {
    sentinel::normalize(std::env::var(name).ok().as_deref())
}

fn parsed_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// One logical call to the workflow service: bounded retries with a fixed
/// delay, early abort on non-retryable client errors, escalation to the fix
/// workflow, and a degraded placeholder as the floor. Callers always get a
/// result, never an error, so the batch loop keeps moving.
pub struct WorkflowInvoker {
    gateway: Arc<dyn WorkflowGateway>,
    audit: Arc<dyn AuditSink>,
    config: Arc<WorkflowConfig>,
}

impl WorkflowInvoker {
    pub fn new(
        gateway: Arc<dyn WorkflowGateway>,
        audit: Arc<dyn AuditSink>,
        config: Arc<WorkflowConfig>,
    ) -> Self {
        Self {
            gateway,
            audit,
            config,
        }
    }

    pub async fn invoke(
        &self,
        workflow_id: &str,
        api_key: &str,
        inputs: Map<String, Value>,
        label: &str,
    ) -> AnalysisResult {
        let request =
            WorkflowRunRequest::blocking(workflow_id, inputs.clone(), format!("system-{}", label));

        let mut attempts = 0;
        while attempts < self.config.max_attempts {
            attempts += 1;
            match self.gateway.run_workflow(api_key, &request).await {
                Ok(body) => {
                    let outputs = body.data.as_ref().and_then(|d| d.outputs.as_ref());
                    let mut result = output_parser::parse_outputs(outputs);
                    if result.has_usable_output() {
                        return result;
                    }
                    if let Some(message) = &body.message {
                        // Some deployments answer with a bare message envelope.
                        result.summary = Some(flatten(message));
                        return result;
                    }
                    // 200 with nothing usable inside; try again right away.
                }
                Err(e) => {
                    if let WorkflowGatewayError::Http { status, body } = &e {
                        self.audit
                            .record(
                                "WORKFLOW_OUTPUT",
                                &format!("HTTP_{}", status),
                                &format!(
                                    "url={}/workflows/run, workflowId={}, status={}, body={}",
                                    self.config.base_url,
                                    workflow_id,
                                    status,
                                    truncate(body, LOG_BODY_LIMIT)
                                ),
                            )
                            .await;
                        if e.is_non_retryable() {
                            break;
                        }
                    } else {
                        warn!(
                            "Workflow call failed (attempt {}/{}): {}",
                            attempts, self.config.max_attempts, e
                        );
                    }
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }

        if let Some(fixed) = self.try_fix_workflow(&inputs, label).await {
            return fixed;
        }

        // Floor: hand back the input title so the caller still has a result.
        let title = inputs.get("title").map(flatten).unwrap_or_default();
        AnalysisResult::placeholder(title)
    }

    async fn try_fix_workflow(
        &self,
        inputs: &Map<String, Value>,
        label: &str,
    ) -> Option<AnalysisResult> {
        let (workflow_id, api_key) = self.config.fix_pass()?;

        let mut fixed_inputs = inputs.clone();
        fixed_inputs.insert("request_fix".to_string(), Value::Bool(true));
        let request = WorkflowRunRequest::blocking(
            workflow_id,
            fixed_inputs,
            format!("system-fix-{}", label),
        );

        match self.gateway.run_workflow(api_key, &request).await {
            Ok(body) => {
                let outputs = body.data.as_ref().and_then(|d| d.outputs.as_ref());
                let result = output_parser::parse_outputs(outputs);
                let usable = !sentinel::is_blank(result.summary.as_deref())
                    || !sentinel::is_blank(result.plan_json.as_deref())
                    || !sentinel::is_blank(result.analysis_json.as_deref());
                if usable {
                    self.audit
                        .record("WORKFLOW_OUTPUT", "FIXED", "used fix workflow")
                        .await;
                    return Some(result);
                }
                None
            }
            Err(WorkflowGatewayError::Http { status, body }) => {
                self.audit
                    .record(
                        "WORKFLOW_OUTPUT",
                        &format!("FIX_HTTP_{}", status),
                        &format!(
                            "url={}/workflows/run, workflowId={}, status={}, body={}",
                            self.config.base_url,
                            workflow_id,
                            status,
                            truncate(&body, LOG_BODY_LIMIT)
                        ),
                    )
                    .await;
                None
            }
            Err(e) => {
                self.audit
                    .record("WORKFLOW_OUTPUT", "FIX_FAILED", &e.to_string())
                    .await;
                None
            }
        }
    }
}
