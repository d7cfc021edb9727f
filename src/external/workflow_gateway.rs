use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payload of `POST {base}/workflows/run`. The workflow id travels in the
/// body; the API key travels as a bearer token and may differ per call.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRunRequest {
    pub inputs: serde_json::Map<String, serde_json::Value>,
    pub workflow_id: String,
    pub response_mode: &'static str,
    pub user: String,
}

impl WorkflowRunRequest {
    pub fn blocking(
        workflow_id: &str,
        inputs: serde_json::Map<String, serde_json::Value>,
        user: String,
    ) -> Self {
        Self {
            inputs,
            workflow_id: workflow_id.to_string(),
            response_mode: "blocking",
            user,
        }
    }
}

// The remote contract is loose: `data.outputs` can be an object, an array or
// a scalar, and any of these envelope fields may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowRunResponse {
    #[serde(default)]
    pub data: Option<WorkflowRunData>,
    #[serde(default)]
    pub message: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowRunData {
    #[serde(default)]
    pub outputs: Option<serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum WorkflowGatewayError {
    #[error("http {status}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl WorkflowGatewayError {
    /// A 4xx other than 429 means the request itself is bad; retrying the
    /// same payload cannot succeed.
    pub fn is_non_retryable(&self) -> bool {
        matches!(self, WorkflowGatewayError::Http { status, .. }
            if (400..500).contains(status) && *status != 429)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            WorkflowGatewayError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[async_trait]
pub trait WorkflowGateway: Send + Sync {
    async fn run_workflow(
        &self,
        api_key: &str,
        request: &WorkflowRunRequest,
    ) -> Result<WorkflowRunResponse, WorkflowGatewayError>;
}
