use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::error;

use crate::external::workflow_gateway::{
    WorkflowGateway, WorkflowGatewayError, WorkflowRunRequest, WorkflowRunResponse,
};

/// HTTP client for a Dify-compatible workflow API.
pub struct DifyGateway {
    base_url: String,
    client: Client,
}

impl DifyGateway {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create HTTP client");

        Self { base_url, client }
    }

    fn run_url(&self) -> String {
        format!("{}/workflows/run", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl WorkflowGateway for DifyGateway {
    async fn run_workflow(
        &self,
        api_key: &str,
        request: &WorkflowRunRequest,
    ) -> Result<WorkflowRunResponse, WorkflowGatewayError> {
        let response = self
            .client
            .post(self.run_url())
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| WorkflowGatewayError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                "Workflow API error {} for workflow {}",
                status, request.workflow_id
            );
            return Err(WorkflowGatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<WorkflowRunResponse>()
            .await
            .map_err(|e| WorkflowGatewayError::Parse(e.to_string()))
    }
}
