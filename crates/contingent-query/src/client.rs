//! Task API transport.
//!
//! Endpoints used:
//!   submit:  POST {base}/task/
//!   status:  GET  {base}/task/status/{job-uuid}
//!   results: GET  {base}/task/results/{job-uuid}/{collection-id}
//!
//! The transport returns raw JSON; decoding lives in `models` so that a
//! malformed payload is reported against the cell that produced it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use contingent_common::TaskApiConfig;
use reqwest::{Client, ClientBuilder, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::TaskApiError;
use crate::models::TaskSubmission;

/// Common interface for task API transports.
///
/// Implementations must be safe to call concurrently; the orchestrator shares
/// one instance across all four cells.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn submit_task(&self, submission: &TaskSubmission) -> Result<Value, TaskApiError>;

    async fn job_status(&self, job_uuid: &str) -> Result<Value, TaskApiError>;

    async fn job_results(&self, job_uuid: &str, collection_id: &str) -> Result<Value, TaskApiError>;
}

#[async_trait]
impl<T: TaskApi + ?Sized> TaskApi for Arc<T> {
    async fn submit_task(&self, submission: &TaskSubmission) -> Result<Value, TaskApiError> {
        (**self).submit_task(submission).await
    }

    async fn job_status(&self, job_uuid: &str) -> Result<Value, TaskApiError> {
        (**self).job_status(job_uuid).await
    }

    async fn job_results(&self, job_uuid: &str, collection_id: &str) -> Result<Value, TaskApiError> {
        (**self).job_results(job_uuid, collection_id).await
    }
}

/// reqwest-backed task API client with HTTP basic auth.
#[derive(Debug, Clone)]
pub struct TaskApiClient {
    client: Client,
    base_url: String,
    username: String,
    password: SecretString,
}

impl TaskApiClient {
    pub fn new(
        base_url: &str,
        username: &str,
        password: SecretString,
        timeout: Duration,
    ) -> Result<Self, TaskApiError> {
        let client = ClientBuilder::new().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password,
        })
    }

    pub fn from_config(cfg: &TaskApiConfig) -> Result<Self, TaskApiError> {
        Self::new(
            &cfg.base_url,
            &cfg.username,
            cfg.password.clone(),
            Duration::from_secs(cfg.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        if self.username.is_empty() {
            req
        } else {
            req.basic_auth(&self.username, Some(self.password.expose_secret()))
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Value, TaskApiError> {
        let resp = self.authed(req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TaskApiError::Api { status: status.as_u16(), body });
        }
        Ok(resp.json::<Value>().await?)
    }
}

#[async_trait]
impl TaskApi for TaskApiClient {
    #[instrument(skip(self, submission), fields(correlation_id = %submission.input.uuid))]
    async fn submit_task(&self, submission: &TaskSubmission) -> Result<Value, TaskApiError> {
        let req = self.client.post(self.url("/task/")).json(submission);
        let value = self.send(req).await?;
        debug!(%value, "Task submitted");
        Ok(value)
    }

    async fn job_status(&self, job_uuid: &str) -> Result<Value, TaskApiError> {
        let req = self.client.get(self.url(&format!("/task/status/{job_uuid}")));
        self.send(req).await
    }

    async fn job_results(&self, job_uuid: &str, collection_id: &str) -> Result<Value, TaskApiError> {
        let req = self
            .client
            .get(self.url(&format!("/task/results/{job_uuid}/{collection_id}")));
        self.send(req).await
    }
}
