use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::AssistantError;
use super::types::{
    Assistant, AssistantRequest, CreateMessageRequest, CreateRunRequest, ListResponse, Run,
    Thread, ThreadMessage,
};

/// Page size used when listing assistants.
const ASSISTANT_PAGE_SIZE: u32 = 100;

/// Operations the pipeline needs from the hosted assistant service.
///
/// Everything above the HTTP layer is written against this trait so tests can
/// substitute a scripted fake for the real [`AssistantClient`].
#[allow(async_fn_in_trait)]
pub trait AssistantApi {
    async fn list_assistants(
        &self,
        after: Option<&str>,
    ) -> Result<ListResponse<Assistant>, AssistantError>;

    async fn create_assistant(&self, req: &AssistantRequest) -> Result<Assistant, AssistantError>;

    async fn update_assistant(
        &self,
        assistant_id: &str,
        req: &AssistantRequest,
    ) -> Result<Assistant, AssistantError>;

    async fn create_thread(&self) -> Result<Thread, AssistantError>;

    async fn create_message(
        &self,
        thread_id: &str,
        req: &CreateMessageRequest,
    ) -> Result<ThreadMessage, AssistantError>;

    /// Lists the most recent messages of a thread, newest first.
    async fn list_messages(
        &self,
        thread_id: &str,
        limit: u32,
    ) -> Result<ListResponse<ThreadMessage>, AssistantError>;

    async fn create_run(
        &self,
        thread_id: &str,
        req: &CreateRunRequest,
    ) -> Result<Run, AssistantError>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError>;

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError>;
}

/// HTTP client for the Azure OpenAI Assistants API.
pub struct AssistantClient {
    api_key: String,
    api_version: String,
    base_url: String,
    client: Client,
}

impl AssistantClient {
    /// Build a client for `endpoint` (e.g. `https://my-resource.openai.azure.com`).
    ///
    /// `accept_invalid_certs` disables TLS verification for proxied corporate
    /// networks that re-sign traffic with their own certificates.
    pub fn new(
        endpoint: &str,
        api_key: String,
        api_version: String,
        accept_invalid_certs: bool,
    ) -> Result<Self, AssistantError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self {
            api_key,
            api_version,
            base_url: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/openai/{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, AssistantError> {
        let response = req
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", &self.api_key)
            .header("content-type", "application/json")
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let message = response.text().await.unwrap_or_default();
            return Err(AssistantError::RateLimited {
                retry_after_secs,
                message,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(AssistantError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<T>().await?;
        Ok(body)
    }
}

impl AssistantApi for AssistantClient {
    async fn list_assistants(
        &self,
        after: Option<&str>,
    ) -> Result<ListResponse<Assistant>, AssistantError> {
        let mut req = self
            .client
            .get(self.url("assistants"))
            .query(&[("limit", ASSISTANT_PAGE_SIZE)]);
        if let Some(cursor) = after {
            req = req.query(&[("after", cursor)]);
        }
        self.send(req).await
    }

    async fn create_assistant(&self, req: &AssistantRequest) -> Result<Assistant, AssistantError> {
        self.send(self.client.post(self.url("assistants")).json(req))
            .await
    }

    async fn update_assistant(
        &self,
        assistant_id: &str,
        req: &AssistantRequest,
    ) -> Result<Assistant, AssistantError> {
        let url = self.url(&format!("assistants/{assistant_id}"));
        self.send(self.client.post(url).json(req)).await
    }

    async fn create_thread(&self) -> Result<Thread, AssistantError> {
        let req = self
            .client
            .post(self.url("threads"))
            .json(&serde_json::json!({}));
        self.send(req).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        req: &CreateMessageRequest,
    ) -> Result<ThreadMessage, AssistantError> {
        debug!(
            thread_id,
            role = %req.role,
            chars = req.content.chars().count(),
            "appending message"
        );
        let url = self.url(&format!("threads/{thread_id}/messages"));
        self.send(self.client.post(url).json(req)).await
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        limit: u32,
    ) -> Result<ListResponse<ThreadMessage>, AssistantError> {
        let url = self.url(&format!("threads/{thread_id}/messages"));
        let req = self
            .client
            .get(url)
            .query(&[("order", "desc")])
            .query(&[("limit", limit)]);
        self.send(req).await
    }

    async fn create_run(
        &self,
        thread_id: &str,
        req: &CreateRunRequest,
    ) -> Result<Run, AssistantError> {
        let url = self.url(&format!("threads/{thread_id}/runs"));
        self.send(self.client.post(url).json(req)).await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError> {
        let url = self.url(&format!("threads/{thread_id}/runs/{run_id}"));
        self.send(self.client.get(url)).await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError> {
        let url = self.url(&format!("threads/{thread_id}/runs/{run_id}/cancel"));
        self.send(self.client.post(url)).await
    }
}
