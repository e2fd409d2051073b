//! API client for the rightsizer service

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the rightsizer service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .context("Failed to create HTTP client")?;

        let mut base_url = Url::parse(base_url).context("Invalid API URL")?;
        // Relative joins replace the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request.send().await.context("Failed to send request")
    }

    /// GET a resource, failing on any non-success status
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.client.get(self.url(path)?)).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    /// GET a resource whose body is meaningful on error statuses too
    pub async fn get_with_status<T: DeserializeOwned>(&self, path: &str) -> Result<(u16, T)> {
        let response = self.send(self.client.get(self.url(path)?)).await?;
        let status = response.status().as_u16();
        let body = response.json().await.context("Failed to parse response")?;
        Ok((status, body))
    }

    /// Run a trigger on the service
    ///
    /// Client and server errors still carry an [`InvocationResult`] body.
    pub async fn invoke(&self, trigger: &TriggerRequest) -> Result<InvocationResult> {
        let response = self
            .send(self.client.post(self.url("v1/invoke")?).json(trigger))
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        serde_json::from_str(&body)
            .with_context(|| format!("API error ({}): {}", status, body))
    }
}

// API types

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerRequest {
    Timer { kind: String },
    Change { key: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResult {
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: String,
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingChange {
    pub resource_id: String,
    pub resource_kind: String,
    /// Instance type string or memory size in MB
    pub current_value: serde_json::Value,
    pub recommended_value: serde_json::Value,
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingList {
    pub pending: Vec<PendingChange>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub consecutive_failures: u32,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
