//! HTTP client for the provider gateway
//!
//! One client covers the recommendation listing and all four mutation APIs.
//! Describe routes answer 404 for absent resources, which maps to `Ok(None)`.

use crate::adapter::{
    AutoscalingApi, ComputeApi, DatabaseApi, DbInstanceDescription, FunctionApi,
    FunctionConfiguration, GroupDescription, InstanceDescription, LaunchConfiguration,
    LaunchSource,
};
use crate::error::ProviderError;
use crate::models::{RawRecommendation, ResourceKind};
use crate::source::RecommendationSource;
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RecommendationList {
    recommendations: Vec<RawRecommendation>,
}

#[derive(Debug, Serialize)]
struct InstanceTypeRequest<'a> {
    instance_type: &'a str,
}

#[derive(Debug, Serialize)]
struct ModifyDbRequest<'a> {
    instance_class: &'a str,
    apply_immediately: bool,
}

#[derive(Debug, Serialize)]
struct TemplateVersionRequest<'a> {
    source_version: &'a str,
    instance_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct TemplateVersionResponse {
    version_number: u64,
}

#[derive(Debug, Serialize)]
struct MemoryRequest {
    memory_mb: u32,
}

/// Provider gateway client
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: Url,
}

impl GatewayClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(endpoint)
            .map_err(|e| ProviderError::Request(format!("invalid gateway endpoint {}: {}", endpoint, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::Request(format!(
                "invalid gateway endpoint {}",
                endpoint
            )));
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Endpoint URL with each segment percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::Request("gateway endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Response, ProviderError> {
        debug!(method = %method, url = %url, "Gateway request");

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        request
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))
    }

    /// GET a document, `None` on 404
    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, ProviderError> {
        let response = self.send::<()>(Method::GET, url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        decode(response).await.map(Some)
    }

    /// Send a mutation and discard the response body
    async fn mutate<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<Response, ProviderError> {
        let response = self.send(method, url, Some(body)).await?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ProviderError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    response
        .json()
        .await
        .map_err(|e| ProviderError::Decode(e.to_string()))
}

#[async_trait]
impl RecommendationSource for GatewayClient {
    async fn list_recommendations(
        &self,
        kind: ResourceKind,
    ) -> Result<Vec<RawRecommendation>, ProviderError> {
        let url = self.url(&["recommendations", kind.slug()])?;
        let response = self.send::<()>(Method::GET, url, None).await?;
        let list: RecommendationList = decode(check_status(response).await?).await?;
        Ok(list.recommendations)
    }
}

#[async_trait]
impl ComputeApi for GatewayClient {
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDescription>, ProviderError> {
        self.get_optional(self.url(&["compute", "instances", instance_id])?)
            .await
    }

    async fn modify_instance_type(
        &self,
        instance_id: &str,
        instance_type: &str,
    ) -> Result<(), ProviderError> {
        let url = self.url(&["compute", "instances", instance_id, "instance-type"])?;
        self.mutate(Method::POST, url, &InstanceTypeRequest { instance_type })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DatabaseApi for GatewayClient {
    async fn describe_db_instance(
        &self,
        db_instance_id: &str,
    ) -> Result<Option<DbInstanceDescription>, ProviderError> {
        self.get_optional(self.url(&["databases", db_instance_id])?)
            .await
    }

    async fn modify_db_instance_class(
        &self,
        db_instance_id: &str,
        instance_class: &str,
        apply_immediately: bool,
    ) -> Result<(), ProviderError> {
        let url = self.url(&["databases", db_instance_id, "modify"])?;
        let body = ModifyDbRequest {
            instance_class,
            apply_immediately,
        };
        self.mutate(Method::POST, url, &body).await?;
        Ok(())
    }
}

#[async_trait]
impl AutoscalingApi for GatewayClient {
    async fn describe_group(
        &self,
        group_name: &str,
    ) -> Result<Option<GroupDescription>, ProviderError> {
        self.get_optional(self.url(&["autoscaling", "groups", group_name])?)
            .await
    }

    async fn create_launch_template_version(
        &self,
        launch_template_id: &str,
        source_version: &str,
        instance_type: &str,
    ) -> Result<u64, ProviderError> {
        let url = self.url(&[
            "autoscaling",
            "launch-templates",
            launch_template_id,
            "versions",
        ])?;
        let body = TemplateVersionRequest {
            source_version,
            instance_type,
        };
        let response = self.mutate(Method::POST, url, &body).await?;
        let created: TemplateVersionResponse = decode(response).await?;
        Ok(created.version_number)
    }

    async fn describe_launch_configuration(
        &self,
        name: &str,
    ) -> Result<Option<LaunchConfiguration>, ProviderError> {
        self.get_optional(self.url(&["autoscaling", "launch-configurations", name])?)
            .await
    }

    async fn create_launch_configuration(
        &self,
        configuration: &LaunchConfiguration,
    ) -> Result<(), ProviderError> {
        let url = self.url(&["autoscaling", "launch-configurations"])?;
        self.mutate(Method::POST, url, configuration).await?;
        Ok(())
    }

    async fn update_group_launch_source(
        &self,
        group_name: &str,
        launch_source: &LaunchSource,
    ) -> Result<(), ProviderError> {
        let url = self.url(&["autoscaling", "groups", group_name, "launch-source"])?;
        self.mutate(Method::PUT, url, launch_source).await?;
        Ok(())
    }
}

#[async_trait]
impl FunctionApi for GatewayClient {
    async fn get_function_configuration(
        &self,
        function_name: &str,
    ) -> Result<Option<FunctionConfiguration>, ProviderError> {
        self.get_optional(self.url(&["functions", function_name])?)
            .await
    }

    async fn update_function_memory(
        &self,
        function_name: &str,
        memory_mb: u32,
    ) -> Result<(), ProviderError> {
        let url = self.url(&["functions", function_name, "memory"])?;
        self.mutate(Method::PUT, url, &MemoryRequest { memory_mb })
            .await?;
        Ok(())
    }
}
