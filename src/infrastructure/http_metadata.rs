// HTTP metadata resolver implementation
use crate::application::metadata_resolver::MetadataResolver;
use crate::domain::device::DeviceMetadata;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpMetadataResolver {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpMetadataResolver {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build metadata HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn device_url(&self, device_id: &str) -> String {
        format!("{}/devices/{}", self.base_url, urlencoding::encode(device_id))
    }
}

#[async_trait]
impl MetadataResolver for HttpMetadataResolver {
    async fn resolve(&self, device_id: &str) -> Result<Option<DeviceMetadata>> {
        let url = self.device_url(device_id);
        tracing::debug!(device_id, url = %url, "Resolving device metadata");

        let mut request = self.client.get(&url).header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to send request to metadata service")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Metadata lookup failed with status {}: {}", status, body);
        }

        let metadata = response
            .json::<DeviceMetadata>()
            .await
            .context("Failed to parse metadata response")?;

        Ok(Some(metadata))
    }
}
