use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::AppConfig;
use crate::core::domain::{LiveClusterRecord, NodePoolConfig, TelemetryMap};
use crate::error::FetchError;

/// The three read endpoints the dashboard polls. Each call is idempotent.
#[async_trait]
pub trait DashboardBackend: Send + Sync + 'static {
    async fn fetch_node_pools(&self) -> Result<Vec<NodePoolConfig>, FetchError>;
    async fn fetch_live_clusters(&self) -> Result<Vec<LiveClusterRecord>, FetchError>;
    async fn fetch_gpu_telemetry(&self) -> Result<TelemetryMap, FetchError>;
}

#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    node_pools_url: String,
    live_status_url: String,
    gpu_telemetry_url: String,
}

impl HttpBackend {
    pub fn new(cfg: &AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("HTTP client build failed: {}", e))?;

        Ok(Self {
            client,
            node_pools_url: format!("{}{}", cfg.backend_url, cfg.node_pools_path),
            live_status_url: format!("{}{}", cfg.backend_url, cfg.live_status_path),
            gpu_telemetry_url: format!("{}{}", cfg.backend_url, cfg.gpu_telemetry_path),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        debug!(url = %url, "GET");
        let resp = self.client.get(url).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DashboardBackend for HttpBackend {
    async fn fetch_node_pools(&self) -> Result<Vec<NodePoolConfig>, FetchError> {
        self.get_json(&self.node_pools_url).await
    }

    async fn fetch_live_clusters(&self) -> Result<Vec<LiveClusterRecord>, FetchError> {
        self.get_json(&self.live_status_url).await
    }

    async fn fetch_gpu_telemetry(&self) -> Result<TelemetryMap, FetchError> {
        self.get_json(&self.gpu_telemetry_url).await
    }
}
