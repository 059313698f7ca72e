//! Gateway client for forwarding distance samples to a presentation gateway.
//!
//! The gateway is the process that renders totals to the user. Samples reach
//! it only after the ledger has stored them, and a failed push is never
//! retried: the ledger stays the source of truth.

use crate::collector::types::DistanceSample;
use crate::config::GatewaySettings;
use crate::sink::{SampleSink, SinkError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway host (default: 127.0.0.1)
    pub host: String,
    /// Gateway port
    pub port: u16,
    /// Bearer authentication token
    pub token: String,
}

impl GatewayConfig {
    pub fn new(host: impl Into<String>, port: u16, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            token: token.into(),
        }
    }

    /// Load configuration written by a running gateway.
    ///
    /// Reads `runtime/gateway.port` and `runtime/gateway.token` under the
    /// odometer's local data directory.
    pub fn from_runtime_dir() -> Result<Self, GatewayError> {
        let runtime_dir = Self::default_runtime_dir()?;
        Self::from_dir(&runtime_dir)
    }

    /// Load port and token files from `runtime_dir`.
    pub fn from_dir(runtime_dir: &std::path::Path) -> Result<Self, GatewayError> {
        let port_path = runtime_dir.join("gateway.port");
        let token_path = runtime_dir.join("gateway.token");

        let port_str = std::fs::read_to_string(&port_path).map_err(|e| {
            GatewayError::Config(format!(
                "Failed to read gateway port from {port_path:?}: {e}"
            ))
        })?;

        let port: u16 = port_str.trim().parse().map_err(|e| {
            GatewayError::Config(format!("Invalid port number '{}': {}", port_str.trim(), e))
        })?;

        let token = std::fs::read_to_string(&token_path)
            .map_err(|e| {
                GatewayError::Config(format!(
                    "Failed to read gateway token from {token_path:?}: {e}"
                ))
            })?
            .trim()
            .to_string();

        Ok(Self::new("127.0.0.1", port, token))
    }

    fn default_runtime_dir() -> Result<PathBuf, GatewayError> {
        dirs::data_local_dir()
            .map(|dir| dir.join("scroll-odometer").join("runtime"))
            .ok_or_else(|| {
                GatewayError::Config("Could not determine local data directory".to_string())
            })
    }

    /// Get the full gateway URL.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Get the sample ingest endpoint URL.
    pub fn samples_url(&self) -> String {
        format!("{}/v1/samples", self.url())
    }

    /// Get the health check endpoint URL.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.url())
    }
}

impl From<&GatewaySettings> for GatewayConfig {
    fn from(settings: &GatewaySettings) -> Self {
        Self::new(settings.host.clone(), settings.port, settings.token.clone())
    }
}

/// Gateway client error types.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway config error: {0}")]
    Config(String),

    #[error("Gateway network error: {0}")]
    Network(String),

    #[error("Gateway server error ({status}): {message}")]
    Server { status: u16, message: String },
}

impl From<GatewayError> for SinkError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Server { .. } => SinkError::Rejected(e.to_string()),
            GatewayError::Config(_) | GatewayError::Network(_) => {
                SinkError::Unavailable(e.to_string())
            }
        }
    }
}

/// Body of a sample push.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplePayload {
    /// Sending device
    pub device_id: String,
    /// Distance in meters
    pub distance: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Originating application
    pub app_id: String,
    pub is_touch: bool,
    /// Producer version
    pub version: String,
}

impl SamplePayload {
    pub fn new(device_id: &str, sample: &DistanceSample) -> Self {
        Self {
            device_id: device_id.to_string(),
            distance: sample.distance_m,
            timestamp: sample.timestamp_ms,
            app_id: sample.app_id.clone(),
            is_touch: sample.is_touch,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Async client for the presentation gateway.
pub struct GatewayClient {
    config: GatewayConfig,
    client: reqwest::Client,
    device_id: String,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to create HTTP client: {e}")))?;

        // Generate device ID from hostname + instance
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let device_id = format!(
            "odometer-{}-{}",
            hostname,
            &uuid::Uuid::new_v4().to_string()[..8]
        );

        Ok(Self {
            config,
            client,
            device_id,
        })
    }

    /// Test connection to the gateway.
    pub async fn test_connection(&self) -> Result<bool, GatewayError> {
        let response = self
            .client
            .get(self.config.health_url())
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    /// Push one sample.
    pub async fn push_sample(&self, sample: &DistanceSample) -> Result<(), GatewayError> {
        let payload = SamplePayload::new(&self.device_id, sample);

        let response = self
            .client
            .post(self.config.samples_url())
            .header("Authorization", format!("Bearer {}", self.config.token))
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GatewayError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Blocking gateway client for use in synchronous contexts.
///
/// Must not be driven from inside a tokio runtime.
pub struct BlockingGatewayClient {
    inner: GatewayClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingGatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            inner: GatewayClient::new(config)?,
            runtime,
        })
    }

    /// Create a blocking client from the runtime directory.
    pub fn from_runtime() -> Result<Self, GatewayError> {
        Self::new(GatewayConfig::from_runtime_dir()?)
    }

    pub fn test_connection(&self) -> Result<bool, GatewayError> {
        self.runtime.block_on(self.inner.test_connection())
    }

    pub fn push_sample(&self, sample: &DistanceSample) -> Result<(), GatewayError> {
        self.runtime.block_on(self.inner.push_sample(sample))
    }

    pub fn device_id(&self) -> &str {
        self.inner.device_id()
    }
}

/// Sink that pushes each sample to the gateway.
pub struct GatewaySink {
    client: BlockingGatewayClient,
}

impl GatewaySink {
    pub fn new(client: BlockingGatewayClient) -> Self {
        Self { client }
    }

    pub fn device_id(&self) -> &str {
        self.client.device_id()
    }
}

impl SampleSink for GatewaySink {
    fn deliver(&mut self, sample: &DistanceSample) -> Result<(), SinkError> {
        self.client.push_sample(sample).map_err(SinkError::from)
    }

    fn name(&self) -> &str {
        "gateway"
    }
}
