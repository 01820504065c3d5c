//! HTTP client for the asset registry.

use async_trait::async_trait;
use kiosk_types::{holder_id_from_json, RegistryRecord};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::lookup::RegistryLookup;
use crate::network::RegistryNetwork;

/// Default timeout for asset lookups.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for health probes.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Header carrying the API credential.
const PROJECT_ID_HEADER: &str = "project_id";

/// Connection settings for [`HttpRegistry`].
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    pub network: RegistryNetwork,
    /// Overrides the network's base URL (self-hosted or test registries).
    pub base_url: Option<String>,
    pub project_id: String,
    pub timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            network: RegistryNetwork::default(),
            base_url: None,
            project_id: String::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RegistryConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.network.base_url())
            .trim_end_matches('/')
    }
}

/// Asset registry client.
///
/// Sends `GET {base}/v0/assets/{registry_key}{asset_ref}` and maps the
/// on-chain metadata to a [`RegistryRecord`].
pub struct HttpRegistry {
    /// HTTP client (reusable connection pool).
    http_client: reqwest::Client,
    config: RegistryConfig,
    name: String,
}

/// Raw JSON response for a single asset.
#[derive(Debug, Deserialize)]
struct AssetResponse {
    #[serde(default)]
    onchain_metadata: Option<Value>,
}

impl HttpRegistry {
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::Client(e.to_string()))?;
        let name = format!("registry {} ({})", config.network, config.base_url());
        Ok(Self {
            http_client,
            config,
            name,
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The asset id is pushed as one percent-encoded path segment, so card
    /// contents cannot reach other registry endpoints.
    fn asset_url(&self, registry_key: &str, asset_ref: &str) -> Result<Url, RegistryError> {
        let mut url = Url::parse(self.config.base_url())
            .map_err(|e| RegistryError::Client(format!("invalid registry url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| RegistryError::Client("registry url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(["v0", "assets"])
            .push(&format!("{registry_key}{asset_ref}"));
        Ok(url)
    }
}

fn map_send_error(e: reqwest::Error) -> RegistryError {
    if e.is_timeout() {
        RegistryError::Unreachable(format!("request timed out: {e}"))
    } else if e.is_connect() {
        RegistryError::Unreachable(format!("connection failed: {e}"))
    } else {
        RegistryError::RequestFailed(e.to_string())
    }
}

/// Build a record from an asset's on-chain metadata.
///
/// Missing fields become empty strings; a missing holder id therefore never
/// matches a card.
pub fn record_from_metadata(metadata: &Value) -> RegistryRecord {
    let text = |key: &str| {
        metadata
            .get(key)
            .and_then(holder_id_from_json)
            .unwrap_or_default()
    };
    RegistryRecord {
        holder_id: text("student_id"),
        holder_name: text("student_name"),
        department: text("department"),
        issued_at: text("issued_at"),
    }
}

#[async_trait]
impl RegistryLookup for HttpRegistry {
    async fn lookup(
        &self,
        registry_key: &str,
        asset_ref: &str,
    ) -> Result<Option<RegistryRecord>, RegistryError> {
        let asset_id = format!("{registry_key}{asset_ref}");
        if asset_id.is_empty() || asset_id == "." || asset_id == ".." {
            debug!(%asset_id, "not a usable asset id");
            return Ok(None);
        }
        let url = self.asset_url(registry_key, asset_ref)?;
        debug!(%url, "querying registry");

        let response = self
            .http_client
            .get(url)
            .header(PROJECT_ID_HEADER, &self.config.project_id)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            warn!(%status, "registry returned an error status");
            return Err(RegistryError::RequestFailed(format!("HTTP status {status}")));
        }

        let asset: AssetResponse = response.json().await.map_err(|e| {
            RegistryError::InvalidResponse(format!("failed to parse asset response: {e}"))
        })?;

        let metadata = asset.onchain_metadata.unwrap_or(Value::Null);
        Ok(Some(record_from_metadata(&metadata)))
    }

    async fn is_reachable(&self) -> bool {
        let url = format!("{}/v0/health", self.config.base_url());
        match self
            .http_client
            .get(&url)
            .header(PROJECT_ID_HEADER, &self.config.project_id)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("registry health check failed: {e}");
                false
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
