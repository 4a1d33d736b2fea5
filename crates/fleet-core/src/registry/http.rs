//! HTTP registry client.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use super::{DeploymentRecord, RegistryClient};
use crate::error::{FleetError, Result};

/// Upper bound on a single registry query.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Fetches the deployment list with `GET /` against the registry host.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpRegistryClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("fleet/0.1.0")
            .timeout(timeout)
            .build()
            .map_err(|e| FleetError::registry(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { base_url, client })
    }

    /// Client for `https://<host>/`.
    pub fn from_host(host: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(&format!("https://{host}/"))
            .map_err(|e| FleetError::Config(format!("invalid registry host '{host}': {e}")))?;
        Self::new(base_url, timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn list_deployments(&self) -> Result<Vec<DeploymentRecord>> {
        debug!(url = %self.base_url, "fetching deployment list");

        let response = self
            .client
            .get(self.base_url.clone())
            .send()
            .await
            .map_err(|e| FleetError::registry(format!("{}: {e}", self.base_url)))?;

        if !response.status().is_success() {
            return Err(FleetError::registry(format!(
                "HTTP {} from {}",
                response.status(),
                self.base_url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FleetError::registry(format!("{}: {e}", self.base_url)))?;

        Ok(parse_deployments(&body))
    }
}

/// Anything other than a JSON list of records reads as no deployments.
fn parse_deployments(body: &[u8]) -> Vec<DeploymentRecord> {
    match serde_json::from_slice(body) {
        Ok(records) => records,
        Err(e) => {
            warn!("registry returned an unreadable deployment list: {e}");
            Vec::new()
        }
    }
}
