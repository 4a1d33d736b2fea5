//! Deployment registry: the cluster-wide list of live service instances.
//!
//! The registry is read-only to fleet. It is queried once per graph build
//! and once per discovery tick.

mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use http::{DEFAULT_TIMEOUT, HttpRegistryClient};

/// One deployed instance as reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: String,
    pub version: String,
    #[serde(rename = "env", default)]
    pub environment: String,
    pub url: String,
    /// Creation time in milliseconds since the epoch.
    pub created: i64,
}

impl DeploymentRecord {
    pub fn new(name: &str, version: &str, environment: &str, url: &str, created: i64) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            environment: environment.to_string(),
            url: url.to_string(),
            created,
        }
    }

    fn matches(&self, name: &str, version: &str, environment: &str) -> bool {
        self.name == name && self.version == version && self.environment == environment
    }
}

/// Source of deployment records.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Current deployments visible cluster-wide.
    ///
    /// Fails with `RegistryUnavailable` on connection failure or timeout.
    async fn list_deployments(&self) -> Result<Vec<DeploymentRecord>>;
}

/// The authoritative (most recently created) record for a tuple.
pub fn latest_deployment<'a>(
    records: &'a [DeploymentRecord],
    name: &str,
    version: &str,
    environment: &str,
) -> Option<&'a DeploymentRecord> {
    records
        .iter()
        .filter(|record| record.matches(name, version, environment))
        .max_by_key(|record| record.created)
}
