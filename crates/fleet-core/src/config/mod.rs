//! Fleet configuration (`fleet.toml`).

mod store;

use std::num::NonZeroU32;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FleetError, Result};

pub use store::{ConfigStore, default_config_path};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Host serving the deployment list, also handed to deployed services.
    pub registry_host: Option<String>,
    pub registry_timeout_secs: u64,
    /// Written to `.npmrc` of staged packages.
    pub npm_token: Option<String>,
    /// Passed to the deploy tool.
    pub deploy_token: Option<String>,
    pub discovery: DiscoveryConfig,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            registry_host: None,
            registry_timeout_secs: 15,
            npm_token: None,
            deploy_token: None,
            discovery: DiscoveryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub poll_interval_ms: u64,
    /// Registry scans before giving up; 0 polls forever.
    pub max_attempts: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            max_attempts: 150,
        }
    }
}

impl DiscoveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn attempt_limit(&self) -> Option<NonZeroU32> {
        NonZeroU32::new(self.max_attempts)
    }
}

impl FleetConfig {
    pub fn parse(content: &str) -> Result<Self> {
        let config: FleetConfig =
            toml::from_str(content).map_err(|e| FleetError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.registry_timeout_secs == 0 {
            return Err(FleetError::Config(
                "registry_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(host) = &self.registry_host
            && host.trim().is_empty()
        {
            return Err(FleetError::Config("registry_host is empty".to_string()));
        }
        Ok(())
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }

    /// Apply `REGISTRY_HOST`, `NPM_TOKEN` and `NOW_TOKEN` from `lookup`.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());
        if let Some(host) = non_empty("REGISTRY_HOST") {
            self.registry_host = Some(host);
        }
        if let Some(token) = non_empty("NPM_TOKEN") {
            self.npm_token = Some(token);
        }
        if let Some(token) = non_empty("NOW_TOKEN") {
            self.deploy_token = Some(token);
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }
}
