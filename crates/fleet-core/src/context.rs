//! Per-run deployment context.

use std::path::{Path, PathBuf};

use crate::config::FleetConfig;
use crate::types::EnvironmentSignature;

/// Everything a deploy run needs besides its collaborators.
///
/// Frontends create this once per run and pass it down explicitly.
#[derive(Debug, Clone)]
pub struct DeploymentContext {
    root_dir: PathBuf,
    environment: EnvironmentSignature,
    registry_host: Option<String>,
    npm_token: Option<String>,
}

impl DeploymentContext {
    pub fn new(root_dir: PathBuf, environment: EnvironmentSignature) -> Self {
        Self {
            root_dir,
            environment,
            registry_host: None,
            npm_token: None,
        }
    }

    /// Context carrying the connectivity settings from `config`.
    pub fn from_config(
        root_dir: PathBuf,
        environment: EnvironmentSignature,
        config: &FleetConfig,
    ) -> Self {
        Self {
            root_dir,
            environment,
            registry_host: config.registry_host.clone(),
            npm_token: config.npm_token.clone(),
        }
    }

    pub fn with_registry_host(mut self, host: impl Into<String>) -> Self {
        self.registry_host = Some(host.into());
        self
    }

    pub fn with_npm_token(mut self, token: impl Into<String>) -> Self {
        self.npm_token = Some(token.into());
        self
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn environment(&self) -> &EnvironmentSignature {
        &self.environment
    }

    pub fn registry_host(&self) -> Option<&str> {
        self.registry_host.as_deref()
    }

    pub fn npm_token(&self) -> Option<&str> {
        self.npm_token.as_deref()
    }
}
