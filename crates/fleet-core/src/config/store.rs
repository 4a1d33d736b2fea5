//! Config store for loading fleet.toml.

use std::path::{Path, PathBuf};

use super::FleetConfig;
use crate::error::{FleetError, Result};

/// `<config dir>/fleet/fleet.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fleet").join("fleet.toml"))
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: Option<PathBuf>,
}

impl ConfigStore {
    /// Store at an explicit path, falling back to the default location.
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path: config_path.or_else(default_config_path),
        }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Load the file (defaults when missing) without env overrides.
    pub fn load_file(&self) -> Result<FleetConfig> {
        let Some(path) = self.config_path.as_ref() else {
            return Ok(FleetConfig::default());
        };
        if !path.exists() {
            return Ok(FleetConfig::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            FleetError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        FleetConfig::parse(&content).map_err(|e| match e {
            FleetError::Config(msg) => FleetError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Load the file and apply environment overrides.
    pub fn load(&self) -> Result<FleetConfig> {
        let mut config = self.load_file()?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }
}
