//! Error types for fleet operations.

use std::path::PathBuf;

/// Result type alias using [`FleetError`].
pub type Result<T> = std::result::Result<T, FleetError>;

/// Errors surfaced by graph building, deploying and discovery.
///
/// Nothing in the core retries on any of these; callers decide whether to
/// rerun the whole operation.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    /// The root manifest transitively depends on another version of itself.
    #[error("can not depend on a different version of root module: {name}@{version}")]
    VersionConflict { name: String, version: String },

    /// A declared range matches no published version.
    #[error("no published version of {name} matches {range}: {reason}")]
    Resolution {
        name: String,
        range: String,
        reason: String,
    },

    /// Registry query failed or timed out.
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// The deploy tool failed for one service.
    #[error("deploy of {service} failed: {message}")]
    DeployTool { service: String, message: String },

    /// Discovery gave up after its attempt budget.
    #[error("services not discovered after {attempts} attempts: {}", pending.join(", "))]
    DiscoveryExhausted { attempts: u32, pending: Vec<String> },

    /// Manifest could not be read, parsed or written.
    #[error("manifest error at {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    /// A subprocess could not be spawned or exited unsuccessfully.
    #[error("command `{command}` failed: {message}")]
    Command { command: String, message: String },

    /// Configuration file unreadable or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FleetError {
    pub fn resolution(name: &str, range: &str, reason: impl Into<String>) -> Self {
        Self::Resolution {
            name: name.to_string(),
            range: range.to_string(),
            reason: reason.into(),
        }
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        Self::RegistryUnavailable(msg.into())
    }

    pub fn deploy_tool(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeployTool {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn manifest(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Manifest {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
