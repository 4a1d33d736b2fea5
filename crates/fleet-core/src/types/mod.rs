//! Shared core types used across graph, deploy and discovery layers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies which configuration variant of a service is deployed.
///
/// Stored as `key=value` pairs joined by `&`. Two deployments of the same
/// version with different signatures never satisfy each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentSignature(String);

impl EnvironmentSignature {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parsed `(key, value)` pairs in declaration order.
    ///
    /// A pair without `=` maps to an empty value; empty segments are skipped.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.0
            .split('&')
            .filter(|segment| !segment.is_empty())
            .map(|segment| match segment.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (segment.to_string(), String::new()),
            })
            .collect()
    }

    /// Environment variables handed to the deploy tool.
    pub fn to_env_vars(&self, registry_host: Option<&str>) -> BTreeMap<String, String> {
        let mut env: BTreeMap<String, String> = self.pairs().into_iter().collect();
        if let Some(host) = registry_host {
            env.insert("REGISTRY_HOST".to_string(), host.to_string());
        }
        env
    }
}

impl fmt::Display for EnvironmentSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EnvironmentSignature {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Formats the `name@version` label used in logs and errors.
pub fn module_label(name: &str, version: &str) -> String {
    format!("{name}@{version}")
}
