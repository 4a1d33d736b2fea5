//! Service manifests (`package.json`) and their private runtime section.
//!
//! A manifest declares service dependencies as semver ranges under
//! `services`. Fleet owns the underscore-prefixed keys: `_services` holds
//! what each dependency resolved to, `_env` the environment signature and
//! `_registry` the registry host deployed instances should query.

mod store;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use store::{MANIFEST_FILE, read_manifest, write_manifest};

/// What a consumer knows about one of its dependencies.
///
/// On the wire this is either a bare url string or an object
/// `{ "version": .., "lastDeploy": .. }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceRef {
    /// Dependency is reachable at a known address.
    Resolved(String),
    /// Dependency is being redeployed; discovery waits for a record of
    /// `version` created strictly after `since`.
    Pending {
        version: String,
        #[serde(rename = "lastDeploy")]
        since: i64,
    },
}

impl ServiceRef {
    pub fn pending(version: impl Into<String>, since: i64) -> Self {
        Self::Pending {
            version: version.into(),
            since,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Resolved(url) => Some(url),
            Self::Pending { .. } => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,

    /// Declared service dependencies: name -> semver range.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub services: BTreeMap<String, String>,

    #[serde(
        rename = "_services",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub resolved_services: Option<BTreeMap<String, ServiceRef>>,

    #[serde(rename = "_env", default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,

    #[serde(rename = "_registry", default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,

    /// Every other key, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            services: BTreeMap::new(),
            resolved_services: None,
            env: None,
            registry: None,
            extra: Map::new(),
        }
    }

    pub fn with_service(mut self, name: impl Into<String>, range: impl Into<String>) -> Self {
        self.services.insert(name.into(), range.into());
        self
    }

    /// Names of dependencies still waiting on discovery.
    pub fn pending_services(&self) -> Vec<String> {
        self.resolved_services
            .as_ref()
            .map(|services| {
                services
                    .iter()
                    .filter(|(_, service)| service.is_pending())
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fill the private section ahead of a deploy.
    pub fn prepare_for_deploy(
        &mut self,
        services: BTreeMap<String, ServiceRef>,
        env: &str,
        registry: Option<&str>,
    ) {
        self.resolved_services = Some(services);
        self.env = Some(env.to_string());
        if let Some(host) = registry {
            self.registry = Some(host.to_string());
        }
        self.extra.remove("devDependencies");
    }
}
