//! In-memory resolver over a fixed set of published versions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use semver::{Version, VersionReq};

use super::{DeclaredServices, VersionResolver};
use crate::error::{FleetError, Result};

/// Published packages keyed by name, then by version.
#[derive(Debug, Clone, Default)]
pub struct CatalogResolver {
    packages: BTreeMap<String, BTreeMap<Version, DeclaredServices>>,
}

impl CatalogResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `name@version` declaring `services`.
    ///
    /// Panics on a version that is not valid semver; catalogs are built from
    /// literals.
    pub fn publish(mut self, name: &str, version: &str, services: &[(&str, &str)]) -> Self {
        let version = Version::parse(version)
            .unwrap_or_else(|e| panic!("invalid catalog version {name}@{version}: {e}"));
        let services = services
            .iter()
            .map(|(dep, range)| (dep.to_string(), range.to_string()))
            .collect();
        self.packages
            .entry(name.to_string())
            .or_default()
            .insert(version, services);
        self
    }
}

#[async_trait]
impl VersionResolver for CatalogResolver {
    async fn resolve_latest_version(&self, name: &str, range: &str) -> Result<String> {
        let req = VersionReq::parse(range)
            .map_err(|e| FleetError::resolution(name, range, format!("invalid range: {e}")))?;
        let versions = self
            .packages
            .get(name)
            .ok_or_else(|| FleetError::resolution(name, range, "package not published"))?;

        versions
            .keys()
            .rev()
            .find(|version| req.matches(version))
            .map(Version::to_string)
            .ok_or_else(|| FleetError::resolution(name, range, "no matching version published"))
    }

    async fn declared_dependencies(&self, name: &str, version: &str) -> Result<DeclaredServices> {
        let parsed = Version::parse(version)
            .map_err(|e| FleetError::resolution(name, version, format!("invalid version: {e}")))?;
        Ok(self
            .packages
            .get(name)
            .and_then(|versions| versions.get(&parsed))
            .cloned()
            .unwrap_or_default())
    }
}
