//! Version resolution: ranges to concrete versions, and each version's own
//! declared service dependencies.

mod catalog;
mod npm;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;

pub use catalog::CatalogResolver;
pub use npm::{NpmResolver, parse_declared_services, parse_latest_version};

/// Declared service dependencies: name -> semver range.
pub type DeclaredServices = BTreeMap<String, String>;

#[async_trait]
pub trait VersionResolver: Send + Sync {
    /// Latest published version of `name` matching `range`.
    ///
    /// Fails with `Resolution` when nothing matches.
    async fn resolve_latest_version(&self, name: &str, range: &str) -> Result<String>;

    /// Service dependencies declared by `name@version`; empty when none.
    async fn declared_dependencies(&self, name: &str, version: &str) -> Result<DeclaredServices>;
}
