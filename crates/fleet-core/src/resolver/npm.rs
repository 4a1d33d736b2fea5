//! Resolver backed by the `npm` CLI.

use async_trait::async_trait;
use semver::Version;
use serde::Deserialize;
use tracing::debug;

use super::{DeclaredServices, VersionResolver};
use crate::command;
use crate::error::{FleetError, Result};

#[derive(Debug, Clone)]
pub struct NpmResolver {
    program: String,
}

impl NpmResolver {
    pub fn new() -> Self {
        Self::with_program("npm")
    }

    /// Use a different executable (e.g. a wrapper script).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for NpmResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VersionResolver for NpmResolver {
    async fn resolve_latest_version(&self, name: &str, range: &str) -> Result<String> {
        let args = view_args(&format!("{name}@{range}"), "version");
        let output = command::run(&self.program, &args, None)
            .await
            .map_err(|e| FleetError::resolution(name, range, e.to_string()))?;

        let version = parse_latest_version(&output)
            .ok_or_else(|| FleetError::resolution(name, range, "no matching version published"))?;
        debug!(%name, %range, %version, "resolved");
        Ok(version)
    }

    async fn declared_dependencies(&self, name: &str, version: &str) -> Result<DeclaredServices> {
        let args = view_args(&format!("{name}@{version}"), "services");
        let output = command::run(&self.program, &args, None).await?;
        parse_declared_services(&output).map_err(|e| {
            FleetError::resolution(name, version, format!("unreadable services field: {e}"))
        })
    }
}

fn view_args(package: &str, field: &str) -> Vec<String> {
    vec![
        "view".to_string(),
        package.to_string(),
        field.to_string(),
        "--json".to_string(),
    ]
}

/// `npm view --json` prints a single match as a string and several as an
/// array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ViewedVersions {
    One(String),
    Many(Vec<String>),
}

/// Latest version from `npm view <name>@<range> version --json` output.
///
/// Empty output means nothing matched.
pub fn parse_latest_version(output: &str) -> Option<String> {
    let output = output.trim();
    if output.is_empty() {
        return None;
    }
    let versions = match serde_json::from_str(output).ok()? {
        ViewedVersions::One(version) => vec![version],
        ViewedVersions::Many(versions) => versions,
    };

    let newest = versions
        .iter()
        .filter_map(|raw| Version::parse(raw).ok().map(|parsed| (parsed, raw)))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, raw)| raw.clone());
    newest.or_else(|| versions.last().cloned())
}

/// Services map from `npm view <name>@<version> services --json` output.
///
/// npm prints nothing when the field is absent.
pub fn parse_declared_services(
    output: &str,
) -> std::result::Result<DeclaredServices, serde_json::Error> {
    let output = output.trim();
    if output.is_empty() {
        return Ok(DeclaredServices::new());
    }
    let services: Option<DeclaredServices> = serde_json::from_str(output)?;
    Ok(services.unwrap_or_default())
}
