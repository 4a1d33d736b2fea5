//! External collaborators used by the deploy scheduler.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::command;
use crate::error::{FleetError, Result};
use crate::types::module_label;

/// A package checked out for deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPackage {
    /// Directory holding the package's manifest; the deploy runs here.
    pub package_dir: PathBuf,
    /// Directory removed once the deploy succeeds.
    pub staging_dir: PathBuf,
}

/// Materializes `name@version` into a local working directory.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    async fn materialize(&self, root_dir: &Path, name: &str, version: &str)
    -> Result<StagedPackage>;
}

/// Deploys a working directory and reports the assigned url.
#[async_trait]
pub trait DeployTool: Send + Sync {
    async fn deploy(&self, dir: &Path, env: &BTreeMap<String, String>) -> Result<String>;
}

/// Directory under the root holding staged packages.
pub const STAGING_DIR: &str = ".fleet";

/// Installs each package under `<root>/.fleet/<name>@<version>` so
/// concurrent installs never touch the same directory.
#[derive(Debug, Clone)]
pub struct NpmInstaller {
    program: String,
}

impl NpmInstaller {
    pub fn new() -> Self {
        Self {
            program: "npm".to_string(),
        }
    }

    pub fn staging_dir(root_dir: &Path, name: &str, version: &str) -> PathBuf {
        root_dir.join(STAGING_DIR).join(module_label(name, version))
    }
}

impl Default for NpmInstaller {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PackageInstaller for NpmInstaller {
    async fn materialize(
        &self,
        root_dir: &Path,
        name: &str,
        version: &str,
    ) -> Result<StagedPackage> {
        let staging_dir = Self::staging_dir(root_dir, name, version);
        tokio::fs::create_dir_all(&staging_dir)
            .await
            .map_err(|e| FleetError::manifest(&staging_dir, e))?;

        let args = vec![
            "install".to_string(),
            "--no-save".to_string(),
            "--prefix".to_string(),
            staging_dir.to_string_lossy().to_string(),
            module_label(name, version),
        ];
        command::run(&self.program, &args, Some(root_dir)).await?;

        let package_dir = staging_dir.join("node_modules").join(name);
        debug!(package = %package_dir.display(), "materialized");
        Ok(StagedPackage {
            package_dir,
            staging_dir,
        })
    }
}

/// Deploys with the `now` CLI.
#[derive(Debug, Clone, Default)]
pub struct NowDeployTool {
    token: Option<String>,
}

impl NowDeployTool {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    fn args(&self, env: &BTreeMap<String, String>) -> Vec<String> {
        let mut args = Vec::new();
        for (key, value) in env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        if let Some(token) = &self.token {
            args.push("--token".to_string());
            args.push(token.clone());
        }
        args
    }
}

#[async_trait]
impl DeployTool for NowDeployTool {
    async fn deploy(&self, dir: &Path, env: &BTreeMap<String, String>) -> Result<String> {
        let output = command::run("now", &self.args(env), Some(dir)).await?;
        let url = output
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| FleetError::Command {
                command: "now".to_string(),
                message: "no deployment url in output".to_string(),
            })?;
        Ok(normalize_url(url))
    }
}

/// Reduce a deploy url to the bare host form stored in manifests.
///
/// `https://u3.sh` becomes `u3.sh`; strings that do not parse as urls are
/// kept as given.
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) if url.has_host() => {
            let host = url.host_str().unwrap_or_default();
            let path = url.path().trim_end_matches('/');
            match url.port() {
                Some(port) => format!("{host}:{port}{path}"),
                None => format!("{host}{path}"),
            }
        }
        _ => raw.to_string(),
    }
}

/// Write `.npmrc` so the deployed instance can install private packages.
pub(crate) async fn write_npmrc(dir: &Path, token: &str) -> Result<()> {
    let path = dir.join(".npmrc");
    tokio::fs::write(&path, format!("//registry.npmjs.org/:_authToken={token}\n"))
        .await
        .map_err(|e| FleetError::manifest(&path, e))
}

/// Remove `<root>/.fleet` once no staged package is left in it.
pub(crate) async fn remove_staging_root(root_dir: &Path) {
    let dir = root_dir.join(STAGING_DIR);
    match tokio::fs::remove_dir(&dir).await {
        Ok(()) => debug!(dir = %dir.display(), "removed staging root"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(dir = %dir.display(), error = %e, "kept staging root"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_scheme() {
        assert_eq!(normalize_url("https://u3.sh"), "u3.sh");
        assert_eq!(normalize_url("https://u3.sh/"), "u3.sh");
    }

    #[test]
    fn normalize_keeps_port_and_path() {
        assert_eq!(normalize_url("http://localhost:3000/api"), "localhost:3000/api");
    }

    #[test]
    fn normalize_keeps_bare_host() {
        assert_eq!(normalize_url("u4.sh"), "u4.sh");
    }

    #[test]
    fn now_args_carry_env_and_token() {
        let tool = NowDeployTool::new(Some("NOW-TOKEN".to_string()));
        let mut env = BTreeMap::new();
        env.insert("REGISTRY_HOST".to_string(), "REGISTRY-HOST".to_string());
        env.insert("a".to_string(), "b".to_string());

        assert_eq!(
            tool.args(&env),
            vec![
                "-e",
                "REGISTRY_HOST=REGISTRY-HOST",
                "-e",
                "a=b",
                "--token",
                "NOW-TOKEN"
            ]
        );
    }

    #[test]
    fn staging_dir_is_per_version() {
        let dir = NpmInstaller::staging_dir(Path::new("/work"), "s3", "1.0.0");
        assert_eq!(dir, PathBuf::from("/work/.fleet/s3@1.0.0"));
    }
}
