//! Fakes and fixtures shared by the integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Barrier;

use fleet_core::deploy::{DeployTool, NpmInstaller, PackageInstaller, StagedPackage};
use fleet_core::error::{FleetError, Result};
use fleet_core::manifest::{Manifest, read_manifest, write_manifest};
use fleet_core::registry::{DeploymentRecord, RegistryClient};
use fleet_core::resolver::CatalogResolver;

pub const ENV: &str = "a=b&c=d";

/// Registry contents shared by most scenarios.
pub fn deployments() -> Vec<DeploymentRecord> {
    vec![
        DeploymentRecord::new("s1", "1.0.0", "a=b", "u3.sh", 13),
        DeploymentRecord::new("s1", "1.0.0", "a=c", "u2.sh", 12),
        DeploymentRecord::new("s1", "2.0.0", "c=d", "u4.sh", 21),
        DeploymentRecord::new("s1", "2.0.0", ENV, "u5.sh", 22),
        DeploymentRecord::new("s2", "1.0.0", "c=d", "u6.sh", 11),
        DeploymentRecord::new("s2", "2.0.0", "a=b", "u7.sh", 21),
        DeploymentRecord::new("s2", "2.0.0", ENV, "u8.sh", 22),
        DeploymentRecord::new("s3", "1.0.0", ENV, "u9.sh", 11),
        DeploymentRecord::new("s4", "1.0.0", ENV, "u10.sh", 11),
    ]
}

/// s1@2 -> {s2 ^2, s3 ^1}; s3@1 -> {s4 ^2}; s4@2 -> {s2 ^2}.
pub fn fleet_catalog() -> CatalogResolver {
    CatalogResolver::new()
        .publish("s1", "2.0.0", &[("s2", "^2"), ("s3", "^1")])
        .publish("s2", "2.0.0", &[])
        .publish("s3", "1.0.0", &[("s4", "^2")])
        .publish("s4", "1.0.0", &[])
        .publish("s4", "2.0.0", &[("s2", "^2")])
}

pub fn root_declared() -> BTreeMap<String, String> {
    [("s2", "^2"), ("s3", "^1")]
        .into_iter()
        .map(|(name, range)| (name.to_string(), range.to_string()))
        .collect()
}

/// Write the root package manifest into `dir`.
pub async fn write_root_manifest(dir: &Path) {
    let manifest = Manifest::new("s1", "2.0.0")
        .with_service("s2", "^2")
        .with_service("s3", "^1");
    write_manifest(dir, &manifest).await.unwrap();
}

/// Registry returning the same list on every call.
pub struct StaticRegistry {
    records: Vec<DeploymentRecord>,
    calls: AtomicUsize,
}

impl StaticRegistry {
    pub fn new(records: Vec<DeploymentRecord>) -> Self {
        Self {
            records,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryClient for StaticRegistry {
    async fn list_deployments(&self) -> Result<Vec<DeploymentRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}

/// Registry answering from a script of ticks; the last tick repeats.
pub struct ScriptedRegistry {
    ticks: Mutex<VecDeque<Result<Vec<DeploymentRecord>>>>,
    calls: AtomicUsize,
}

impl ScriptedRegistry {
    pub fn new(ticks: Vec<Result<Vec<DeploymentRecord>>>) -> Self {
        Self {
            ticks: Mutex::new(ticks.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    async fn list_deployments(&self) -> Result<Vec<DeploymentRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut ticks = self.ticks.lock().unwrap();
        let tick = if ticks.len() > 1 {
            ticks.pop_front()
        } else {
            ticks.front().map(|tick| match tick {
                Ok(records) => Ok(records.clone()),
                Err(e) => Err(FleetError::registry(e.to_string())),
            })
        };
        tick.unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Installer that writes a minimal package in the npm staging layout.
#[derive(Default)]
pub struct DirInstaller {
    pub installed: Mutex<Vec<String>>,
}

#[async_trait]
impl PackageInstaller for DirInstaller {
    async fn materialize(
        &self,
        root_dir: &Path,
        name: &str,
        version: &str,
    ) -> Result<StagedPackage> {
        let staging_dir = NpmInstaller::staging_dir(root_dir, name, version);
        let package_dir = staging_dir.join("node_modules").join(name);
        tokio::fs::create_dir_all(&package_dir).await.unwrap();

        let mut manifest = Manifest::new(name, version);
        manifest.extra.insert(
            "devDependencies".to_string(),
            serde_json::json!({ "tape": "^4.6.0" }),
        );
        write_manifest(&package_dir, &manifest).await?;

        self.installed
            .lock()
            .unwrap()
            .push(format!("{name}@{version}"));
        Ok(StagedPackage {
            package_dir,
            staging_dir,
        })
    }
}

/// What the deploy tool saw for one call.
#[derive(Debug, Clone)]
pub struct DeployCall {
    pub dir: PathBuf,
    pub manifest: Manifest,
    pub env: BTreeMap<String, String>,
    pub has_npmrc: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Finished(String),
}

/// Deploy tool assigning `<name>-new.sh` urls and recording every call.
#[derive(Default)]
pub struct RecordingDeployTool {
    pub calls: Mutex<Vec<DeployCall>>,
    pub events: Mutex<Vec<Event>>,
    /// Services whose deploy fails.
    pub failing: Vec<String>,
    /// Services in `gated` wait here, so they only finish when run together.
    pub barrier: Option<Arc<Barrier>>,
    pub gated: Vec<String>,
    /// Services whose deploy takes a little longer than the rest.
    pub slow: Vec<String>,
}

impl RecordingDeployTool {
    pub fn calls(&self) -> Vec<DeployCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_for(&self, name: &str) -> DeployCall {
        self.calls()
            .into_iter()
            .find(|call| call.manifest.name == name)
            .unwrap_or_else(|| panic!("{name} was not deployed"))
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeployTool for RecordingDeployTool {
    async fn deploy(&self, dir: &Path, env: &BTreeMap<String, String>) -> Result<String> {
        let manifest = read_manifest(dir).await?;
        let name = manifest.name.clone();
        self.events
            .lock()
            .unwrap()
            .push(Event::Started(name.clone()));
        self.calls.lock().unwrap().push(DeployCall {
            dir: dir.to_path_buf(),
            manifest,
            env: env.clone(),
            has_npmrc: dir.join(".npmrc").exists(),
        });

        if self.slow.contains(&name) {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        if let Some(barrier) = &self.barrier
            && self.gated.contains(&name)
        {
            barrier.wait().await;
        }

        if self.failing.contains(&name) {
            return Err(FleetError::Command {
                command: "now".to_string(),
                message: format!("{name} rejected"),
            });
        }

        self.events
            .lock()
            .unwrap()
            .push(Event::Finished(name.clone()));
        Ok(format!("{name}-new.sh"))
    }
}
