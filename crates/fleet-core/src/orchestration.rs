//! End-to-end deploy and discovery runs.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::context::DeploymentContext;
use crate::deploy::{DeployScheduler, DeploySummary};
use crate::discovery::Discoverer;
use crate::error::Result;
use crate::graph::build_graph;
use crate::manifest::{Manifest, read_manifest, write_manifest};
use crate::registry::RegistryClient;
use crate::resolver::VersionResolver;
use crate::types::module_label;

/// Wires the registry, the version resolver and the deploy scheduler.
pub struct DeployOrchestrator {
    registry: Arc<dyn RegistryClient>,
    resolver: Arc<dyn VersionResolver>,
    scheduler: DeployScheduler,
}

impl DeployOrchestrator {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        resolver: Arc<dyn VersionResolver>,
        scheduler: DeployScheduler,
    ) -> Self {
        Self {
            registry,
            resolver,
            scheduler,
        }
    }

    /// Discoverer polling this orchestrator's registry.
    pub fn discoverer(&self, interval: Duration) -> Discoverer {
        Discoverer::new(self.registry.clone(), interval)
    }

    /// Deploy the manifest in `ctx.root_dir()` and every stale service it
    /// transitively depends on.
    pub async fn deploy(&self, ctx: &DeploymentContext) -> Result<DeploySummary> {
        let manifest = read_manifest(ctx.root_dir()).await?;
        info!(
            root = %module_label(&manifest.name, &manifest.version),
            env = %ctx.environment(),
            "starting deploy"
        );

        let deployments = self.registry.list_deployments().await?;
        let mut graph = build_graph(
            self.resolver.as_ref(),
            &manifest.name,
            &manifest.version,
            manifest.services.clone(),
            &deployments,
            ctx.environment().clone(),
        )
        .await?;

        self.scheduler.deploy_all(&mut graph, ctx).await
    }

    /// Resolve the placeholders of the manifest in `dir` and write it back.
    pub async fn discover(&self, dir: &Path, discoverer: &Discoverer) -> Result<Manifest> {
        let manifest = read_manifest(dir).await?;
        let pending = manifest.pending_services();
        if pending.is_empty() {
            return Ok(manifest);
        }

        info!(?pending, "discovering services");
        let manifest = discoverer.discover(manifest).await?;
        write_manifest(dir, &manifest).await?;
        Ok(manifest)
    }
}
