//! Deploy scheduling over a built service graph.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use super::tools::{
    DeployTool, PackageInstaller, StagedPackage, remove_staging_root, write_npmrc,
};
use crate::context::DeploymentContext;
use crate::error::{FleetError, Result};
use crate::graph::{NodeId, ServiceGraph};
use crate::manifest::{ServiceRef, read_manifest, write_manifest};
use crate::types::module_label;

/// Work for one stale node, planned before any deploy starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployJob {
    pub node: NodeId,
    pub name: String,
    pub version: String,
    pub is_root: bool,
    /// The `_services` section written into this node's manifest.
    pub services: BTreeMap<String, ServiceRef>,
}

impl DeployJob {
    pub fn label(&self) -> String {
        module_label(&self.name, &self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedService {
    pub node: NodeId,
    pub name: String,
    pub version: String,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct DeploySummary {
    pub deployed: Vec<DeployedService>,
    /// `name@version` of nodes whose existing deployment was kept.
    pub reused: Vec<String>,
}

/// What `dependant`'s manifest records for each of its dependencies.
///
/// Stale dependencies become placeholders for discovery; the rest point at
/// their known url.
pub fn service_refs(graph: &ServiceGraph, dependant: NodeId) -> BTreeMap<String, ServiceRef> {
    graph
        .node(dependant)
        .dependencies
        .iter()
        .map(|&id| {
            let dependency = graph.node(id);
            let service = if dependency.needs_deploy {
                ServiceRef::pending(dependency.version.clone(), dependency.last_deploy)
            } else {
                ServiceRef::Resolved(dependency.last_url.clone())
            };
            (dependency.name.clone(), service)
        })
        .collect()
}

/// Jobs for every node that needs a deploy, in graph order (root first).
pub fn plan(graph: &ServiceGraph) -> Vec<DeployJob> {
    let root = graph.root();
    graph
        .ids()
        .filter(|&id| graph.node(id).needs_deploy)
        .map(|id| {
            let node = graph.node(id);
            DeployJob {
                node: id,
                name: node.name.clone(),
                version: node.version.clone(),
                is_root: Some(id) == root,
                services: service_refs(graph, id),
            }
        })
        .collect()
}

/// Runs deploy jobs: the root alone first, then every other stale node
/// concurrently.
#[derive(Clone)]
pub struct DeployScheduler {
    installer: Arc<dyn PackageInstaller>,
    tool: Arc<dyn DeployTool>,
}

impl DeployScheduler {
    pub fn new(installer: Arc<dyn PackageInstaller>, tool: Arc<dyn DeployTool>) -> Self {
        Self { installer, tool }
    }

    /// Deploy every stale node of `graph`.
    ///
    /// A failed root deploy stops the run before anything else starts.
    /// After a failed non-root deploy, the deploys already in flight still
    /// run to completion and are recorded; the first error is returned once
    /// they have settled. Nothing is retried.
    pub async fn deploy_all(
        &self,
        graph: &mut ServiceGraph,
        ctx: &DeploymentContext,
    ) -> Result<DeploySummary> {
        let mut summary = DeploySummary {
            deployed: Vec::new(),
            reused: graph
                .nodes()
                .iter()
                .filter(|node| !node.needs_deploy)
                .map(|node| node.label())
                .collect(),
        };

        let ctx = Arc::new(ctx.clone());
        let (root_jobs, jobs): (Vec<_>, Vec<_>) =
            plan(graph).into_iter().partition(|job| job.is_root);

        for job in root_jobs {
            let deployed = self.run(job, ctx.clone()).await?;
            record(graph, &mut summary, deployed);
        }

        let mut in_flight: FuturesUnordered<_> = jobs
            .into_iter()
            .map(|job| {
                let label = job.label();
                tokio::spawn(self.run(job, ctx.clone())).map(move |joined| match joined {
                    Ok(result) => result,
                    Err(e) => Err(FleetError::deploy_tool(
                        label,
                        format!("deploy task failed: {e}"),
                    )),
                })
            })
            .collect();

        let mut first_error = None;
        while let Some(result) = in_flight.next().await {
            match result {
                Ok(deployed) => record(graph, &mut summary, deployed),
                Err(e) => {
                    warn!(error = %e, remaining = in_flight.len(), "deploy failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        remove_staging_root(ctx.root_dir()).await;

        if let Some(e) = first_error {
            return Err(e);
        }

        info!(
            deployed = summary.deployed.len(),
            reused = summary.reused.len(),
            "deploy finished"
        );
        Ok(summary)
    }

    fn run(
        &self,
        job: DeployJob,
        ctx: Arc<DeploymentContext>,
    ) -> impl Future<Output = Result<DeployedService>> + Send + use<> {
        let installer = self.installer.clone();
        let tool = self.tool.clone();
        async move { run_job(job, installer, tool, ctx).await }
    }
}

fn record(graph: &mut ServiceGraph, summary: &mut DeploySummary, deployed: DeployedService) {
    let node = graph.node_mut(deployed.node);
    node.last_url = deployed.url.clone();
    node.needs_deploy = false;
    summary.deployed.push(deployed);
}

async fn run_job(
    job: DeployJob,
    installer: Arc<dyn PackageInstaller>,
    tool: Arc<dyn DeployTool>,
    ctx: Arc<DeploymentContext>,
) -> Result<DeployedService> {
    let label = job.label();
    info!(service = %label, env = %ctx.environment(), "deploying");

    let staged = if job.is_root {
        None
    } else {
        Some(
            installer
                .materialize(ctx.root_dir(), &job.name, &job.version)
                .await?,
        )
    };

    let result = deploy_in(&job, staged.as_ref(), tool.as_ref(), &ctx).await;

    if let Some(staged) = staged {
        match tokio::fs::remove_dir_all(&staged.staging_dir).await {
            Ok(()) => debug!(service = %label, "removed working directory"),
            Err(e) => warn!(
                service = %label,
                dir = %staged.staging_dir.display(),
                error = %e,
                "failed to remove working directory"
            ),
        }
    }

    let url = result?;
    info!(service = %label, %url, "deployed");
    Ok(DeployedService {
        node: job.node,
        name: job.name,
        version: job.version,
        url,
    })
}

/// Write the deploy manifest for `job` and hand its directory to `tool`.
async fn deploy_in(
    job: &DeployJob,
    staged: Option<&StagedPackage>,
    tool: &dyn DeployTool,
    ctx: &DeploymentContext,
) -> Result<String> {
    let dir = staged
        .map(|staged| staged.package_dir.clone())
        .unwrap_or_else(|| ctx.root_dir().to_path_buf());

    let mut manifest = read_manifest(&dir).await?;
    manifest.prepare_for_deploy(
        job.services.clone(),
        ctx.environment().as_str(),
        ctx.registry_host(),
    );
    write_manifest(&dir, &manifest).await?;

    if staged.is_some()
        && let Some(token) = ctx.npm_token()
    {
        write_npmrc(&dir, token).await?;
    }

    let env = ctx.environment().to_env_vars(ctx.registry_host());
    tool.deploy(&dir, &env).await.map_err(|e| match e {
        FleetError::DeployTool { .. } => e,
        other => FleetError::deploy_tool(job.label(), other.to_string()),
    })
}
