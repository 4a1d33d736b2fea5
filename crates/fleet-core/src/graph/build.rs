//! Concurrent, recursive graph construction.

use futures::future::{BoxFuture, FutureExt, try_join_all};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{NodeId, ServiceGraph};
use crate::error::{FleetError, Result};
use crate::registry::DeploymentRecord;
use crate::resolver::{DeclaredServices, VersionResolver};
use crate::types::EnvironmentSignature;

/// State of one graph build.
///
/// Each build owns its graph; concurrent builds never share nodes.
pub struct GraphBuildSession<'a> {
    resolver: &'a dyn VersionResolver,
    deployments: &'a [DeploymentRecord],
    graph: Mutex<ServiceGraph>,
}

impl<'a> GraphBuildSession<'a> {
    pub fn new(
        resolver: &'a dyn VersionResolver,
        deployments: &'a [DeploymentRecord],
        environment: EnvironmentSignature,
    ) -> Self {
        Self {
            resolver,
            deployments,
            graph: Mutex::new(ServiceGraph::new(environment)),
        }
    }

    /// Create the root and walk its dependency tree.
    pub async fn build(
        self,
        root_name: &str,
        root_version: &str,
        declared: DeclaredServices,
    ) -> Result<ServiceGraph> {
        let root = self
            .graph
            .lock()
            .await
            .add_service(root_name, root_version, self.deployments);

        self.add_dependencies(root, declared).await?;

        let graph = self.graph.into_inner();
        if let Some(other) = graph.root_conflict() {
            return Err(FleetError::VersionConflict {
                name: other.name.clone(),
                version: other.version.clone(),
            });
        }

        info!(
            services = graph.len(),
            stale = graph.nodes().iter().filter(|n| n.needs_deploy).count(),
            "dependency graph built"
        );
        Ok(graph)
    }

    /// Resolve every declared dependency of `dependant` concurrently.
    ///
    /// Completes once the whole subtree is resolved; the first error aborts
    /// the build.
    fn add_dependencies(
        &self,
        dependant: NodeId,
        declared: DeclaredServices,
    ) -> BoxFuture<'_, Result<()>> {
        async move {
            let branches = declared
                .into_iter()
                .map(|(name, range)| self.add_dependency(dependant, name, range));
            try_join_all(branches).await?;
            Ok(())
        }
        .boxed()
    }

    async fn add_dependency(&self, dependant: NodeId, name: String, range: String) -> Result<()> {
        let latest = self.resolver.resolve_latest_version(&name, &range).await?;
        debug!(%name, %range, %latest, "resolved dependency");

        // Lookup, insert and wiring happen under one lock so two branches
        // reaching the same version collapse to a single node.
        let created = {
            let mut graph = self.graph.lock().await;
            match graph.find(&name, &latest) {
                Some(existing) => {
                    graph.wire_dependency(dependant, existing);
                    None
                }
                None => {
                    let id = graph.add_service(&name, &latest, self.deployments);
                    graph.wire_dependency(dependant, id);
                    Some(id)
                }
            }
        };

        if let Some(id) = created {
            let declared = self.resolver.declared_dependencies(&name, &latest).await?;
            self.add_dependencies(id, declared).await?;
        }
        Ok(())
    }
}

/// Build the deduplicated service graph rooted at `root_name@root_version`.
///
/// The returned graph is in discovery order (root first) and every node's
/// `needs_deploy` reflects whether it or anything it transitively depends
/// on requires a fresh deployment.
pub async fn build_graph(
    resolver: &dyn VersionResolver,
    root_name: &str,
    root_version: &str,
    declared: DeclaredServices,
    deployments: &[DeploymentRecord],
    environment: EnvironmentSignature,
) -> Result<ServiceGraph> {
    GraphBuildSession::new(resolver, deployments, environment)
        .build(root_name, root_version, declared)
        .await
}
