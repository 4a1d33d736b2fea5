//! Service dependency graph.
//!
//! Nodes live in a flat arena in discovery order (root first) and refer to
//! each other by [`NodeId`]; `dependants` and `dependencies` are index
//! lists, so cycles in the dependency tree never become ownership cycles.

mod build;

use tracing::debug;

use crate::registry::{DeploymentRecord, latest_deployment};
use crate::types::{EnvironmentSignature, module_label};

pub use build::{GraphBuildSession, build_graph};

/// Stable handle of a node within one [`ServiceGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One unique `(name, version)` found while walking the dependency tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceNode {
    pub name: String,
    pub version: String,
    pub dependants: Vec<NodeId>,
    pub dependencies: Vec<NodeId>,
    /// This node, or something it transitively depends on, needs a fresh
    /// deployment.
    pub needs_deploy: bool,
    /// Creation time of the matching registry record, 0 if none.
    pub last_deploy: i64,
    /// Url of the matching registry record, empty if none.
    pub last_url: String,
}

impl ServiceNode {
    fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            dependants: Vec::new(),
            dependencies: Vec::new(),
            needs_deploy: true,
            last_deploy: 0,
            last_url: String::new(),
        }
    }

    pub fn label(&self) -> String {
        module_label(&self.name, &self.version)
    }
}

#[derive(Debug, Clone)]
pub struct ServiceGraph {
    nodes: Vec<ServiceNode>,
    environment: EnvironmentSignature,
}

impl ServiceGraph {
    pub fn new(environment: EnvironmentSignature) -> Self {
        Self {
            nodes: Vec::new(),
            environment,
        }
    }

    pub fn environment(&self) -> &EnvironmentSignature {
        &self.environment
    }

    /// The root is always the first node added.
    pub fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId(0))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &ServiceNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut ServiceNode {
        &mut self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[ServiceNode] {
        &self.nodes
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn find(&self, name: &str, version: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name == name && node.version == version)
            .map(NodeId)
    }

    /// Append a node, reusing the registry's record for this environment
    /// when one exists.
    pub fn add_service(
        &mut self,
        name: &str,
        version: &str,
        deployments: &[DeploymentRecord],
    ) -> NodeId {
        let mut node = ServiceNode::new(name, version);
        let environment = self.environment.as_str();
        if let Some(found) = latest_deployment(deployments, name, version, environment) {
            node.last_deploy = found.created;
            node.last_url = found.url.clone();
            node.needs_deploy = false;
        }
        debug!(
            service = %node.label(),
            needs_deploy = node.needs_deploy,
            "added service"
        );

        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Record that `dependant` depends on `dependency`, propagating
    /// staleness upward.
    pub fn wire_dependency(&mut self, dependant: NodeId, dependency: NodeId) {
        self.nodes[dependency.0].dependants.push(dependant);
        self.nodes[dependant.0].dependencies.push(dependency);
        if self.nodes[dependency.0].needs_deploy {
            self.mark_deploy_needed(dependant);
        }
    }

    /// Mark `id` and all of its transitive dependants for redeploy.
    ///
    /// Stops at nodes already marked, which is what terminates the walk on
    /// cyclic graphs.
    pub fn mark_deploy_needed(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current.0];
            if node.needs_deploy {
                continue;
            }
            node.needs_deploy = true;
            debug!(service = %node.label(), "marked for redeploy");
            stack.extend(node.dependants.iter().rev().copied());
        }
    }

    /// Nodes sharing the root's name at another version.
    pub fn root_conflict(&self) -> Option<&ServiceNode> {
        let root = self.nodes.first()?;
        self.nodes[1..]
            .iter()
            .find(|node| node.name == root.name && node.version != root.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> ServiceGraph {
        ServiceGraph::new(EnvironmentSignature::new("a=b"))
    }

    #[test]
    fn add_service_reuses_matching_deployment() {
        let deployments = vec![
            DeploymentRecord::new("s2", "2", "a=b", "u7.sh", 21),
            DeploymentRecord::new("s2", "2", "a=b&c=d", "u8.sh", 22),
        ];
        let mut graph = graph();
        let id = graph.add_service("s2", "2", &deployments);

        let node = graph.node(id);
        assert!(!node.needs_deploy);
        assert_eq!(node.last_url, "u7.sh");
        assert_eq!(node.last_deploy, 21);
    }

    #[test]
    fn add_service_without_deployment_needs_deploy() {
        let mut graph = graph();
        let id = graph.add_service("s4", "2", &[]);
        let node = graph.node(id);
        assert!(node.needs_deploy);
        assert_eq!(node.last_deploy, 0);
        assert!(node.last_url.is_empty());
    }

    #[test]
    fn marking_stops_at_already_marked_nodes() {
        let deployments = vec![
            DeploymentRecord::new("a", "1", "a=b", "a.sh", 1),
            DeploymentRecord::new("b", "1", "a=b", "b.sh", 1),
        ];
        let mut graph = graph();
        let a = graph.add_service("a", "1", &deployments);
        let b = graph.add_service("b", "1", &deployments);
        graph.wire_dependency(a, b);
        graph.wire_dependency(b, a);
        assert!(!graph.node(a).needs_deploy);

        graph.mark_deploy_needed(b);
        assert!(graph.node(a).needs_deploy);
        assert!(graph.node(b).needs_deploy);
    }

    #[test]
    fn wiring_to_stale_dependency_marks_dependant_chain() {
        let deployments = vec![
            DeploymentRecord::new("top", "1", "a=b", "top.sh", 1),
            DeploymentRecord::new("mid", "1", "a=b", "mid.sh", 1),
        ];
        let mut graph = graph();
        let top = graph.add_service("top", "1", &deployments);
        let mid = graph.add_service("mid", "1", &deployments);
        graph.wire_dependency(top, mid);
        assert!(!graph.node(top).needs_deploy);

        let leaf = graph.add_service("leaf", "1", &deployments);
        graph.wire_dependency(mid, leaf);
        assert!(graph.node(mid).needs_deploy);
        assert!(graph.node(top).needs_deploy);
        assert_eq!(graph.node(top).last_url, "top.sh");
    }
}
