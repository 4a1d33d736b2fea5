//! Fleet Core Library
//!
//! Dependency-aware deployment of service fleets: resolves a root
//! manifest's service dependency tree against the live deployment
//! registry, redeploys what is stale, and lets consumers discover the
//! addresses of redeployed dependencies.

pub mod command;
pub mod config;
pub mod context;
pub mod deploy;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod manifest;
pub mod orchestration;
pub mod registry;
pub mod resolver;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigStore, DiscoveryConfig, FleetConfig};
    pub use crate::context::DeploymentContext;

    // Errors
    pub use crate::error::{FleetError, Result};

    // Graph
    pub use crate::graph::{NodeId, ServiceGraph, ServiceNode, build_graph};

    // Deploy
    pub use crate::deploy::{
        DeployScheduler, DeploySummary, DeployTool, NowDeployTool, NpmInstaller, PackageInstaller,
    };

    // Discovery
    pub use crate::discovery::Discoverer;

    // Manifest
    pub use crate::manifest::{Manifest, ServiceRef};

    // Registry & resolution
    pub use crate::registry::{DeploymentRecord, HttpRegistryClient, RegistryClient};
    pub use crate::resolver::{CatalogResolver, NpmResolver, VersionResolver};

    pub use crate::orchestration::DeployOrchestrator;
    pub use crate::types::EnvironmentSignature;
}
