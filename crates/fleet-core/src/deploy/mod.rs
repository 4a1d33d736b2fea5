//! Deploy coordination: planning, package staging and deploy tool runs.

pub mod scheduler;
pub mod tools;

pub use scheduler::{
    DeployJob, DeployScheduler, DeploySummary, DeployedService, plan, service_refs,
};
pub use tools::{
    DeployTool, NowDeployTool, NpmInstaller, PackageInstaller, STAGING_DIR, StagedPackage,
    normalize_url,
};
