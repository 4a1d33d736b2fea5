//! Fleet - dependency-aware service deployment
//!
//! Usage:
//!   fleet deploy --env "a=b&c=d"   # Deploy the package in the current directory
//!   fleet discover                 # Resolve pending service urls

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleet_core::prelude::*;

#[derive(Parser)]
#[command(name = "fleet")]
#[command(about = "Dependency-aware service fleet deployment", long_about = None)]
struct Cli {
    /// Path to fleet.toml (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Package directory (defaults to the current directory)
    #[arg(long, short = 'C', global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the package and every stale service it depends on
    Deploy {
        /// Environment signature, e.g. "a=b&c=d"
        #[arg(long, short, default_value = "")]
        env: String,

        /// Registry host (overrides config and REGISTRY_HOST)
        #[arg(long)]
        registry: Option<String>,
    },

    /// Wait until every pending service dependency has a known url
    Discover {
        /// Delay between registry polls in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Registry polls before giving up (0 waits forever)
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Registry host (overrides config, REGISTRY_HOST and the manifest)
        #[arg(long)]
        registry: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet=info,fleet_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = ConfigStore::new(cli.config.clone())
        .load()
        .context("Failed to load configuration")?;
    let dir = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    match cli.command {
        Commands::Deploy { env, registry } => {
            if registry.is_some() {
                config.registry_host = registry;
            }
            run_deploy(&config, dir, env).await
        }
        Commands::Discover {
            interval_ms,
            max_attempts,
            registry,
        } => {
            if registry.is_some() {
                config.registry_host = registry;
            }
            if let Some(ms) = interval_ms {
                config.discovery.poll_interval_ms = ms;
            }
            if let Some(attempts) = max_attempts {
                config.discovery.max_attempts = attempts;
            }
            run_discover(&config, dir).await
        }
    }
}

async fn run_deploy(config: &FleetConfig, dir: PathBuf, env: String) -> Result<()> {
    let host = config
        .registry_host
        .clone()
        .context("No registry host configured. Set REGISTRY_HOST or use --registry")?;
    let orchestrator = orchestrator(config, &host)?;
    let ctx = DeploymentContext::from_config(dir, EnvironmentSignature::new(env), config);

    match orchestrator.deploy(&ctx).await {
        Ok(summary) => {
            for service in &summary.deployed {
                println!("deployed {}@{} -> {}", service.name, service.version, service.url);
            }
            for label in &summary.reused {
                println!("reused   {label}");
            }
            println!("Deployment successful. Services will discover each other soon.");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "deployment failed");
            Err(e).context("Deployment failed")
        }
    }
}

async fn run_discover(config: &FleetConfig, dir: PathBuf) -> Result<()> {
    let host = match config.registry_host.clone() {
        Some(host) => host,
        None => fleet_core::manifest::read_manifest(&dir)
            .await?
            .registry
            .context("No registry host configured or recorded in the manifest")?,
    };
    let orchestrator = orchestrator(config, &host)?;
    let discoverer = orchestrator
        .discoverer(config.discovery.poll_interval())
        .with_max_attempts(config.discovery.attempt_limit());

    match orchestrator.discover(&dir, &discoverer).await {
        Ok(manifest) => {
            if let Some(services) = &manifest.resolved_services {
                for (name, service) in services {
                    println!("{name} -> {}", service.url().unwrap_or("(pending)"));
                }
            }
            println!("All services discovered.");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "service discovery failed");
            Err(e).context("Service discovery failed")
        }
    }
}

fn orchestrator(config: &FleetConfig, host: &str) -> Result<DeployOrchestrator> {
    let registry = HttpRegistryClient::from_host(host, config.registry_timeout())?;
    let scheduler = DeployScheduler::new(
        Arc::new(NpmInstaller::new()),
        Arc::new(NowDeployTool::new(config.deploy_token.clone())),
    );
    Ok(DeployOrchestrator::new(
        Arc::new(registry),
        Arc::new(NpmResolver::new()),
        scheduler,
    ))
}
