//! Havoc server entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use havoc::api::run_server;
use havoc::application::ChaosPipeline;
use havoc::infrastructure::kube::KubeClusterClient;
use havoc::infrastructure::packaging::{HelmCli, KustomizeCli};
use havoc::infrastructure::repo::GitFetcher;
use havoc::infrastructure::{logging, ConfigLoader};
use havoc::services::{
    ChaosOrchestrator, FrameworkInstaller, ManifestDeployer, RecoveryService, TargetSelector,
};

#[derive(Debug, Parser)]
#[command(name = "havoc", version, about = "Kubernetes chaos orchestration engine")]
struct Cli {
    /// Configuration file (falls back to havoc.yaml, then defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(port) = cli.port {
        config.port = port;
    }

    logging::init(&config.logging)?;
    info!(port = config.port, "starting havoc");

    let cluster = Arc::new(KubeClusterClient::connect().await?);

    let fetcher = Arc::new(GitFetcher::new(std::env::temp_dir().join("havoc-checkouts")));
    let deployer = Arc::new(ManifestDeployer::new(
        cluster.clone(),
        Arc::new(HelmCli),
        Arc::new(KustomizeCli),
        config.target_namespace.clone(),
    ));
    let selector = Arc::new(TargetSelector::new(
        cluster.clone(),
        config.target_namespace.clone(),
    ));
    let installer = Arc::new(FrameworkInstaller::new(
        cluster.clone(),
        config.installer.clone(),
    ));
    let orchestrator = Arc::new(ChaosOrchestrator::new(
        cluster.clone(),
        installer.clone(),
        config.installer.service_account.clone(),
        config.poll.clone(),
        config.recovery.clone(),
    ));
    let recovery = Arc::new(RecoveryService::new(
        cluster.clone(),
        config.installer.service_account.clone(),
        config.recovery.stuck_threshold_secs,
    ));

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let pipeline = Arc::new(ChaosPipeline::new(
        config,
        fetcher,
        deployer,
        selector,
        installer,
        orchestrator,
        recovery,
    ));

    run_server(&bind_addr, pipeline).await?;
    Ok(())
}
