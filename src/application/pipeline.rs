//! End-to-end chaos pipeline.
//!
//! One [`ChaosRunRequest`] drives the whole chain: clone the repository,
//! make sure the chaos framework exists, deploy the application, pick a
//! target, run the experiment, and optionally sweep up anything stuck.
//! Setup failures surface as [`HavocError`]s classified by stage; once
//! the experiment launches, the pipeline always produces a report.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::errors::{HavocError, HavocResult};
use crate::domain::models::config::Config;
use crate::domain::models::experiment::{ChaosExperimentSpec, ChaosExperimentType};
use crate::domain::models::plan::DeployReport;
use crate::domain::models::recovery::{RecoveryOutcome, StuckExperimentRecord};
use crate::domain::models::result::{ChaosResult, Verdict};
use crate::domain::models::target::TargetWorkload;
use crate::domain::ports::RepoFetcher;
use crate::services::{
    ChaosOrchestrator, FrameworkInstaller, ManifestDeployer, RecoveryService, TargetSelector,
};

/// Bounds on the caller-supplied chaos duration.
const MIN_DURATION_SECS: u64 = 1;
const MAX_DURATION_SECS: u64 = 3600;

/// One requested chaos run. Only the repository URL is mandatory;
/// everything else has configured defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaosRunRequest {
    pub repo_url: String,
    pub chaos_type: Option<String>,
    pub duration_secs: Option<u64>,
    pub target_namespace: Option<String>,
    pub target_deployment: Option<String>,
    #[serde(default)]
    pub deploy_parallel: bool,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    pub auto_recover: Option<bool>,
}

/// What one completed run looked like.
#[derive(Debug, Clone, Serialize)]
pub struct ChaosRunReport {
    pub run_id: Uuid,
    pub experiment: String,
    pub target: TargetWorkload,
    pub deploy: DeployReport,
    pub result: ChaosResult,
    pub recovered: Vec<RecoveryAction>,
}

/// One recovery performed during the post-run sweep.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryAction {
    pub engine_name: String,
    pub success: bool,
    pub actions: Vec<String>,
}

impl ChaosRunReport {
    /// A run "succeeds" when the experiment resolved to anything but an
    /// explicit `Fail`; `Awaited` is reported, not punished.
    pub fn success(&self) -> bool {
        self.result.verdict != Verdict::Fail
    }
}

pub struct ChaosPipeline {
    config: Config,
    fetcher: Arc<dyn RepoFetcher>,
    deployer: Arc<ManifestDeployer>,
    selector: Arc<TargetSelector>,
    installer: Arc<FrameworkInstaller>,
    orchestrator: Arc<ChaosOrchestrator>,
    recovery: Arc<RecoveryService>,
}

impl ChaosPipeline {
    pub fn new(
        config: Config,
        fetcher: Arc<dyn RepoFetcher>,
        deployer: Arc<ManifestDeployer>,
        selector: Arc<TargetSelector>,
        installer: Arc<FrameworkInstaller>,
        orchestrator: Arc<ChaosOrchestrator>,
        recovery: Arc<RecoveryService>,
    ) -> Self {
        Self {
            config,
            fetcher,
            deployer,
            selector,
            installer,
            orchestrator,
            recovery,
        }
    }

    /// Execute one run end to end.
    pub async fn execute(&self, request: ChaosRunRequest) -> HavocResult<ChaosRunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("chaos_run", %run_id);
        self.execute_inner(request, run_id).instrument(span).await
    }

    async fn execute_inner(
        &self,
        request: ChaosRunRequest,
        run_id: Uuid,
    ) -> HavocResult<ChaosRunReport> {
        let experiment = self.parse_experiment(request.chaos_type.as_deref())?;
        let duration_secs = self.validate_duration(request.duration_secs)?;
        let namespace = request
            .target_namespace
            .clone()
            .unwrap_or_else(|| self.config.target_namespace.clone());

        info!(
            repo = %request.repo_url,
            experiment = experiment.wire_name(),
            duration_secs,
            namespace = %namespace,
            "starting chaos run"
        );

        let checkout = self.fetcher.fetch(&request.repo_url).await?;

        self.installer.ensure_installed().await?;

        let deploy = self
            .deployer
            .deploy(&checkout, request.deploy_parallel)
            .await?;
        if deploy.applied == 0 && deploy.total > 0 {
            return Err(HavocError::Deployment(format!(
                "no resources applied; first error: {}",
                deploy.errors.first().map_or("none recorded", String::as_str)
            )));
        }

        let target = self.resolve_target(&request, &namespace).await?;

        let mut spec = ChaosExperimentSpec::new(experiment, target.clone(), duration_secs);
        spec.params = request.params.clone();

        let result = self.orchestrator.run(&spec).await?;

        let recovered = self.post_run_sweep(&request, &result, &target.namespace).await;

        if let Err(err) = tokio::fs::remove_dir_all(&checkout).await {
            warn!(path = %checkout.display(), error = %err, "checkout cleanup failed");
        }

        Ok(ChaosRunReport {
            run_id,
            experiment: experiment.wire_name().to_string(),
            target,
            deploy,
            result,
            recovered,
        })
    }

    fn parse_experiment(&self, requested: Option<&str>) -> HavocResult<ChaosExperimentType> {
        let name = requested.unwrap_or(&self.config.chaos.experiment);
        ChaosExperimentType::from_str(name).ok_or_else(|| {
            HavocError::Config(format!(
                "unknown chaos type '{name}'; known types: {}",
                ChaosExperimentType::all()
                    .iter()
                    .map(|e| e.wire_name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }

    fn validate_duration(&self, requested: Option<u64>) -> HavocResult<u64> {
        let secs = requested.unwrap_or(self.config.chaos.duration_secs);
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&secs) {
            return Err(HavocError::Config(format!(
                "chaos duration {secs}s out of range ({MIN_DURATION_SECS}..={MAX_DURATION_SECS})"
            )));
        }
        Ok(secs)
    }

    /// Named selection when requested, otherwise the cluster scan, and the
    /// fallback workload when the scan comes up empty.
    async fn resolve_target(
        &self,
        request: &ChaosRunRequest,
        namespace: &str,
    ) -> HavocResult<TargetWorkload> {
        if let Some(name) = &request.target_deployment {
            return self.selector.select_named(name, namespace).await;
        }
        if let Some(target) = self.selector.select_auto().await? {
            return Ok(target);
        }
        warn!("no eligible workload found, deploying fallback target");
        let (target, _) = self.deployer.deploy_fallback().await?;
        Ok(target)
    }

    /// When the run ended stuck and recovery is enabled, sweep the target
    /// namespace. Sweep failures are logged, never raised.
    async fn post_run_sweep(
        &self,
        request: &ChaosRunRequest,
        result: &ChaosResult,
        namespace: &str,
    ) -> Vec<RecoveryAction> {
        let enabled = request
            .auto_recover
            .unwrap_or(self.config.recovery.auto_recover);
        if !enabled || !result.stuck {
            return Vec::new();
        }
        match self.recovery.auto_recover(namespace).await {
            Ok(outcomes) => outcomes
                .into_iter()
                .map(|(record, outcome)| recovery_action(&record, outcome))
                .collect(),
            Err(err) => {
                warn!(error = %err, "post-run recovery sweep failed");
                Vec::new()
            }
        }
    }

    pub fn recovery_service(&self) -> &Arc<RecoveryService> {
        &self.recovery
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn recovery_action(record: &StuckExperimentRecord, outcome: RecoveryOutcome) -> RecoveryAction {
    RecoveryAction {
        engine_name: record.engine_name.clone(),
        success: outcome.success,
        actions: outcome.actions,
    }
}
