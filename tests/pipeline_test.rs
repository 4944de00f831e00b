mod helpers;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use havoc::application::{ChaosPipeline, ChaosRunRequest};
use havoc::domain::models::config::Config;
use havoc::domain::models::result::{ResultSource, Verdict};
use havoc::infrastructure::PollPolicy;
use havoc::services::{
    ChaosOrchestrator, FrameworkInstaller, ManifestDeployer, RecoveryService, TargetSelector,
};
use havoc::HavocError;

use helpers::{seed_installed_framework, write_plain_repo, FixtureRepo, MockCluster, NoChart, NoOverlay};

fn fast_config() -> Config {
    let mut config = Config::default();
    config.poll.pod_attempts = 1;
    config.poll.pod_backoff_secs = 0;
    config.poll.ready_timeout_secs = 0;
    config.poll.settle_buffer_secs = 0;
    config.poll.node_settle_buffer_secs = 0;
    config
}

fn pipeline(cluster: Arc<MockCluster>, repo: PathBuf, config: Config) -> ChaosPipeline {
    let installer = Arc::new(
        FrameworkInstaller::new(cluster.clone(), config.installer.clone())
            .with_readback(PollPolicy::new(1, Duration::from_secs(0))),
    );
    let deployer = Arc::new(ManifestDeployer::new(
        cluster.clone(),
        Arc::new(NoChart),
        Arc::new(NoOverlay),
        config.target_namespace.clone(),
    ));
    let selector = Arc::new(TargetSelector::new(
        cluster.clone(),
        config.target_namespace.clone(),
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
    ChaosPipeline::new(
        config,
        Arc::new(FixtureRepo { path: repo }),
        deployer,
        selector,
        installer,
        orchestrator,
        recovery,
    )
}

fn request(duration: u64) -> ChaosRunRequest {
    ChaosRunRequest {
        repo_url: "https://github.com/acme/shop".to_string(),
        chaos_type: Some("pod-delete".to_string()),
        duration_secs: Some(duration),
        target_namespace: None,
        target_deployment: None,
        deploy_parallel: false,
        params: BTreeMap::new(),
        auto_recover: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_run_against_plain_repo() {
    let repo = tempfile::tempdir().unwrap();
    write_plain_repo(repo.path());

    let cluster = Arc::new(MockCluster::new());
    seed_installed_framework(&cluster, "litmus");

    let report = pipeline(cluster.clone(), repo.path().to_path_buf(), fast_config())
        .execute(request(1))
        .await
        .unwrap();

    assert_eq!(report.deploy.applied, 2);
    assert_eq!(report.deploy.total, 2);
    assert_eq!(report.target.name, "web");
    assert_eq!(report.experiment, "pod-delete");
    // No operator is answering, so the honest verdict is Awaited.
    assert_eq!(report.result.verdict, Verdict::Awaited);
    assert_eq!(report.result.source, ResultSource::DiagnosticOnly);
    assert!(report.success(), "Awaited is reported, not punished");
    assert!(report
        .result
        .diagnostics
        .iter()
        .any(|d| d.contains("app=web")));

    // The engine reached the cluster, named off the selected workload.
    let applied = cluster.applies.lock().unwrap();
    let engine = applied
        .iter()
        .find(|m| m["kind"] == "ChaosEngine")
        .expect("engine applied");
    assert!(engine["metadata"]["name"]
        .as_str()
        .unwrap()
        .starts_with("web-chaos-"));
    assert_eq!(engine["spec"]["appinfo"]["applabel"], "app=web");
}

#[tokio::test(start_paused = true)]
async fn test_named_target_overrides_the_scan() {
    let repo = tempfile::tempdir().unwrap();
    write_plain_repo(repo.path());

    let cluster = Arc::new(MockCluster::new());
    seed_installed_framework(&cluster, "litmus");
    cluster.seed(
        "Deployment",
        "default",
        "billing",
        helpers::deployment_payload("billing", "default", "billing"),
    );

    let mut req = request(1);
    req.target_deployment = Some("billing".to_string());
    let report = pipeline(cluster, repo.path().to_path_buf(), fast_config())
        .execute(req)
        .await
        .unwrap();
    assert_eq!(report.target.name, "billing");
    assert_eq!(report.target.selector_string(), "app=billing");
}

#[tokio::test(start_paused = true)]
async fn test_unknown_chaos_type_fails_before_touching_the_cluster() {
    let repo = tempfile::tempdir().unwrap();
    write_plain_repo(repo.path());

    let cluster = Arc::new(MockCluster::new());
    let mut req = request(1);
    req.chaos_type = Some("meteor-strike".to_string());
    let err = pipeline(cluster.clone(), repo.path().to_path_buf(), fast_config())
        .execute(req)
        .await
        .unwrap_err();

    assert!(matches!(err, HavocError::Config(_)));
    assert!(cluster.applies.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_duration_is_rejected() {
    let repo = tempfile::tempdir().unwrap();
    write_plain_repo(repo.path());

    let cluster = Arc::new(MockCluster::new());
    let err = pipeline(cluster, repo.path().to_path_buf(), fast_config())
        .execute(request(7200))
        .await
        .unwrap_err();
    assert!(matches!(err, HavocError::Config(_)));
}

#[tokio::test(start_paused = true)]
async fn test_stuck_run_triggers_auto_recovery_sweep() {
    let repo = tempfile::tempdir().unwrap();
    write_plain_repo(repo.path());

    let cluster = Arc::new(MockCluster::new());
    seed_installed_framework(&cluster, "litmus");
    // The operator accepts the engine but never drives it past its
    // initial phase.
    cluster.on_apply(|cluster, manifest| {
        if manifest["kind"] == "ChaosEngine" && manifest.get("status").is_none() {
            if let Some(name) = manifest["metadata"]["name"].as_str() {
                cluster.seed(
                    "ChaosEngine",
                    "default",
                    name,
                    json!({"kind": "ChaosEngine",
                           "metadata": {"creationTimestamp": "2020-01-01T00:00:00Z"},
                           "status": {"engineStatus": "initialized"}}),
                );
            }
        }
    });

    let mut req = request(1);
    req.auto_recover = Some(true);
    let report = pipeline(cluster.clone(), repo.path().to_path_buf(), fast_config())
        .execute(req)
        .await
        .unwrap();

    assert!(report.result.stuck);
    assert_eq!(report.recovered.len(), 1);
    assert!(report.recovered[0].success);
    // The sweep actually removed the wedged engine.
    assert!(cluster
        .stored("ChaosEngine", "default", &report.recovered[0].engine_name)
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn test_empty_repo_still_produces_a_full_run_via_fallback() {
    let repo = tempfile::tempdir().unwrap();
    std::fs::write(repo.path().join("README.md"), "# no manifests\n").unwrap();

    let cluster = Arc::new(MockCluster::new());
    seed_installed_framework(&cluster, "litmus");

    let report = pipeline(cluster, repo.path().to_path_buf(), fast_config())
        .execute(request(1))
        .await
        .unwrap();

    assert_eq!(report.target.name, "havoc-fallback");
    assert_eq!(report.result.verdict, Verdict::Awaited);
}
