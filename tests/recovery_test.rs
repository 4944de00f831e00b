mod helpers;

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use havoc::services::RecoveryService;

use helpers::MockCluster;

fn service(cluster: Arc<MockCluster>) -> RecoveryService {
    RecoveryService::new(cluster, "havoc-chaos-admin".to_string(), 300)
}

fn engine(phase: &str, age_secs: i64) -> serde_json::Value {
    let created = Utc::now() - Duration::seconds(age_secs);
    json!({
        "kind": "ChaosEngine",
        "metadata": {"creationTimestamp": created.to_rfc3339()},
        "status": {"engineStatus": phase},
    })
}

#[tokio::test]
async fn test_detection_requires_both_phase_and_age() {
    let cluster = Arc::new(MockCluster::new());
    cluster.seed("ChaosEngine", "default", "old-stuck", engine("initialized", 600));
    cluster.seed("ChaosEngine", "default", "young", engine("initialized", 60));
    cluster.seed("ChaosEngine", "default", "old-running", engine("running", 600));
    cluster.seed("ChaosEngine", "default", "done", engine("completed", 600));

    let stuck = service(cluster).detect_stuck("default").await.unwrap();
    assert_eq!(stuck.len(), 1);
    assert_eq!(stuck[0].engine_name, "old-stuck");
}

#[tokio::test]
async fn test_detection_snapshots_permission_diagnostics() {
    let cluster = Arc::new(MockCluster::new());
    cluster.seed("ChaosEngine", "default", "stuck", engine("initialized", 600));
    cluster.seed(
        "ServiceAccount",
        "default",
        "havoc-chaos-admin",
        json!({"kind": "ServiceAccount"}),
    );
    cluster.seed(
        "ClusterRole",
        "",
        "havoc-chaos-admin",
        json!({"kind": "ClusterRole", "rules": [
            {"resources": ["pods"], "verbs": ["create", "list"]},
        ]}),
    );

    let stuck = service(cluster).detect_stuck("default").await.unwrap();
    let diag = &stuck[0].diagnostics;
    assert!(diag.service_account_present);
    assert!(diag.can_create_pods);
    assert!(!diag.can_access_nodes, "role grants nothing on nodes");
}

#[tokio::test]
async fn test_recover_removes_engine_and_its_pods() {
    let cluster = Arc::new(MockCluster::new());
    cluster.seed("ChaosEngine", "default", "stuck", engine("initialized", 600));
    cluster.seed(
        "Pod",
        "default",
        "stuck-runner",
        json!({"kind": "Pod", "metadata": {"labels": {"chaosengine": "stuck"}}}),
    );

    let service = service(cluster.clone());
    let stuck = service.detect_stuck("default").await.unwrap();
    let outcome = service.recover(&stuck[0]).await;

    assert!(outcome.success);
    assert!(cluster.stored("ChaosEngine", "default", "stuck").is_none());
    assert!(cluster.stored("Pod", "default", "stuck-runner").is_none());
    // Pod deletes skip the grace period.
    let deletes = cluster.deletes.lock().unwrap();
    assert!(deletes.iter().any(|(kind, name, force)| {
        kind == "Pod" && name == "stuck-runner" && *force
    }));
}

#[tokio::test]
async fn test_recover_recreates_missing_service_account() {
    let cluster = Arc::new(MockCluster::new());
    cluster.seed("ChaosEngine", "default", "stuck", engine("initialized", 600));

    let service = service(cluster.clone());
    let stuck = service.detect_stuck("default").await.unwrap();
    assert!(!stuck[0].diagnostics.service_account_present);

    let outcome = service.recover(&stuck[0]).await;
    assert!(outcome.success);
    assert!(cluster
        .stored("ServiceAccount", "default", "havoc-chaos-admin")
        .is_some());
    assert!(cluster.stored("ClusterRole", "", "havoc-chaos-admin").is_some());
    assert!(cluster
        .stored("ClusterRoleBinding", "", "havoc-chaos-admin-default")
        .is_some());
    assert!(outcome
        .actions
        .iter()
        .any(|a| a.contains("reapplied ServiceAccount")));
}

#[tokio::test]
async fn test_recover_skips_service_account_when_fully_permissioned() {
    let cluster = Arc::new(MockCluster::new());
    cluster.seed("ChaosEngine", "default", "stuck", engine("initialized", 600));
    cluster.seed(
        "ServiceAccount",
        "default",
        "havoc-chaos-admin",
        json!({"kind": "ServiceAccount"}),
    );
    cluster.seed(
        "ClusterRole",
        "",
        "havoc-chaos-admin",
        json!({"kind": "ClusterRole", "rules": [
            {"resources": ["*"], "verbs": ["*"]},
        ]}),
    );

    let service = service(cluster.clone());
    let stuck = service.detect_stuck("default").await.unwrap();
    let outcome = service.recover(&stuck[0]).await;
    assert!(outcome.success);
    assert!(!outcome.actions.iter().any(|a| a.contains("reapplied")));
}

#[tokio::test]
async fn test_recover_deletes_orphaned_result_objects() {
    let cluster = Arc::new(MockCluster::new());
    cluster.seed("ChaosEngine", "default", "stuck", engine("initialized", 600));
    cluster.seed(
        "ChaosResult",
        "default",
        "stuck-pod-delete",
        json!({"kind": "ChaosResult", "metadata": {"labels": {"chaosengine": "stuck"}}}),
    );
    cluster.seed(
        "ChaosResult",
        "default",
        "other-pod-delete",
        json!({"kind": "ChaosResult", "metadata": {"labels": {"chaosengine": "other"}}}),
    );

    let service = service(cluster.clone());
    let stuck = service.detect_stuck("default").await.unwrap();
    let outcome = service.recover(&stuck[0]).await;

    assert!(outcome.success);
    assert!(cluster
        .stored("ChaosResult", "default", "stuck-pod-delete")
        .is_none());
    assert!(
        cluster
            .stored("ChaosResult", "default", "other-pod-delete")
            .is_some(),
        "unrelated results stay"
    );
    let deletes = cluster.deletes.lock().unwrap();
    assert!(deletes.iter().any(|(kind, name, force)| {
        kind == "ChaosResult" && name == "stuck-pod-delete" && *force
    }));
}

#[tokio::test]
async fn test_recover_is_idempotent_when_engine_already_gone() {
    let cluster = Arc::new(MockCluster::new());
    cluster.seed("ChaosEngine", "default", "stuck", engine("initialized", 600));

    let service = service(cluster.clone());
    let stuck = service.detect_stuck("default").await.unwrap();
    cluster.remove("ChaosEngine", "default", "stuck");

    let outcome = service.recover(&stuck[0]).await;
    assert!(outcome.success, "a vanished engine is a recovered engine");
    assert!(outcome.actions.iter().any(|a| a.contains("not found")));
}

#[tokio::test]
async fn test_auto_recover_sweeps_every_stuck_engine() {
    let cluster = Arc::new(MockCluster::new());
    cluster.seed("ChaosEngine", "default", "stuck-a", engine("initialized", 900));
    cluster.seed("ChaosEngine", "default", "stuck-b", engine("initialized", 700));
    cluster.seed("ChaosEngine", "default", "healthy", engine("running", 900));

    let outcomes = service(cluster.clone())
        .auto_recover("default")
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|(_, outcome)| outcome.success));
    assert!(cluster.stored("ChaosEngine", "default", "healthy").is_some());
}
