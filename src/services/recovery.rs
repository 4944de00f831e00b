//! Stuck-experiment detection and recovery.
//!
//! An engine sitting in its initial phase past the threshold is stuck:
//! the operator accepted it but never drove it. Detection is a pure read
//! pass that also snapshots the usual culprits (missing service account,
//! missing RBAC grants). Recovery is a sequence of independent best-effort
//! steps; only a hard error on the terminal engine delete marks the
//! attempt failed, and an already-gone engine counts as success.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::domain::errors::HavocResult;
use crate::domain::models::engine::{EngineObservation, EnginePhase, ENGINE_LABEL};
use crate::domain::models::recovery::{RecoveryOutcome, StuckDiagnostics, StuckExperimentRecord};
use crate::domain::ports::{ClusterClient, DeleteOutcome, ResourceKind};
use crate::infrastructure::kube::resources::{
    chaos_cluster_role, chaos_cluster_role_binding, chaos_service_account, to_manifest,
};

pub struct RecoveryService {
    cluster: Arc<dyn ClusterClient>,
    service_account: String,
    stuck_threshold_secs: u64,
}

impl RecoveryService {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        service_account: String,
        stuck_threshold_secs: u64,
    ) -> Self {
        Self {
            cluster,
            service_account,
            stuck_threshold_secs,
        }
    }

    /// Scan a namespace for stuck engines. Unparseable engine payloads are
    /// skipped; engines without a creation timestamp count as stuck once
    /// their phase qualifies, since their age cannot clear them.
    pub async fn detect_stuck(&self, namespace: &str) -> HavocResult<Vec<StuckExperimentRecord>> {
        let engines = self
            .cluster
            .list(&ResourceKind::chaos_engine(), Some(namespace), None)
            .await?;

        let threshold = i64::try_from(self.stuck_threshold_secs).unwrap_or(i64::MAX);
        let now = Utc::now();
        let mut stuck = Vec::new();
        for payload in &engines {
            let EngineObservation::Engine {
                name,
                namespace,
                phase: Some(EnginePhase::Initialized),
                created_at,
                ..
            } = EngineObservation::decode(payload)
            else {
                continue;
            };
            let old_enough =
                created_at.is_none_or(|created| (now - created).num_seconds() > threshold);
            if !old_enough {
                continue;
            }
            let diagnostics = self.diagnose(&namespace).await;
            warn!(
                engine = %name,
                namespace = %namespace,
                sa_present = diagnostics.service_account_present,
                can_create_pods = diagnostics.can_create_pods,
                "stuck engine detected"
            );
            stuck.push(StuckExperimentRecord {
                engine_name: name,
                namespace,
                created_at,
                first_seen_stuck: now,
                diagnostics,
            });
        }
        Ok(stuck)
    }

    /// Snapshot the permission state a wedged engine usually traces back to.
    async fn diagnose(&self, namespace: &str) -> StuckDiagnostics {
        let service_account_present = self
            .cluster
            .get(
                &ResourceKind::service_account(),
                Some(namespace),
                &self.service_account,
            )
            .await
            .ok()
            .flatten()
            .is_some();

        let role = self
            .cluster
            .get(&ResourceKind::cluster_role(), None, &self.service_account)
            .await
            .ok()
            .flatten();
        let (can_create_pods, can_access_nodes) = role
            .as_ref()
            .map_or((false, false), |payload| {
                (
                    role_allows(payload, "pods", "create"),
                    role_allows(payload, "nodes", "get"),
                )
            });

        StuckDiagnostics {
            service_account_present,
            can_create_pods,
            can_access_nodes,
            engine_phase: "initialized".to_string(),
        }
    }

    /// Recover one stuck engine. Independent best-effort steps: re-provision
    /// the service account when diagnostics point at it, stop the engine,
    /// clear orphaned execution pods and result objects, force-delete the
    /// engine itself. Steps report through `actions`; only the final delete
    /// decides `success`.
    pub async fn recover(&self, record: &StuckExperimentRecord) -> RecoveryOutcome {
        let mut actions = Vec::new();
        let name = &record.engine_name;
        let namespace = &record.namespace;

        // Step 1: a missing or under-permissioned service account is the
        // usual reason the operator never drove the engine. Re-apply it so
        // the next run does not wedge the same way.
        if !record.diagnostics.service_account_present || !record.diagnostics.can_create_pods {
            self.remediate_service_account(namespace, &mut actions)
                .await;
        }

        // Step 2: flip the engine to stopped so the operator abandons it.
        // Applying the patch to an already-gone engine would recreate it,
        // so check first.
        let exists = matches!(
            self.cluster
                .get(&ResourceKind::chaos_engine(), Some(namespace), name)
                .await,
            Ok(Some(_))
        );
        if exists {
            let stop_patch = json!({
                "apiVersion": "litmuschaos.io/v1alpha1",
                "kind": "ChaosEngine",
                "metadata": {"name": name, "namespace": namespace},
                "spec": {"engineState": "stop"},
            });
            match self.cluster.apply(&stop_patch).await {
                Ok(()) => actions.push("engine state set to stop".to_string()),
                Err(err) => actions.push(format!("engine stop failed: {err}")),
            }
        } else {
            actions.push("engine already absent, skipping stop".to_string());
        }

        // Step 3: clear orphaned execution pods and result objects matched
        // by the correlation label. Leftover results would pollute a later
        // run's namespace scan.
        let selector = format!("{ENGINE_LABEL}={name}");
        self.sweep_labeled(&ResourceKind::pod(), namespace, &selector, &mut actions)
            .await;
        self.sweep_labeled(
            &ResourceKind::chaos_result(),
            namespace,
            &selector,
            &mut actions,
        )
        .await;

        // Step 4: the terminal delete. Already-gone is success.
        match self
            .cluster
            .delete(&ResourceKind::chaos_engine(), Some(namespace), name, true)
            .await
        {
            Ok(DeleteOutcome::Deleted) => {
                actions.push(format!("engine {name} deleted"));
                info!(engine = %name, namespace = %namespace, "stuck engine recovered");
                RecoveryOutcome {
                    success: true,
                    message: format!("engine {name} removed"),
                    actions,
                }
            }
            Ok(DeleteOutcome::NotFound) => {
                actions.push(format!("engine {name} not found"));
                RecoveryOutcome {
                    success: true,
                    message: format!("engine {name} was already gone"),
                    actions,
                }
            }
            Err(err) => {
                actions.push(format!("engine delete failed: {err}"));
                RecoveryOutcome {
                    success: false,
                    message: format!("engine {name} could not be removed: {err}"),
                    actions,
                }
            }
        }
    }

    /// Re-apply the service account, its ClusterRole, and the binding.
    /// Best-effort; every apply reports through `actions` either way.
    async fn remediate_service_account(&self, namespace: &str, actions: &mut Vec<String>) {
        let name = &self.service_account;
        let objects = [
            to_manifest(&chaos_service_account(name, namespace)),
            to_manifest(&chaos_cluster_role(name)),
            to_manifest(&chaos_cluster_role_binding(name, namespace)),
        ];
        for object in objects {
            let object = match object {
                Ok(object) => object,
                Err(err) => {
                    actions.push(format!("service account manifest build failed: {err}"));
                    continue;
                }
            };
            let kind = object
                .get("kind")
                .and_then(Value::as_str)
                .unwrap_or("resource");
            match self.cluster.apply(&object).await {
                Ok(()) => actions.push(format!("reapplied {kind} {name}")),
                Err(err) => actions.push(format!("{kind} {name} reapply failed: {err}")),
            }
        }
    }

    /// Force-delete everything of `kind` in the namespace matching the
    /// selector. Failures are recorded, never raised.
    async fn sweep_labeled(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        selector: &str,
        actions: &mut Vec<String>,
    ) {
        match self.cluster.list(kind, Some(namespace), Some(selector)).await {
            Ok(items) => {
                for item in &items {
                    let Some(item_name) = item
                        .get("metadata")
                        .and_then(|m| m.get("name"))
                        .and_then(Value::as_str)
                    else {
                        continue;
                    };
                    match self.cluster.delete(kind, Some(namespace), item_name, true).await {
                        Ok(_) => actions.push(format!("force-deleted {} {item_name}", kind.kind)),
                        Err(err) => actions
                            .push(format!("{} {item_name} delete failed: {err}", kind.kind)),
                    }
                }
                if items.is_empty() {
                    actions.push(format!("no orphaned {} objects to clear", kind.kind));
                }
            }
            Err(err) => actions.push(format!("{} listing failed: {err}", kind.kind)),
        }
    }

    /// Detect and recover everything stuck in a namespace.
    pub async fn auto_recover(
        &self,
        namespace: &str,
    ) -> HavocResult<Vec<(StuckExperimentRecord, RecoveryOutcome)>> {
        let stuck = self.detect_stuck(namespace).await?;
        let mut outcomes = Vec::with_capacity(stuck.len());
        for record in stuck {
            let outcome = self.recover(&record).await;
            outcomes.push((record, outcome));
        }
        Ok(outcomes)
    }
}

/// Whether a ClusterRole payload grants `verb` on `resource`, directly or
/// via wildcards.
fn role_allows(role: &Value, resource: &str, verb: &str) -> bool {
    let Some(rules) = role.get("rules").and_then(Value::as_array) else {
        return false;
    };
    rules.iter().any(|rule| {
        let has = |key: &str, want: &str| {
            rule.get(key)
                .and_then(Value::as_array)
                .is_some_and(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .any(|item| item == want || item == "*")
                })
        };
        has("resources", resource) && has("verbs", verb)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_allows_exact_and_wildcard() {
        let role = json!({"rules": [
            {"resources": ["pods", "events"], "verbs": ["create", "list"]},
            {"resources": ["nodes"], "verbs": ["get"]},
        ]});
        assert!(role_allows(&role, "pods", "create"));
        assert!(role_allows(&role, "nodes", "get"));
        assert!(!role_allows(&role, "nodes", "create"));

        let wildcard = json!({"rules": [{"resources": ["*"], "verbs": ["*"]}]});
        assert!(role_allows(&wildcard, "pods", "create"));
    }

    #[test]
    fn test_role_without_rules_allows_nothing() {
        assert!(!role_allows(&json!({}), "pods", "create"));
    }
}
