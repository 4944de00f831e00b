//! Chaos orchestrator: launches one engine, observes it, resolves a result.
//!
//! The contract is strict: setup failures before the engine is applied are
//! errors; once the engine exists on the cluster, nothing that happens
//! afterwards raises. Missing execution pods, absent result objects, and
//! slow recovery all degrade into `ChaosResult::diagnostics`, and the
//! verdict stays an honest `Awaited` when the framework never reported.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::errors::{ClusterError, HavocResult};
use crate::domain::models::config::{PollConfig, RecoveryConfig};
use crate::domain::models::engine::{
    build_engine, engine_name, EngineObservation, EnginePhase, ENGINE_LABEL,
};
use crate::domain::models::experiment::ChaosExperimentSpec;
use crate::domain::models::result::{ChaosResult, ResultObservation, ResultSource, Verdict};
use crate::domain::models::target::WorkloadView;
use crate::domain::ports::{ClusterClient, ResourceKind};
use crate::infrastructure::retry::PollPolicy;

use super::installer::FrameworkInstaller;

pub struct ChaosOrchestrator {
    cluster: Arc<dyn ClusterClient>,
    installer: Arc<FrameworkInstaller>,
    service_account: String,
    poll: PollConfig,
    recovery: RecoveryConfig,
}

impl ChaosOrchestrator {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        installer: Arc<FrameworkInstaller>,
        service_account: String,
        poll: PollConfig,
        recovery: RecoveryConfig,
    ) -> Self {
        Self {
            cluster,
            installer,
            service_account,
            poll,
            recovery,
        }
    }

    /// Run one experiment to a resolved [`ChaosResult`].
    ///
    /// Errors only before the engine is applied (definition registration,
    /// service-account provisioning, the apply itself). Everything after
    /// resolves, worst case to a diagnostic-only `Awaited`.
    pub async fn run(&self, spec: &ChaosExperimentSpec) -> HavocResult<ChaosResult> {
        let namespace = spec.target.namespace.clone();

        let shape = self
            .installer
            .ensure_experiment_definition(spec.experiment, &namespace)
            .await?;
        self.installer.ensure_service_account(&namespace).await?;

        let spec = self.with_resolved_selector(spec).await;
        let spec = &spec;

        let name = engine_name(&spec.target.name, Utc::now());
        let engine = build_engine(&name, spec, shape, &self.service_account);
        self.apply_engine(&engine).await?;
        info!(
            engine = %name,
            experiment = spec.experiment.wire_name(),
            namespace = %namespace,
            duration_secs = spec.duration_secs,
            "chaos engine launched"
        );

        // Point of no return: the engine exists, so a result must resolve.
        let mut diagnostics = Vec::new();
        diagnostics.push(format!("target selector: {}", spec.target.selector_string()));

        match self.find_execution_pod(&name, spec, &namespace).await {
            Some(pod) => diagnostics.push(format!("execution pod observed: {pod}")),
            None => diagnostics.push(
                "execution pod never observed; experiment may not have started".to_string(),
            ),
        }

        let settle = if spec.experiment.is_node_level() {
            self.poll.node_settle_buffer_secs
        } else {
            self.poll.settle_buffer_secs
        };
        let wait = Duration::from_secs(spec.duration_secs + settle);
        debug!(wait_secs = wait.as_secs(), "waiting out the chaos window");
        tokio::time::sleep(wait).await;

        let mut result = self
            .resolve_result(&name, spec, &namespace, &mut diagnostics)
            .await;

        self.check_target_recovery(spec, &mut diagnostics).await;
        self.tag_if_stuck(&name, &namespace, &mut result, &mut diagnostics)
            .await;

        result.diagnostics = diagnostics;
        info!(
            engine = %name,
            verdict = %result.verdict,
            source = ?result.source,
            stuck = result.stuck,
            "chaos run resolved"
        );
        Ok(result)
    }

    /// The engine needs the target's true pod selector. A workload captured
    /// without one gets its Deployment re-read before launch; a still-empty
    /// selector is left for the recovery check to skip.
    async fn with_resolved_selector(&self, spec: &ChaosExperimentSpec) -> ChaosExperimentSpec {
        let mut spec = spec.clone();
        if !spec.target.selector.is_empty() {
            return spec;
        }
        if let Ok(Some(payload)) = self
            .cluster
            .get(
                &ResourceKind::deployment(),
                Some(&spec.target.namespace),
                &spec.target.name,
            )
            .await
        {
            if let Some(target) = WorkloadView::decode(&payload).into_target() {
                debug!(selector = %target.selector_string(), "selector re-read from live workload");
                spec.target = target;
            }
        }
        spec
    }

    async fn apply_engine(&self, engine: &Value) -> Result<(), ClusterError> {
        match self.cluster.apply(engine).await {
            Ok(()) => Ok(()),
            Err(ClusterError::Validation(reason)) => {
                // Older framework schemas reject fields newer ones require;
                // the relaxed retry lets the server drop what it rejects.
                warn!(reason, "engine rejected by strict validation, retrying relaxed");
                self.cluster.apply_relaxed(engine).await
            }
            Err(err) => Err(err),
        }
    }

    /// Look for the framework's execution pod, trying the correlation
    /// label first, then the experiment's own name label, then a raw
    /// name-substring scan. Absence is a diagnostic, not a failure.
    async fn find_execution_pod(
        &self,
        engine: &str,
        spec: &ChaosExperimentSpec,
        namespace: &str,
    ) -> Option<String> {
        let policy = PollPolicy::new(
            self.poll.pod_attempts,
            Duration::from_secs(self.poll.pod_backoff_secs),
        );
        let wire = spec.experiment.wire_name();
        let selectors = [
            format!("{ENGINE_LABEL}={engine}"),
            format!("name={wire}"),
        ];

        policy
            .poll_until("execution pod", || {
                let selectors = selectors.clone();
                async move {
                    for selector in &selectors {
                        if let Ok(pods) = self
                            .cluster
                            .list(&ResourceKind::pod(), Some(namespace), Some(selector))
                            .await
                        {
                            if let Some(name) = pods.first().and_then(pod_name) {
                                return Some(name);
                            }
                        }
                    }
                    // Last resort: experiment pods embed the experiment
                    // name, runner pods the engine name.
                    if let Ok(pods) = self
                        .cluster
                        .list(&ResourceKind::pod(), Some(namespace), None)
                        .await
                    {
                        return pods
                            .iter()
                            .filter_map(pod_name)
                            .find(|name| name.contains(wire) || name.contains(engine));
                    }
                    None
                }
            })
            .await
    }

    /// Resolve the verdict through the fixed source precedence: the named
    /// result object, a namespace-wide scan, the engine's own status, and
    /// finally diagnostic-only.
    async fn resolve_result(
        &self,
        engine: &str,
        spec: &ChaosExperimentSpec,
        namespace: &str,
        diagnostics: &mut Vec<String>,
    ) -> ChaosResult {
        let wire = spec.experiment.wire_name();
        // Result-object naming varies across framework releases.
        let candidates = [
            format!("{engine}-{wire}"),
            format!("{wire}-{engine}"),
            engine.to_string(),
        ];
        for candidate in &candidates {
            match self
                .cluster
                .get(&ResourceKind::chaos_result(), Some(namespace), candidate)
                .await
            {
                Ok(Some(payload)) => {
                    if let Some(result) = ResultObservation::decode(&payload)
                        .into_result(ResultSource::NamedResult, Vec::new())
                    {
                        diagnostics.push(format!("result object found: {candidate}"));
                        return result;
                    }
                }
                Ok(None) => {}
                Err(err) => diagnostics.push(format!("result lookup {candidate}: {err}")),
            }
        }
        diagnostics.push("no result object under any derived name".to_string());

        if let Some(result) = self
            .scan_results(engine, &spec.target.name, namespace, diagnostics)
            .await
        {
            return result;
        }

        if let Some(result) = self.engine_status_result(engine, namespace).await {
            diagnostics.push("verdict reconstructed from engine status".to_string());
            return result;
        }
        diagnostics.push("engine status carried no verdict".to_string());

        ChaosResult::diagnostic_only(Vec::new())
    }

    /// Second source: list every result object in the namespace and take
    /// the newest one that references this engine. When nothing names the
    /// engine, widen to anything carrying this workload's run prefix:
    /// some framework releases name results after the workload alone.
    async fn scan_results(
        &self,
        engine: &str,
        workload: &str,
        namespace: &str,
        diagnostics: &mut Vec<String>,
    ) -> Option<ChaosResult> {
        let listed = match self
            .cluster
            .list(&ResourceKind::chaos_result(), Some(namespace), None)
            .await
        {
            Ok(listed) => listed,
            Err(err) => {
                diagnostics.push(format!("namespace result scan failed: {err}"));
                return None;
            }
        };

        let mut matches: Vec<ResultObservation> = listed
            .iter()
            .filter(|payload| references_engine(payload, engine))
            .map(ResultObservation::decode)
            .collect();
        if matches.is_empty() {
            let prefix = format!("{workload}-chaos-");
            matches = listed
                .iter()
                .filter(|payload| has_run_prefix(payload, &prefix))
                .map(ResultObservation::decode)
                .collect();
            if !matches.is_empty() {
                diagnostics.push(format!("result matched by run prefix {prefix}"));
            }
        }
        matches.sort_by_key(|obs| match obs {
            ResultObservation::Result { created_at, .. } => *created_at,
            ResultObservation::Unparseable { .. } => None,
        });

        let newest = matches.pop()?;
        let result = newest.into_result(ResultSource::NamespaceScan, Vec::new())?;
        diagnostics.push("result found by namespace scan".to_string());
        Some(result)
    }

    /// Third source: the engine object sometimes carries the verdict even
    /// when no result object ever appeared.
    async fn engine_status_result(&self, engine: &str, namespace: &str) -> Option<ChaosResult> {
        let payload = self
            .cluster
            .get(&ResourceKind::chaos_engine(), Some(namespace), engine)
            .await
            .ok()
            .flatten()?;
        match EngineObservation::decode(&payload) {
            EngineObservation::Engine {
                verdict: Some(verdict),
                ..
            } => Some(ChaosResult {
                verdict: Verdict::parse(&verdict),
                fail_step: None,
                probe_success_percentage: None,
                source: ResultSource::EngineStatus,
                stuck: false,
                diagnostics: Vec::new(),
            }),
            _ => None,
        }
    }

    /// Post-chaos health check on the target. Slow recovery is a
    /// diagnostic; the verdict belongs to the framework.
    async fn check_target_recovery(
        &self,
        spec: &ChaosExperimentSpec,
        diagnostics: &mut Vec<String>,
    ) {
        let selector = spec.target.selector_string();
        if selector.is_empty() {
            return;
        }
        let timeout = Duration::from_secs(self.poll.ready_timeout_secs);
        match self
            .cluster
            .wait_pods_ready(&spec.target.namespace, &selector, timeout)
            .await
        {
            Ok(true) => diagnostics.push("target pods recovered to Ready".to_string()),
            Ok(false) => diagnostics.push(format!(
                "target pods not Ready within {}s of chaos window close",
                timeout.as_secs()
            )),
            Err(err) => diagnostics.push(format!("target recovery check failed: {err}")),
        }
    }

    /// An `Awaited` verdict with the engine still in its initial phase
    /// past the stuck threshold marks the run stuck, which hands it to
    /// recovery.
    async fn tag_if_stuck(
        &self,
        engine: &str,
        namespace: &str,
        result: &mut ChaosResult,
        diagnostics: &mut Vec<String>,
    ) {
        if result.verdict != Verdict::Awaited {
            return;
        }
        let Ok(Some(payload)) = self
            .cluster
            .get(&ResourceKind::chaos_engine(), Some(namespace), engine)
            .await
        else {
            return;
        };
        if let EngineObservation::Engine {
            phase: Some(EnginePhase::Initialized),
            created_at,
            ..
        } = EngineObservation::decode(&payload)
        {
            let threshold = i64::try_from(self.recovery.stuck_threshold_secs).unwrap_or(i64::MAX);
            let age_secs = created_at.map(|c| (Utc::now() - c).num_seconds());
            if age_secs.is_none_or(|age| age > threshold) {
                result.stuck = true;
                diagnostics.push(format!(
                    "engine stuck in initialized phase (age {}s, threshold {threshold}s)",
                    age_secs.unwrap_or(-1)
                ));
            }
        }
    }
}

fn pod_name(pod: &Value) -> Option<String> {
    pod.get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

/// A result object references an engine via its correlation label or by
/// embedding the engine name in its own.
fn references_engine(payload: &Value, engine: &str) -> bool {
    let by_label = payload
        .get("metadata")
        .and_then(|m| m.get("labels"))
        .and_then(|l| l.get(ENGINE_LABEL))
        .and_then(Value::as_str)
        == Some(engine);
    let by_name = payload
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .is_some_and(|name| name.contains(engine));
    by_label || by_name
}

/// Widened correlation: the result's name carries the workload's
/// `<workload>-chaos-` naming prefix.
fn has_run_prefix(payload: &Value, prefix: &str) -> bool {
    payload
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .is_some_and(|name| name.contains(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_references_engine_by_label_or_name() {
        let by_label = json!({"metadata": {"name": "other", "labels": {"chaosengine": "web-chaos-1"}}});
        let by_name = json!({"metadata": {"name": "web-chaos-1-pod-delete"}});
        let unrelated = json!({"metadata": {"name": "db-chaos-2-pod-delete"}});
        assert!(references_engine(&by_label, "web-chaos-1"));
        assert!(references_engine(&by_name, "web-chaos-1"));
        assert!(!references_engine(&unrelated, "web-chaos-1"));
    }

    #[test]
    fn test_has_run_prefix_widens_to_workload_naming() {
        let named = json!({"metadata": {"name": "web-chaos-17-result"}});
        let other = json!({"metadata": {"name": "db-chaos-17-result"}});
        assert!(has_run_prefix(&named, "web-chaos-"));
        assert!(!has_run_prefix(&other, "web-chaos-"));
        assert!(!has_run_prefix(&json!({}), "web-chaos-"));
    }
}
