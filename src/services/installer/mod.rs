//! Chaos framework installer.
//!
//! Installs the fault-injection framework (operator + CRDs), provisions
//! the experiment runner's service account, and registers experiment
//! definitions against whichever schema revision the cluster accepts.
//! Every "is it installed" question is answered by reading the cluster,
//! never from process state, so concurrent runs converge instead of
//! fighting.

pub mod manifests;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::errors::{ClusterError, HavocError, HavocResult};
use crate::domain::models::config::InstallerConfig;
use crate::domain::models::experiment::ChaosExperimentType;
use crate::domain::models::framework::{ChaosFrameworkState, SchemaShape};
use crate::domain::models::manifest::split_manifests;
use crate::domain::ports::{ClusterClient, ResourceKind};
use crate::infrastructure::kube::resources::{
    chaos_cluster_role, chaos_cluster_role_binding, chaos_service_account, to_manifest,
};
use crate::infrastructure::retry::PollPolicy;

pub struct FrameworkInstaller {
    cluster: Arc<dyn ClusterClient>,
    http: reqwest::Client,
    config: InstallerConfig,
    /// Read-back poll after installing CRDs or definitions.
    readback: PollPolicy,
}

impl FrameworkInstaller {
    pub fn new(cluster: Arc<dyn ClusterClient>, config: InstallerConfig) -> Self {
        Self {
            cluster,
            http: reqwest::Client::new(),
            config,
            readback: PollPolicy::new(6, Duration::from_secs(2)),
        }
    }

    /// Override the read-back poll cadence.
    pub fn with_readback(mut self, readback: PollPolicy) -> Self {
        self.readback = readback;
        self
    }

    /// Live snapshot of framework state for one experiment/namespace pair.
    pub async fn validate(
        &self,
        experiment: ChaosExperimentType,
        target_namespace: &str,
    ) -> HavocResult<ChaosFrameworkState> {
        let crds_present = self
            .cluster
            .get(&ResourceKind::crd(), None, "chaosengines.litmuschaos.io")
            .await?
            .is_some();
        let operator_running = self.operator_running().await?;
        let service_account_present = self
            .cluster
            .get(
                &ResourceKind::service_account(),
                Some(target_namespace),
                &self.config.service_account,
            )
            .await?
            .is_some();
        let experiment_definition_present = self
            .cluster
            .get(
                &ResourceKind::chaos_experiment(),
                Some(target_namespace),
                experiment.wire_name(),
            )
            .await?
            .is_some();
        Ok(ChaosFrameworkState {
            crds_present,
            operator_running,
            service_account_present,
            experiment_definition_present,
        })
    }

    async fn operator_running(&self) -> Result<bool, ClusterError> {
        let deployment = self
            .cluster
            .get(
                &ResourceKind::deployment(),
                Some(&self.config.framework_namespace),
                manifests::OPERATOR_DEPLOYMENT,
            )
            .await?;
        Ok(deployment.is_some_and(|d| {
            d.get("status")
                .and_then(|s| s.get("readyReplicas"))
                .and_then(Value::as_u64)
                .unwrap_or(0)
                > 0
        }))
    }

    /// Install the framework CRDs and operator if missing. The published
    /// bundle is preferred; the bundled minimal manifests are the fallback
    /// when it cannot be fetched. Idempotent: present components are left
    /// alone.
    pub async fn ensure_installed(&self) -> HavocResult<()> {
        let crds_present = self
            .cluster
            .get(&ResourceKind::crd(), None, "chaosengines.litmuschaos.io")
            .await?
            .is_some();
        if crds_present && self.operator_running().await? {
            debug!("chaos framework already installed");
            return Ok(());
        }

        let docs = match self.fetch_bundle().await {
            Ok(docs) => docs,
            Err(err) => {
                warn!(error = %err, "operator bundle fetch failed, installing bundled manifests");
                let mut docs = manifests::framework_crds();
                docs.extend(manifests::operator_manifests(
                    &self.config.framework_namespace,
                ));
                docs
            }
        };

        let mut failures = Vec::new();
        for doc in &docs {
            if let Err(err) = self.apply_with_relaxed_fallback(doc).await {
                failures.push(err.to_string());
            }
        }
        if !failures.is_empty() {
            warn!(
                failed = failures.len(),
                total = docs.len(),
                "some framework manifests were rejected"
            );
        }

        // Installation counts only when the CRDs are actually readable.
        let cluster = Arc::clone(&self.cluster);
        let confirmed = self
            .readback
            .poll_until("framework CRDs", || {
                let cluster = Arc::clone(&cluster);
                async move {
                    cluster
                        .get(&ResourceKind::crd(), None, "chaosengines.litmuschaos.io")
                        .await
                        .ok()
                        .flatten()
                }
            })
            .await
            .is_some();
        if !confirmed {
            return Err(HavocError::InstallExhausted(format!(
                "framework CRDs never became readable; apply failures: [{}]",
                failures.join("; ")
            )));
        }
        info!("chaos framework installed");
        Ok(())
    }

    async fn fetch_bundle(&self) -> Result<Vec<Value>, HavocError> {
        let url = &self.config.operator_manifest_url;
        let body = self
            .http
            .get(url)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|err| HavocError::InstallExhausted(format!("fetch {url}: {err}")))?
            .error_for_status()
            .map_err(|err| HavocError::InstallExhausted(format!("fetch {url}: {err}")))?
            .text()
            .await
            .map_err(|err| HavocError::InstallExhausted(format!("read {url}: {err}")))?;
        let (docs, errors) = split_manifests(&body);
        for error in errors {
            warn!(error, "skipping unparseable bundle document");
        }
        if docs.is_empty() {
            return Err(HavocError::InstallExhausted(format!(
                "bundle at {url} contained no documents"
            )));
        }
        Ok(docs)
    }

    /// Provision the runner's service account and cluster-wide grants in
    /// the target namespace. Verified by read-back; a grant the cluster
    /// will not return does not count as provisioned.
    pub async fn ensure_service_account(&self, namespace: &str) -> HavocResult<()> {
        let name = &self.config.service_account;
        let objects = [
            to_manifest(&chaos_service_account(name, namespace))?,
            to_manifest(&chaos_cluster_role(name))?,
            to_manifest(&chaos_cluster_role_binding(name, namespace))?,
        ];
        for object in &objects {
            self.cluster
                .apply(object)
                .await
                .map_err(|err| HavocError::ServiceAccount(err.to_string()))?;
        }

        let readable = self
            .cluster
            .get(&ResourceKind::service_account(), Some(namespace), name)
            .await
            .map_err(|err| HavocError::ServiceAccount(err.to_string()))?
            .is_some();
        if !readable {
            return Err(HavocError::ServiceAccount(format!(
                "{name} in {namespace} not readable after apply"
            )));
        }
        debug!(name = %name, namespace, "chaos service account provisioned");
        Ok(())
    }

    /// Register the experiment definition, probing schema revisions newest
    /// first and stopping at the first the cluster both accepts and returns
    /// on read-back. The accepted shape drives engine construction later.
    pub async fn ensure_experiment_definition(
        &self,
        experiment: ChaosExperimentType,
        namespace: &str,
    ) -> HavocResult<SchemaShape> {
        let mut rejections = Vec::new();
        for &shape in SchemaShape::preference_order() {
            let definition = manifests::experiment_definition(experiment, namespace, shape);
            match self.apply_with_relaxed_fallback(&definition).await {
                Ok(()) => {}
                Err(err) => {
                    debug!(shape = shape.label(), error = %err, "schema revision rejected");
                    rejections.push(format!("{}: {err}", shape.label()));
                    continue;
                }
            }
            // Acceptance means the server hands the definition back.
            let readable = self
                .cluster
                .get(
                    &ResourceKind::chaos_experiment(),
                    Some(namespace),
                    experiment.wire_name(),
                )
                .await?
                .is_some();
            if readable {
                info!(
                    experiment = experiment.wire_name(),
                    namespace,
                    shape = shape.label(),
                    "experiment definition registered"
                );
                return Ok(shape);
            }
            rejections.push(format!("{}: applied but not readable", shape.label()));
        }
        Err(HavocError::InstallExhausted(format!(
            "no schema revision accepted for {}: [{}]",
            experiment.wire_name(),
            rejections.join("; ")
        )))
    }

    /// Strict apply first; on a validation rejection retry once with
    /// relaxed field validation. Other errors pass through.
    async fn apply_with_relaxed_fallback(&self, doc: &Value) -> Result<(), ClusterError> {
        match self.cluster.apply(doc).await {
            Ok(()) => Ok(()),
            Err(ClusterError::Validation(reason)) => {
                debug!(reason, "strict apply rejected, retrying relaxed");
                self.cluster.apply_relaxed(doc).await
            }
            Err(err) => Err(err),
        }
    }
}
