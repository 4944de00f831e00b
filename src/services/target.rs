//! Target selection: find the workload a chaos experiment will attack.
//!
//! Selection reads live cluster state every time. The cluster-wide scan
//! skips control-plane and framework namespaces, prefers the configured
//! target namespace, and otherwise takes the first decodable workload with
//! a usable selector.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::errors::{HavocError, HavocResult};
use crate::domain::models::target::{TargetWorkload, WorkloadView};
use crate::domain::ports::{ClusterClient, ResourceKind};

/// Namespaces never chosen by the automatic scan.
const SKIPPED_NAMESPACES: &[&str] = &[
    "kube-system",
    "kube-public",
    "kube-node-lease",
    "litmus",
    "local-path-storage",
];

pub struct TargetSelector {
    cluster: Arc<dyn ClusterClient>,
    preferred_namespace: String,
}

impl TargetSelector {
    pub fn new(cluster: Arc<dyn ClusterClient>, preferred_namespace: String) -> Self {
        Self {
            cluster,
            preferred_namespace,
        }
    }

    /// Select a workload by explicit name. Missing or undecodable workloads
    /// are an error here; the caller asked for this one specifically.
    pub async fn select_named(&self, name: &str, namespace: &str) -> HavocResult<TargetWorkload> {
        let found = self
            .cluster
            .get(&ResourceKind::deployment(), Some(namespace), name)
            .await?;
        let Some(payload) = found else {
            return Err(HavocError::TargetNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            });
        };
        WorkloadView::decode(&payload)
            .into_target()
            .ok_or_else(|| HavocError::TargetNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            })
    }

    /// Scan the cluster for a candidate workload. `Ok(None)` means nothing
    /// suitable exists; the caller decides whether to fall back.
    pub async fn select_auto(&self) -> HavocResult<Option<TargetWorkload>> {
        let deployments = self
            .cluster
            .list(&ResourceKind::deployment(), None, None)
            .await?;

        let mut candidates = Vec::new();
        for payload in &deployments {
            match WorkloadView::decode(payload).into_target() {
                Some(target) => {
                    if SKIPPED_NAMESPACES.contains(&target.namespace.as_str()) {
                        debug!(
                            name = %target.name,
                            namespace = %target.namespace,
                            "skipping workload in reserved namespace"
                        );
                        continue;
                    }
                    candidates.push(target);
                }
                None => warn!("skipping workload without a usable selector"),
            }
        }

        let preferred = candidates
            .iter()
            .position(|t| t.namespace == self.preferred_namespace);
        let chosen = match preferred {
            Some(idx) => Some(candidates.swap_remove(idx)),
            None => candidates.into_iter().next(),
        };
        if let Some(target) = &chosen {
            info!(
                name = %target.name,
                namespace = %target.namespace,
                selector = %target.selector_string(),
                "selected chaos target"
            );
        }
        Ok(chosen)
    }
}
