//! Ports: the interfaces the core consumes.
//!
//! The cluster is the sole source of truth; [`ClusterClient`] is its only
//! doorway. Every check re-reads current state through it, one call at a
//! time. The remaining ports wrap the thin external collaborators
//! (repository acquisition, packaging tools) so services stay testable
//! without a cluster or a network.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::errors::{ClusterError, HavocError};

/// Identity of a resource kind on the control plane: enough to route a
/// get/list/delete without discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
    pub namespaced: bool,
}

impl ResourceKind {
    pub const fn pod() -> Self {
        Self {
            api_version: "v1",
            kind: "Pod",
            plural: "pods",
            namespaced: true,
        }
    }

    pub const fn namespace() -> Self {
        Self {
            api_version: "v1",
            kind: "Namespace",
            plural: "namespaces",
            namespaced: false,
        }
    }

    pub const fn service() -> Self {
        Self {
            api_version: "v1",
            kind: "Service",
            plural: "services",
            namespaced: true,
        }
    }

    pub const fn service_account() -> Self {
        Self {
            api_version: "v1",
            kind: "ServiceAccount",
            plural: "serviceaccounts",
            namespaced: true,
        }
    }

    pub const fn deployment() -> Self {
        Self {
            api_version: "apps/v1",
            kind: "Deployment",
            plural: "deployments",
            namespaced: true,
        }
    }

    pub const fn cluster_role() -> Self {
        Self {
            api_version: "rbac.authorization.k8s.io/v1",
            kind: "ClusterRole",
            plural: "clusterroles",
            namespaced: false,
        }
    }

    pub const fn cluster_role_binding() -> Self {
        Self {
            api_version: "rbac.authorization.k8s.io/v1",
            kind: "ClusterRoleBinding",
            plural: "clusterrolebindings",
            namespaced: false,
        }
    }

    pub const fn crd() -> Self {
        Self {
            api_version: "apiextensions.k8s.io/v1",
            kind: "CustomResourceDefinition",
            plural: "customresourcedefinitions",
            namespaced: false,
        }
    }

    pub const fn chaos_engine() -> Self {
        Self {
            api_version: "litmuschaos.io/v1alpha1",
            kind: "ChaosEngine",
            plural: "chaosengines",
            namespaced: true,
        }
    }

    pub const fn chaos_experiment() -> Self {
        Self {
            api_version: "litmuschaos.io/v1alpha1",
            kind: "ChaosExperiment",
            plural: "chaosexperiments",
            namespaced: true,
        }
    }

    pub const fn chaos_result() -> Self {
        Self {
            api_version: "litmuschaos.io/v1alpha1",
            kind: "ChaosResult",
            plural: "chaosresults",
            namespaced: true,
        }
    }
}

/// What a delete actually did. Not-found is a normal answer, not an error:
/// recovery leans on that for idempotence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// The control-plane doorway: textual/JSON request-response, no persistent
/// connection, no cache.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Server-side apply of a full manifest (carries apiVersion/kind).
    async fn apply(&self, manifest: &Value) -> Result<(), ClusterError>;

    /// Apply with relaxed field validation, for schema-variant manifests
    /// the strict path rejects.
    async fn apply_relaxed(&self, manifest: &Value) -> Result<(), ClusterError>;

    /// Fetch one resource; `Ok(None)` when it does not exist.
    async fn get(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Value>, ClusterError>;

    /// List resources, optionally namespace-bound and label-filtered.
    async fn list(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>, ClusterError>;

    /// Delete one resource; `force` drops the grace period.
    async fn delete(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
        force: bool,
    ) -> Result<DeleteOutcome, ClusterError>;

    /// Block until all pods matching the selector report Ready, or the
    /// bounded timeout lapses. Returns whether they made it.
    async fn wait_pods_ready(
        &self,
        namespace: &str,
        label_selector: &str,
        timeout: Duration,
    ) -> Result<bool, ClusterError>;
}

/// Repository acquisition (thin, external).
#[async_trait]
pub trait RepoFetcher: Send + Sync {
    /// Fetch the repository and return the local checkout path.
    async fn fetch(&self, url: &str) -> Result<PathBuf, HavocError>;
}

/// Packaged-chart installation (thin, external).
#[async_trait]
pub trait ChartInstaller: Send + Sync {
    /// Install the chart at `path` as release `name` into `namespace`,
    /// returning the tool's log output.
    async fn install(&self, name: &str, path: &Path, namespace: &str)
        -> Result<String, HavocError>;
}

/// Overlay composition (thin, external): renders to a resource stream that
/// is piped back through [`ClusterClient::apply`].
#[async_trait]
pub trait OverlayBuilder: Send + Sync {
    async fn build(&self, path: &Path) -> Result<String, HavocError>;
}
