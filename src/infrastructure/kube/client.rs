//! Production [`ClusterClient`] over the Kubernetes API.
//!
//! All writes go through server-side apply against the dynamic API, so the
//! same path handles built-in kinds, framework custom resources, and
//! whatever a target repository ships. Discovery is refreshed when a kind
//! resolves to nothing, because the installer creates CRDs mid-run and an
//! old snapshot would not see them.

use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, ResourceExt};
use kube::core::GroupVersionKind;
use kube::discovery::{ApiCapabilities, ApiResource, Discovery, Scope};
use kube::Client;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::domain::errors::{ClusterError, HavocError};
use crate::domain::ports::{ClusterClient, DeleteOutcome, ResourceKind};

const FIELD_MANAGER: &str = "havoc";

pub struct KubeClusterClient {
    client: Client,
    discovery: RwLock<Discovery>,
}

impl KubeClusterClient {
    /// Connect using the ambient kubeconfig / in-cluster environment.
    pub async fn connect() -> Result<Self, HavocError> {
        let client = Client::try_default()
            .await
            .map_err(|err| HavocError::ClusterUnreachable(err.to_string()))?;
        let discovery = Discovery::new(client.clone())
            .run()
            .await
            .map_err(|err| HavocError::ClusterUnreachable(err.to_string()))?;
        Ok(Self {
            client,
            discovery: RwLock::new(discovery),
        })
    }

    fn classify(err: &kube::Error) -> ClusterError {
        match err {
            kube::Error::Api(resp) => {
                if resp.code == 422 || resp.reason == "Invalid" || resp.reason == "BadRequest" {
                    ClusterError::Validation(resp.message.clone())
                } else {
                    ClusterError::Api(format!("{} ({})", resp.message, resp.code))
                }
            }
            other => ClusterError::Connection(other.to_string()),
        }
    }

    /// Resolve a GVK, refreshing the discovery snapshot once on a miss.
    async fn resolve(
        &self,
        gvk: &GroupVersionKind,
    ) -> Result<(ApiResource, ApiCapabilities), ClusterError> {
        if let Some(found) = self.discovery.read().await.resolve_gvk(gvk) {
            return Ok(found);
        }
        debug!(kind = %gvk.kind, "kind not in discovery snapshot, refreshing");
        let fresh = Discovery::new(self.client.clone())
            .run()
            .await
            .map_err(|err| ClusterError::Connection(err.to_string()))?;
        let resolved = fresh.resolve_gvk(gvk);
        *self.discovery.write().await = fresh;
        resolved.ok_or_else(|| {
            ClusterError::Api(format!(
                "no API resource for {}/{}",
                gvk.api_version(),
                gvk.kind
            ))
        })
    }

    fn dynamic_api(
        &self,
        ar: ApiResource,
        namespaced: bool,
        namespace: Option<&str>,
    ) -> Api<DynamicObject> {
        if !namespaced {
            Api::all_with(self.client.clone(), &ar)
        } else if let Some(ns) = namespace {
            Api::namespaced_with(self.client.clone(), ns, &ar)
        } else {
            Api::default_namespaced_with(self.client.clone(), &ar)
        }
    }

    fn known_api(kind: &ResourceKind) -> ApiResource {
        let (group, version) = match kind.api_version.split_once('/') {
            Some((g, v)) => (g.to_string(), v.to_string()),
            None => (String::new(), kind.api_version.to_string()),
        };
        ApiResource {
            group,
            version,
            api_version: kind.api_version.to_string(),
            kind: kind.kind.to_string(),
            plural: kind.plural.to_string(),
        }
    }

    async fn apply_inner(&self, manifest: &Value, params: &PatchParams) -> Result<(), ClusterError> {
        let obj: DynamicObject = serde_json::from_value(manifest.clone())
            .map_err(|err| ClusterError::Unparseable(format!("manifest: {err}")))?;
        let Some(types) = obj.types.clone() else {
            return Err(ClusterError::Unparseable(
                "manifest has no apiVersion/kind".to_string(),
            ));
        };
        let gvk = GroupVersionKind::try_from(&types)
            .map_err(|err| ClusterError::Unparseable(format!("apiVersion: {err}")))?;
        let name = obj.name_any();
        let namespace = obj.metadata.namespace.clone();
        let (ar, caps) = self.resolve(&gvk).await?;
        let api = self.dynamic_api(ar, caps.scope == Scope::Namespaced, namespace.as_deref());
        debug!(kind = %gvk.kind, name, "applying manifest");
        api.patch(&name, params, &Patch::Apply(manifest))
            .await
            .map_err(|err| Self::classify(&err))?;
        Ok(())
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn apply(&self, manifest: &Value) -> Result<(), ClusterError> {
        let params = PatchParams::apply(FIELD_MANAGER).force();
        self.apply_inner(manifest, &params).await
    }

    async fn apply_relaxed(&self, manifest: &Value) -> Result<(), ClusterError> {
        let mut params = PatchParams::apply(FIELD_MANAGER).force();
        params.field_validation = Some(kube::api::ValidationDirective::Ignore);
        self.apply_inner(manifest, &params).await
    }

    async fn get(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Value>, ClusterError> {
        let api = self.dynamic_api(Self::known_api(kind), kind.namespaced, namespace);
        match api.get(name).await {
            Ok(obj) => Ok(Some(serde_json::to_value(&obj).map_err(|err| {
                ClusterError::Unparseable(err.to_string())
            })?)),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(None),
            Err(err) => Err(Self::classify(&err)),
        }
    }

    async fn list(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>, ClusterError> {
        let api = self.dynamic_api(Self::known_api(kind), kind.namespaced, namespace);
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        let list = match api.list(&params).await {
            Ok(list) => list,
            // Listing a kind whose CRD is absent is "nothing there", not a
            // hard failure; the installer decides what to do about it.
            Err(kube::Error::Api(resp)) if resp.code == 404 => return Ok(Vec::new()),
            Err(err) => return Err(Self::classify(&err)),
        };
        list.items
            .iter()
            .map(|obj| {
                serde_json::to_value(obj).map_err(|err| ClusterError::Unparseable(err.to_string()))
            })
            .collect()
    }

    async fn delete(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
        force: bool,
    ) -> Result<DeleteOutcome, ClusterError> {
        let api = self.dynamic_api(Self::known_api(kind), kind.namespaced, namespace);
        let params = if force {
            DeleteParams {
                grace_period_seconds: Some(0),
                ..DeleteParams::default()
            }
        } else {
            DeleteParams::default()
        };
        match api.delete(name, &params).await {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(DeleteOutcome::NotFound),
            Err(err) => Err(Self::classify(&err)),
        }
    }

    async fn wait_pods_ready(
        &self,
        namespace: &str,
        label_selector: &str,
        timeout: Duration,
    ) -> Result<bool, ClusterError> {
        let deadline = Instant::now() + timeout;
        let kind = ResourceKind::pod();
        loop {
            let pods = self
                .list(&kind, Some(namespace), Some(label_selector))
                .await?;
            if !pods.is_empty() && pods.iter().all(pod_is_ready) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                warn!(namespace, label_selector, "pods not ready before timeout");
                return Ok(false);
            }
            sleep(Duration::from_secs(5)).await;
        }
    }
}

/// Running phase plus a true Ready condition.
fn pod_is_ready(pod: &Value) -> bool {
    let status = pod.get("status");
    let running = status
        .and_then(|s| s.get("phase"))
        .and_then(Value::as_str)
        .is_some_and(|p| p == "Running");
    let ready = status
        .and_then(|s| s.get("conditions"))
        .and_then(Value::as_array)
        .is_some_and(|conds| {
            conds.iter().any(|c| {
                c.get("type").and_then(Value::as_str) == Some("Ready")
                    && c.get("status").and_then(Value::as_str) == Some("True")
            })
        });
    running && ready
}
