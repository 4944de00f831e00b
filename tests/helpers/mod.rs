//! Shared test fixtures: an in-memory cluster standing in for the real
//! control plane, plus manifest builders.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::{json, Value};

use havoc::domain::errors::{ClusterError, HavocError};
use havoc::domain::ports::{ClusterClient, DeleteOutcome, RepoFetcher, ResourceKind};

type Key = (String, String, String);
type Predicate = Box<dyn Fn(&Value) -> Option<String> + Send + Sync>;
type ApplyHook = Box<dyn Fn(&MockCluster, &Value) + Send + Sync>;

/// In-memory cluster. Stores applied manifests keyed by
/// (kind, namespace, name), stamps creation timestamps in apply order,
/// and lets tests inject validation rejections and post-apply reactions
/// (the operator's side of the conversation).
#[derive(Default)]
pub struct MockCluster {
    store: Mutex<BTreeMap<Key, Value>>,
    pub applies: Mutex<Vec<Value>>,
    pub relaxed_applies: Mutex<Vec<Value>>,
    pub deletes: Mutex<Vec<(String, String, bool)>>,
    strict_rejects: Mutex<Vec<Predicate>>,
    relaxed_rejects: Mutex<Vec<Predicate>>,
    on_apply: Mutex<Option<ApplyHook>>,
    pods_ready: Mutex<bool>,
    clock: AtomicI64,
}

impl MockCluster {
    pub fn new() -> Self {
        Self {
            pods_ready: Mutex::new(true),
            ..Self::default()
        }
    }

    fn key_of(manifest: &Value) -> Key {
        let kind = manifest
            .get("kind")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let meta = manifest.get("metadata");
        let namespace = meta
            .and_then(|m| m.get("namespace"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let name = meta
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        (kind, namespace, name)
    }

    fn next_timestamp(&self) -> String {
        let tick = self.clock.fetch_add(1, Ordering::SeqCst);
        DateTime::from_timestamp(1_760_000_000 + tick, 0)
            .map(|ts| ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
            .unwrap_or_default()
    }

    /// Put an object into the store directly, bypassing apply bookkeeping.
    pub fn seed(&self, kind: &str, namespace: &str, name: &str, mut value: Value) {
        if value.get("metadata").is_none() {
            value["metadata"] = json!({});
        }
        value["metadata"]["name"] = json!(name);
        if !namespace.is_empty() {
            value["metadata"]["namespace"] = json!(namespace);
        }
        if value["metadata"].get("creationTimestamp").is_none() {
            value["metadata"]["creationTimestamp"] = json!(self.next_timestamp());
        }
        self.store.lock().unwrap().insert(
            (kind.to_string(), namespace.to_string(), name.to_string()),
            value,
        );
    }

    pub fn stored(&self, kind: &str, namespace: &str, name: &str) -> Option<Value> {
        self.store
            .lock()
            .unwrap()
            .get(&(kind.to_string(), namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn remove(&self, kind: &str, namespace: &str, name: &str) {
        self.store
            .lock()
            .unwrap()
            .remove(&(kind.to_string(), namespace.to_string(), name.to_string()));
    }

    /// Reject strict applies for which the predicate returns a reason.
    pub fn reject_strict(&self, predicate: impl Fn(&Value) -> Option<String> + Send + Sync + 'static) {
        self.strict_rejects.lock().unwrap().push(Box::new(predicate));
    }

    /// Reject relaxed applies too.
    pub fn reject_relaxed(
        &self,
        predicate: impl Fn(&Value) -> Option<String> + Send + Sync + 'static,
    ) {
        self.relaxed_rejects.lock().unwrap().push(Box::new(predicate));
    }

    /// React to accepted applies, e.g. to play the operator creating a
    /// result object once an engine lands.
    pub fn on_apply(&self, hook: impl Fn(&MockCluster, &Value) + Send + Sync + 'static) {
        *self.on_apply.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn set_pods_ready(&self, ready: bool) {
        *self.pods_ready.lock().unwrap() = ready;
    }

    pub fn applied_kinds(&self) -> Vec<String> {
        self.applies
            .lock()
            .unwrap()
            .iter()
            .map(|m| {
                m.get("kind")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    }

    fn accept(&self, manifest: &Value) {
        let key = Self::key_of(manifest);
        let mut stored = manifest.clone();
        {
            let mut store = self.store.lock().unwrap();
            let existing_ts = store
                .get(&key)
                .and_then(|v| v.pointer("/metadata/creationTimestamp").cloned());
            let ts = existing_ts.unwrap_or_else(|| json!(self.next_timestamp()));
            stored["metadata"]["creationTimestamp"] = ts;
            store.insert(key, stored);
        }
        let hook = self.on_apply.lock().unwrap();
        if let Some(hook) = hook.as_ref() {
            hook(self, manifest);
        }
    }
}

fn matches_selector(value: &Value, selector: &str) -> bool {
    let labels = value.get("metadata").and_then(|m| m.get("labels"));
    selector
        .split(',')
        .filter(|pair| !pair.is_empty())
        .all(|pair| match pair.split_once('=') {
            Some((k, v)) => labels.and_then(|l| l.get(k)).and_then(Value::as_str) == Some(v),
            None => false,
        })
}

#[async_trait]
impl ClusterClient for MockCluster {
    async fn apply(&self, manifest: &Value) -> Result<(), ClusterError> {
        for predicate in self.strict_rejects.lock().unwrap().iter() {
            if let Some(reason) = predicate(manifest) {
                return Err(ClusterError::Validation(reason));
            }
        }
        self.applies.lock().unwrap().push(manifest.clone());
        self.accept(manifest);
        Ok(())
    }

    async fn apply_relaxed(&self, manifest: &Value) -> Result<(), ClusterError> {
        for predicate in self.relaxed_rejects.lock().unwrap().iter() {
            if let Some(reason) = predicate(manifest) {
                return Err(ClusterError::Validation(reason));
            }
        }
        self.relaxed_applies.lock().unwrap().push(manifest.clone());
        self.accept(manifest);
        Ok(())
    }

    async fn get(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Value>, ClusterError> {
        let key = (
            kind.kind.to_string(),
            namespace.unwrap_or_default().to_string(),
            name.to_string(),
        );
        Ok(self.store.lock().unwrap().get(&key).cloned())
    }

    async fn list(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>, ClusterError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .iter()
            .filter(|((k, ns, _), _)| {
                k == kind.kind && namespace.is_none_or(|want| ns == want)
            })
            .filter(|(_, value)| label_selector.is_none_or(|sel| matches_selector(value, sel)))
            .map(|(_, value)| value.clone())
            .collect())
    }

    async fn delete(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
        force: bool,
    ) -> Result<DeleteOutcome, ClusterError> {
        self.deletes
            .lock()
            .unwrap()
            .push((kind.kind.to_string(), name.to_string(), force));
        let key = (
            kind.kind.to_string(),
            namespace.unwrap_or_default().to_string(),
            name.to_string(),
        );
        match self.store.lock().unwrap().remove(&key) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    async fn wait_pods_ready(
        &self,
        _namespace: &str,
        _label_selector: &str,
        _timeout: Duration,
    ) -> Result<bool, ClusterError> {
        Ok(*self.pods_ready.lock().unwrap())
    }
}

/// Repo fetcher that hands back a pre-built directory.
pub struct FixtureRepo {
    pub path: PathBuf,
}

#[async_trait]
impl RepoFetcher for FixtureRepo {
    async fn fetch(&self, _url: &str) -> Result<PathBuf, HavocError> {
        Ok(self.path.clone())
    }
}

/// Chart/overlay stubs for tests that never hit those paths.
pub struct NoChart;

#[async_trait]
impl havoc::domain::ports::ChartInstaller for NoChart {
    async fn install(
        &self,
        _name: &str,
        _path: &Path,
        _namespace: &str,
    ) -> Result<String, HavocError> {
        Err(HavocError::Deployment("chart install unavailable".into()))
    }
}

pub struct NoOverlay;

#[async_trait]
impl havoc::domain::ports::OverlayBuilder for NoOverlay {
    async fn build(&self, _path: &Path) -> Result<String, HavocError> {
        Err(HavocError::Deployment("overlay build unavailable".into()))
    }
}

/// Minimal Deployment payload as the control plane would return it.
pub fn deployment_payload(name: &str, namespace: &str, app: &str) -> Value {
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": name, "namespace": namespace},
        "spec": {"selector": {"matchLabels": {"app": app}}}
    })
}

/// Seed everything `FrameworkInstaller::ensure_installed` checks for.
pub fn seed_installed_framework(cluster: &MockCluster, framework_namespace: &str) {
    cluster.seed(
        "CustomResourceDefinition",
        "",
        "chaosengines.litmuschaos.io",
        json!({"kind": "CustomResourceDefinition"}),
    );
    cluster.seed(
        "Deployment",
        framework_namespace,
        "chaos-operator-ce",
        json!({"kind": "Deployment", "status": {"readyReplicas": 1}}),
    );
}

/// Write a plain two-resource app repo into `dir`.
pub fn write_plain_repo(dir: &Path) {
    std::fs::write(
        dir.join("deployment.yaml"),
        r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 2
  selector:
    matchLabels:
      app: web
  template:
    metadata:
      labels:
        app: web
    spec:
      containers:
        - name: web
          image: nginx:1.27-alpine
"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("service.yaml"),
        r#"apiVersion: v1
kind: Service
metadata:
  name: web
spec:
  selector:
    app: web
  ports:
    - port: 80
"#,
    )
    .unwrap();
}
