//! Chaos engine resource: construction and observation.
//!
//! An engine is the cluster resource instance representing one running
//! fault-injection experiment. Exactly one engine exists per run; the
//! timestamp-qualified name is the only collision defense across
//! uncoordinated concurrent runs.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::experiment::ChaosExperimentSpec;
use super::framework::SchemaShape;

/// API group/version the framework resources live under.
pub const CHAOS_API_VERSION: &str = "litmuschaos.io/v1alpha1";

/// Correlation label stamped on execution pods and result objects.
pub const ENGINE_LABEL: &str = "chaosengine";

/// Derive the unique engine name for a run: `<workload>-chaos-<unixMillis>`.
pub fn engine_name(workload: &str, now: DateTime<Utc>) -> String {
    format!("{workload}-chaos-{}", now.timestamp_millis())
}

/// Shared tuning applied to every experiment: half the matching pods,
/// ten-second action interval, forced termination. `TOTAL_CHAOS_DURATION`
/// is always present.
fn chaos_env(spec: &ChaosExperimentSpec) -> Vec<Value> {
    let mut env: Vec<(String, String)> = vec![
        (
            "TOTAL_CHAOS_DURATION".to_string(),
            spec.duration_secs.to_string(),
        ),
        ("PODS_AFFECTED_PERC".to_string(), "50".to_string()),
        ("CHAOS_INTERVAL".to_string(), "10".to_string()),
        ("FORCE".to_string(), "true".to_string()),
    ];
    for (k, v) in spec.experiment.extra_env() {
        env.push((k.to_string(), v.to_string()));
    }
    // Caller overrides win over the fixed tuning set.
    for (k, v) in &spec.params {
        if let Some(slot) = env.iter_mut().find(|(name, _)| name == k) {
            slot.1 = v.clone();
        } else {
            env.push((k.clone(), v.clone()));
        }
    }
    env.into_iter()
        .map(|(name, value)| json!({"name": name, "value": value}))
        .collect()
}

/// Build the engine manifest for the installed schema revision.
///
/// Modern revisions take the target-workload reference at `spec.appinfo`
/// and the service account at `spec.chaosServiceAccount`; the oldest
/// revision nests both under `spec.components`.
pub fn build_engine(
    name: &str,
    spec: &ChaosExperimentSpec,
    shape: SchemaShape,
    service_account: &str,
) -> Value {
    let experiment_entry = json!({
        "name": spec.experiment.wire_name(),
        "spec": {
            "components": {
                "env": chaos_env(spec),
            }
        }
    });
    let appinfo = json!({
        "appns": spec.target.namespace,
        "applabel": spec.target.app_label(),
        "appkind": "deployment",
    });

    let mut obj = serde_json::Map::new();
    obj.insert("engineState".to_string(), json!("active"));
    obj.insert("annotationCheck".to_string(), json!("false"));
    obj.insert("jobCleanUpPolicy".to_string(), json!("retain"));
    obj.insert("experiments".to_string(), json!([experiment_entry]));
    match shape {
        SchemaShape::NestedPermissions | SchemaShape::InlinePermissions => {
            obj.insert("appinfo".to_string(), appinfo);
            obj.insert(
                "chaosServiceAccount".to_string(),
                Value::String(service_account.to_string()),
            );
        }
        SchemaShape::NoPermissions => {
            obj.insert(
                "components".to_string(),
                json!({
                    "appinfo": appinfo,
                    "runner": {"serviceAccount": service_account},
                }),
            );
        }
    }
    let engine_spec = Value::Object(obj);

    json!({
        "apiVersion": CHAOS_API_VERSION,
        "kind": "ChaosEngine",
        "metadata": {
            "name": name,
            "namespace": spec.target.namespace,
            "labels": {
                ENGINE_LABEL: name,
                "app.kubernetes.io/managed-by": "havoc",
            }
        },
        "spec": engine_spec,
    })
}

/// Lifecycle phase reported by the engine's own status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePhase {
    Initialized,
    Running,
    Completed,
    Stopped,
    Other(String),
}

impl EnginePhase {
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "initialized" => Self::Initialized,
            "running" => Self::Running,
            "completed" => Self::Completed,
            "stopped" => Self::Stopped,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Decoded view of an engine payload. Fails closed: a payload missing its
/// identity decodes to [`Self::Unparseable`] rather than being read field
/// by field.
#[derive(Debug, Clone)]
pub enum EngineObservation {
    Engine {
        name: String,
        namespace: String,
        phase: Option<EnginePhase>,
        verdict: Option<String>,
        created_at: Option<DateTime<Utc>>,
    },
    Unparseable {
        reason: String,
    },
}

impl EngineObservation {
    pub fn decode(value: &Value) -> Self {
        let Some(name) = value
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
        else {
            return Self::Unparseable {
                reason: "engine payload has no metadata.name".to_string(),
            };
        };
        let namespace = value
            .get("metadata")
            .and_then(|m| m.get("namespace"))
            .and_then(Value::as_str)
            .unwrap_or("default")
            .to_string();
        let created_at = value
            .get("metadata")
            .and_then(|m| m.get("creationTimestamp"))
            .and_then(Value::as_str)
            .and_then(|ts| ts.parse::<DateTime<Utc>>().ok());
        let status = value.get("status");
        let phase = status
            .and_then(|s| s.get("engineStatus"))
            .and_then(Value::as_str)
            .map(EnginePhase::parse);
        let verdict = status
            .and_then(|s| s.get("experiments"))
            .and_then(|e| e.get(0))
            .and_then(|e| e.get("verdict"))
            .and_then(Value::as_str)
            .map(ToString::to_string);
        Self::Engine {
            name: name.to_string(),
            namespace,
            phase,
            verdict,
            created_at,
        }
    }
}
