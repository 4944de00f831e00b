//! Bundled chaos-framework manifests.
//!
//! Used when the published operator bundle cannot be fetched: a minimal
//! but functional set of framework CRDs plus the operator workload, and
//! the experiment-definition builders for every known schema revision.

use serde_json::{json, Value};

use crate::domain::models::engine::CHAOS_API_VERSION;
use crate::domain::models::experiment::ChaosExperimentType;
use crate::domain::models::framework::SchemaShape;

/// Operator image pinned to the same release as the published bundle URL.
const OPERATOR_IMAGE: &str = "litmuschaos/chaos-operator:3.0.0";
const RUNNER_IMAGE: &str = "litmuschaos/chaos-runner:3.0.0";
const EXPERIMENT_IMAGE: &str = "litmuschaos/go-runner:3.0.0";

/// Name the operator deployment carries in the published bundle.
pub const OPERATOR_DEPLOYMENT: &str = "chaos-operator-ce";

fn crd(plural: &str, kind: &str, list_kind: &str) -> Value {
    // Open schemas: the framework's own CRDs preserve unknown fields, and
    // the schema-shape probing depends on the server accepting whichever
    // revision we send.
    json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": {"name": format!("{plural}.litmuschaos.io")},
        "spec": {
            "group": "litmuschaos.io",
            "names": {
                "kind": kind,
                "listKind": list_kind,
                "plural": plural,
                "singular": kind.to_lowercase(),
            },
            "scope": "Namespaced",
            "versions": [{
                "name": "v1alpha1",
                "served": true,
                "storage": true,
                "schema": {
                    "openAPIV3Schema": {
                        "type": "object",
                        "x-kubernetes-preserve-unknown-fields": true,
                    }
                },
                "subresources": {"status": {}},
            }],
        },
    })
}

/// The three framework CRDs, wide open on schema.
pub fn framework_crds() -> Vec<Value> {
    vec![
        crd("chaosengines", "ChaosEngine", "ChaosEngineList"),
        crd("chaosexperiments", "ChaosExperiment", "ChaosExperimentList"),
        crd("chaosresults", "ChaosResult", "ChaosResultList"),
    ]
}

/// Operator workload and its identity, scoped to the framework namespace.
pub fn operator_manifests(framework_namespace: &str) -> Vec<Value> {
    let sa_name = "litmus";
    vec![
        json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {"name": framework_namespace},
        }),
        json!({
            "apiVersion": "v1",
            "kind": "ServiceAccount",
            "metadata": {"name": sa_name, "namespace": framework_namespace},
        }),
        json!({
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "ClusterRole",
            "metadata": {"name": "litmus"},
            "rules": [
                {
                    "apiGroups": ["", "apps", "batch", "litmuschaos.io"],
                    "resources": ["*"],
                    "verbs": ["*"],
                },
                {
                    "apiGroups": ["apiextensions.k8s.io"],
                    "resources": ["customresourcedefinitions"],
                    "verbs": ["get", "list"],
                },
            ],
        }),
        json!({
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "ClusterRoleBinding",
            "metadata": {"name": "litmus"},
            "roleRef": {
                "apiGroup": "rbac.authorization.k8s.io",
                "kind": "ClusterRole",
                "name": "litmus",
            },
            "subjects": [{
                "kind": "ServiceAccount",
                "name": sa_name,
                "namespace": framework_namespace,
            }],
        }),
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": OPERATOR_DEPLOYMENT,
                "namespace": framework_namespace,
                "labels": {"name": "chaos-operator"},
            },
            "spec": {
                "replicas": 1,
                "selector": {"matchLabels": {"name": "chaos-operator"}},
                "template": {
                    "metadata": {"labels": {"name": "chaos-operator"}},
                    "spec": {
                        "serviceAccountName": sa_name,
                        "containers": [{
                            "name": "chaos-operator",
                            "image": OPERATOR_IMAGE,
                            "command": ["chaos-operator"],
                            "args": ["-leader-elect=true"],
                            "env": [
                                {"name": "CHAOS_RUNNER_IMAGE", "value": RUNNER_IMAGE},
                                {"name": "WATCH_NAMESPACE", "value": ""},
                                {"name": "POD_NAME", "valueFrom": {
                                    "fieldRef": {"fieldPath": "metadata.name"}
                                }},
                                {"name": "POD_NAMESPACE", "valueFrom": {
                                    "fieldRef": {"fieldPath": "metadata.namespace"}
                                }},
                                {"name": "OPERATOR_NAME", "value": "chaos-operator"},
                            ],
                            "resources": {
                                "requests": {"cpu": "125m", "memory": "300Mi"},
                                "limits": {"cpu": "500m", "memory": "512Mi"},
                            },
                        }],
                    },
                },
            },
        }),
    ]
}

/// RBAC rules the experiment runner needs, as (apiGroups, resources, verbs).
fn experiment_rules() -> Vec<(Vec<&'static str>, Vec<&'static str>, Vec<&'static str>)> {
    vec![
        (
            vec![""],
            vec!["pods", "events", "pods/log", "pods/exec", "configmaps"],
            vec!["create", "list", "get", "patch", "update", "delete", "deletecollection"],
        ),
        (
            vec!["batch"],
            vec!["jobs"],
            vec!["create", "list", "get", "delete", "deletecollection"],
        ),
        (
            vec!["apps"],
            vec!["deployments", "statefulsets", "replicasets", "daemonsets"],
            vec!["list", "get"],
        ),
        (vec![""], vec!["nodes"], vec!["list", "get", "patch", "update"]),
        (
            vec!["litmuschaos.io"],
            vec!["chaosengines", "chaosexperiments", "chaosresults"],
            vec!["create", "list", "get", "patch", "update"],
        ),
    ]
}

fn rule_value(groups: &[&str], resources: &[&str], verbs: &[&str]) -> Value {
    json!({"apiGroups": groups, "resources": resources, "verbs": verbs})
}

/// Build the experiment-definition manifest for one schema revision.
///
/// The body is identical across revisions; only the permissions
/// declaration moves. Nested takes the full rule list, inline flattens
/// everything into one rule, and the oldest revision declares nothing.
pub fn experiment_definition(
    experiment: ChaosExperimentType,
    namespace: &str,
    shape: SchemaShape,
) -> Value {
    let wire = experiment.wire_name();
    let mut definition = json!({
        "scope": "Namespaced",
        "image": EXPERIMENT_IMAGE,
        "imagePullPolicy": "Always",
        "args": ["-c", format!("./experiments -name {wire}")],
        "command": ["/bin/bash"],
        "env": [
            {"name": "TOTAL_CHAOS_DURATION", "value": "30"},
            {"name": "CHAOS_INTERVAL", "value": "10"},
            {"name": "LIB", "value": "litmus"},
        ],
        "labels": {
            "name": wire,
            "app.kubernetes.io/part-of": "litmus",
        },
    });
    match shape {
        SchemaShape::NestedPermissions => {
            let rules: Vec<Value> = experiment_rules()
                .iter()
                .map(|(g, r, v)| rule_value(g, r, v))
                .collect();
            definition["permissions"] = Value::Array(rules);
        }
        SchemaShape::InlinePermissions => {
            let mut groups = Vec::new();
            let mut resources = Vec::new();
            let mut verbs = Vec::new();
            for (g, r, v) in experiment_rules() {
                for item in g {
                    if !groups.contains(&item) {
                        groups.push(item);
                    }
                }
                for item in r {
                    if !resources.contains(&item) {
                        resources.push(item);
                    }
                }
                for item in v {
                    if !verbs.contains(&item) {
                        verbs.push(item);
                    }
                }
            }
            definition["permissions"] = rule_value(&groups, &resources, &verbs);
        }
        SchemaShape::NoPermissions => {}
    }

    json!({
        "apiVersion": CHAOS_API_VERSION,
        "kind": "ChaosExperiment",
        "metadata": {
            "name": wire,
            "namespace": namespace,
            "labels": {
                "name": wire,
                "app.kubernetes.io/part-of": "litmus",
            },
        },
        "spec": {"definition": definition},
    })
}
