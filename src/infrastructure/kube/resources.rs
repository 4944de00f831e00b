//! Typed resource builders.
//!
//! Everything the engine creates itself (as opposed to what a target repo
//! ships) is built from typed structs and serialized through one encoder;
//! no string-templated YAML anywhere.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, Namespace, PodSpec, PodTemplateSpec, Service, ServiceAccount,
    ServicePort, ServiceSpec,
};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde_json::Value;

use crate::domain::errors::ClusterError;

/// Name of the bundled minimal fallback workload.
pub const FALLBACK_NAME: &str = "havoc-fallback";

/// Label key/value identifying fallback pods.
pub const FALLBACK_LABEL: (&str, &str) = ("app", FALLBACK_NAME);

/// Serialize a typed resource to a full manifest, restoring the
/// `apiVersion`/`kind` pair the typed encoding leaves implicit.
pub fn to_manifest<K>(resource: &K) -> Result<Value, ClusterError>
where
    K: k8s_openapi::Resource + serde::Serialize,
{
    let mut value =
        serde_json::to_value(resource).map_err(|err| ClusterError::Unparseable(err.to_string()))?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "apiVersion".to_string(),
            Value::String(K::API_VERSION.to_string()),
        );
        obj.insert("kind".to_string(), Value::String(K::KIND.to_string()));
    }
    Ok(value)
}

fn fallback_labels() -> std::collections::BTreeMap<String, String> {
    let (k, v) = FALLBACK_LABEL;
    std::collections::BTreeMap::from([(k.to_string(), v.to_string())])
}

/// Bare namespace object.
pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        },
        ..Namespace::default()
    }
}

/// The bundled minimal fallback workload: two nginx replicas, enough to
/// give pod-level chaos something to kill and still have a survivor.
pub fn fallback_deployment(namespace: &str) -> Deployment {
    let labels = fallback_labels();
    Deployment {
        metadata: ObjectMeta {
            name: Some(FALLBACK_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(2),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "nginx".to_string(),
                        image: Some("nginx:1.27-alpine".to_string()),
                        ports: Some(vec![ContainerPort {
                            container_port: 80,
                            ..ContainerPort::default()
                        }]),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}

/// ClusterIP service fronting the fallback workload.
pub fn fallback_service(namespace: &str) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(FALLBACK_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(fallback_labels()),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(fallback_labels()),
            ports: Some(vec![ServicePort {
                port: 80,
                target_port: Some(IntOrString::Int(80)),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}

/// Service account experiment runners execute under.
pub fn chaos_service_account(name: &str, namespace: &str) -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        ..ServiceAccount::default()
    }
}

/// Fixed permission set for experiment runners: CRUD on pods, jobs, and
/// the framework resources; read on workload controllers and nodes.
pub fn chaos_cluster_role(name: &str) -> ClusterRole {
    let crud = vec![
        "create".to_string(),
        "delete".to_string(),
        "get".to_string(),
        "list".to_string(),
        "patch".to_string(),
        "update".to_string(),
        "watch".to_string(),
        "deletecollection".to_string(),
    ];
    let read = vec!["get".to_string(), "list".to_string(), "watch".to_string()];
    ClusterRole {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        },
        rules: Some(vec![
            PolicyRule {
                api_groups: Some(vec![String::new()]),
                resources: Some(vec![
                    "pods".to_string(),
                    "pods/log".to_string(),
                    "pods/exec".to_string(),
                    "events".to_string(),
                    "configmaps".to_string(),
                ]),
                verbs: crud.clone(),
                ..PolicyRule::default()
            },
            PolicyRule {
                api_groups: Some(vec!["batch".to_string()]),
                resources: Some(vec!["jobs".to_string()]),
                verbs: crud.clone(),
                ..PolicyRule::default()
            },
            PolicyRule {
                api_groups: Some(vec!["litmuschaos.io".to_string()]),
                resources: Some(vec![
                    "chaosengines".to_string(),
                    "chaosexperiments".to_string(),
                    "chaosresults".to_string(),
                ]),
                verbs: crud,
                ..PolicyRule::default()
            },
            PolicyRule {
                api_groups: Some(vec!["apps".to_string()]),
                resources: Some(vec![
                    "deployments".to_string(),
                    "statefulsets".to_string(),
                    "daemonsets".to_string(),
                    "replicasets".to_string(),
                ]),
                verbs: read.clone(),
                ..PolicyRule::default()
            },
            PolicyRule {
                api_groups: Some(vec![String::new()]),
                resources: Some(vec!["nodes".to_string()]),
                verbs: read,
                ..PolicyRule::default()
            },
        ]),
        ..ClusterRole::default()
    }
}

/// Cluster-scoped binding of the runner role to the namespaced account.
pub fn chaos_cluster_role_binding(name: &str, namespace: &str) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(format!("{name}-{namespace}")),
            ..ObjectMeta::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: name.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
            ..Subject::default()
        }]),
    }
}
