//! Deployment planning: resource descriptors with a dependency rank.
//!
//! A [`DeploymentPlan`] is built once per deploy attempt from whatever
//! documents the repository yielded, ordered by a fixed kind-precedence
//! table, applied, and discarded.

use std::path::PathBuf;

use serde_json::Value;

use super::manifest;

/// Dependency rank for a resource kind. Lower ranks apply first.
///
/// Namespaces come before everything; policy and quota objects before the
/// config they constrain; secrets and config before storage; storage before
/// identity; identity before workloads; autoscalers last. Unknown kinds land
/// with the workloads so custom resources still apply in a sane position.
pub fn kind_rank(kind: &str) -> u8 {
    match kind {
        "Namespace" => 0,
        "NetworkPolicy" | "PodSecurityPolicy" | "ResourceQuota" | "LimitRange" => 1,
        "Secret" | "ConfigMap" => 2,
        "StorageClass" | "PersistentVolume" | "PersistentVolumeClaim" => 3,
        "ServiceAccount" | "Role" | "ClusterRole" | "RoleBinding" | "ClusterRoleBinding" => 4,
        "HorizontalPodAutoscaler" => 6,
        _ => 5,
    }
}

/// One resource document slated for apply.
#[derive(Debug, Clone)]
pub struct PlannedResource {
    /// File the document came from.
    pub path: PathBuf,
    /// Document index within the file (multi-document YAML).
    pub doc_index: usize,
    pub kind: String,
    pub name: String,
    pub rank: u8,
    pub manifest: Value,
}

/// Ordered set of resources for one deploy attempt.
#[derive(Debug, Clone, Default)]
pub struct DeploymentPlan {
    items: Vec<PlannedResource>,
}

impl DeploymentPlan {
    /// Build a plan from parsed documents, sorted by rank. The sort is
    /// stable, so documents of equal rank keep their source order.
    pub fn build(docs: Vec<(PathBuf, usize, Value)>) -> Self {
        let mut items: Vec<PlannedResource> = docs
            .into_iter()
            .filter(|(_, _, doc)| manifest::is_applyable(doc))
            .map(|(path, doc_index, doc)| {
                let kind = manifest::kind_of(&doc).unwrap_or_default().to_string();
                let name = manifest::name_of(&doc).unwrap_or("unnamed").to_string();
                let rank = kind_rank(&kind);
                PlannedResource {
                    path,
                    doc_index,
                    kind,
                    name,
                    rank,
                    manifest: doc,
                }
            })
            .collect();
        items.sort_by_key(|item| item.rank);
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[PlannedResource] {
        &self.items
    }

    pub fn into_items(self) -> Vec<PlannedResource> {
        self.items
    }
}

/// Outcome of one deploy attempt. Per-file failures are collected, never
/// aborting: partial success is a reported state, not an error.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DeployReport {
    pub applied: usize,
    pub total: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl DeployReport {
    pub fn all_applied(&self) -> bool {
        self.applied == self.total && self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(kind: &str, name: &str) -> Value {
        json!({"apiVersion": "v1", "kind": kind, "metadata": {"name": name}})
    }

    #[test]
    fn test_namespace_first_deployment_after_service() {
        // Submitted in arbitrary order; Namespace must land first and
        // Deployment after Service.
        let docs = vec![
            (PathBuf::from("svc.yaml"), 0, doc("Service", "svc")),
            (PathBuf::from("ns.yaml"), 0, doc("Namespace", "ns")),
            (PathBuf::from("dep.yaml"), 0, doc("Deployment", "dep")),
        ];
        let plan = DeploymentPlan::build(docs);
        let kinds: Vec<&str> = plan.items().iter().map(|i| i.kind.as_str()).collect();
        assert_eq!(kinds[0], "Namespace");
        let svc = kinds.iter().position(|k| *k == "Service").unwrap();
        let dep = kinds.iter().position(|k| *k == "Deployment").unwrap();
        assert!(svc < dep, "Service must apply before Deployment");
    }

    #[test]
    fn test_rank_table_groups() {
        assert!(kind_rank("Namespace") < kind_rank("NetworkPolicy"));
        assert!(kind_rank("NetworkPolicy") < kind_rank("Secret"));
        assert!(kind_rank("ConfigMap") < kind_rank("PersistentVolumeClaim"));
        assert!(kind_rank("PersistentVolumeClaim") < kind_rank("ServiceAccount"));
        assert!(kind_rank("RoleBinding") < kind_rank("Deployment"));
        assert!(kind_rank("Deployment") < kind_rank("HorizontalPodAutoscaler"));
        // Unknown kinds apply with workloads.
        assert_eq!(kind_rank("FooCustomThing"), kind_rank("Deployment"));
    }

    #[test]
    fn test_non_applyable_documents_are_dropped() {
        let docs = vec![
            (PathBuf::from("values.yaml"), 0, json!({"replicas": 3})),
            (PathBuf::from("dep.yaml"), 0, doc("Deployment", "dep")),
        ];
        let plan = DeploymentPlan::build(docs);
        assert_eq!(plan.len(), 1);
    }
}
