//! Shared helpers for loosely-typed manifest JSON.

use serde::Deserialize;
use serde_json::Value;

/// Split a multi-document YAML string into JSON values, dropping empty
/// documents. Documents that fail to parse are returned as errors alongside
/// the ones that parsed, so a bad document never sinks the whole stream.
pub fn split_manifests(yaml: &str) -> (Vec<Value>, Vec<String>) {
    let mut docs = Vec::new();
    let mut errors = Vec::new();
    for (idx, de) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
        match Value::deserialize(de) {
            Ok(Value::Null) => {}
            Ok(value) => docs.push(value),
            Err(err) => errors.push(format!("document {idx}: {err}")),
        }
    }
    (docs, errors)
}

/// `kind` of a manifest, if present.
pub fn kind_of(manifest: &Value) -> Option<&str> {
    manifest.get("kind").and_then(Value::as_str)
}

/// `metadata.name` of a manifest, if present.
pub fn name_of(manifest: &Value) -> Option<&str> {
    manifest
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
}

/// `metadata.namespace` of a manifest, if present.
pub fn namespace_of(manifest: &Value) -> Option<&str> {
    manifest
        .get("metadata")
        .and_then(|m| m.get("namespace"))
        .and_then(Value::as_str)
}

/// True when a document looks like an applyable Kubernetes resource:
/// it carries both `apiVersion` and `kind`.
pub fn is_applyable(manifest: &Value) -> bool {
    manifest.get("apiVersion").and_then(Value::as_str).is_some() && kind_of(manifest).is_some()
}

/// Set `metadata.namespace` when the manifest does not already carry one.
pub fn default_namespace(manifest: &mut Value, namespace: &str) {
    if namespace_of(manifest).is_some() {
        return;
    }
    if let Some(meta) = manifest.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.insert(
            "namespace".to_string(),
            Value::String(namespace.to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_multi_document() {
        let yaml = "apiVersion: v1\nkind: Service\nmetadata:\n  name: a\n---\napiVersion: v1\nkind: Pod\nmetadata:\n  name: b\n---\n";
        let (docs, errors) = split_manifests(yaml);
        assert_eq!(docs.len(), 2);
        assert!(errors.is_empty());
        assert_eq!(kind_of(&docs[1]), Some("Pod"));
    }

    #[test]
    fn test_bad_document_does_not_sink_stream() {
        let yaml = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: ok\n---\n{ not yaml: [\n";
        let (docs, errors) = split_manifests(yaml);
        assert_eq!(docs.len(), 1);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_default_namespace_preserves_existing() {
        let mut m = serde_json::json!({"metadata": {"name": "x", "namespace": "keep"}});
        default_namespace(&mut m, "other");
        assert_eq!(namespace_of(&m), Some("keep"));

        let mut m = serde_json::json!({"metadata": {"name": "x"}});
        default_namespace(&mut m, "filled");
        assert_eq!(namespace_of(&m), Some("filled"));
    }
}
