//! Target workload domain model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The workload a chaos experiment attacks.
///
/// The selector is always read from the workload's own spec
/// (`spec.selector.matchLabels`), never guessed from naming conventions.
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetWorkload {
    pub name: String,
    pub namespace: String,
    /// The workload's true pod label selector.
    pub selector: BTreeMap<String, String>,
}

impl TargetWorkload {
    /// Render the selector as a `k=v,k2=v2` label-selector string.
    pub fn selector_string(&self) -> String {
        self.selector
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// The single label the chaos framework uses to match app pods. Falls
    /// back to the full selector string when the workload carries more than
    /// one label.
    pub fn app_label(&self) -> String {
        match self.selector.iter().next() {
            Some((k, v)) if self.selector.len() == 1 => format!("{k}={v}"),
            _ => self.selector_string(),
        }
    }
}

/// Decoded view of a Deployment payload returned by the control plane.
///
/// The control plane hands back loosely-typed JSON; this decodes exactly the
/// fields the selector logic needs and fails closed with [`Self::Unparseable`]
/// instead of reading undefined fields.
#[derive(Debug, Clone)]
pub enum WorkloadView {
    Deployment {
        name: String,
        namespace: String,
        match_labels: BTreeMap<String, String>,
        metadata_labels: BTreeMap<String, String>,
    },
    Unparseable {
        reason: String,
    },
}

impl WorkloadView {
    pub fn decode(value: &Value) -> Self {
        #[derive(Deserialize)]
        struct Raw {
            metadata: RawMeta,
            #[serde(default)]
            spec: RawSpec,
        }
        #[derive(Deserialize)]
        struct RawMeta {
            name: String,
            #[serde(default)]
            namespace: Option<String>,
            #[serde(default)]
            labels: BTreeMap<String, String>,
        }
        #[derive(Deserialize, Default)]
        struct RawSpec {
            #[serde(default)]
            selector: RawSelector,
        }
        #[derive(Deserialize, Default)]
        struct RawSelector {
            #[serde(rename = "matchLabels", default)]
            match_labels: BTreeMap<String, String>,
        }

        match serde_json::from_value::<Raw>(value.clone()) {
            Ok(raw) => Self::Deployment {
                name: raw.metadata.name,
                namespace: raw
                    .metadata
                    .namespace
                    .unwrap_or_else(|| "default".to_string()),
                match_labels: raw.spec.selector.match_labels,
                metadata_labels: raw.metadata.labels,
            },
            Err(err) => Self::Unparseable {
                reason: err.to_string(),
            },
        }
    }

    /// Resolve into a [`TargetWorkload`], preferring `matchLabels` and
    /// falling back to metadata labels. A workload with neither, or an
    /// unparseable payload, yields `None` and is skipped by callers.
    pub fn into_target(self) -> Option<TargetWorkload> {
        match self {
            Self::Deployment {
                name,
                namespace,
                match_labels,
                metadata_labels,
            } => {
                let selector = if match_labels.is_empty() {
                    metadata_labels
                } else {
                    match_labels
                };
                if selector.is_empty() {
                    return None;
                }
                Some(TargetWorkload {
                    name,
                    namespace,
                    selector,
                })
            }
            Self::Unparseable { .. } => None,
        }
    }
}
