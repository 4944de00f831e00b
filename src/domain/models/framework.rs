//! Chaos framework installation state and schema revisions.

use serde::{Deserialize, Serialize};

/// Snapshot of what the chaos framework has installed. Recomputed on
/// demand from the cluster, never persisted or cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaosFrameworkState {
    pub crds_present: bool,
    pub operator_running: bool,
    pub service_account_present: bool,
    pub experiment_definition_present: bool,
}

impl ChaosFrameworkState {
    pub fn is_ready(&self) -> bool {
        self.crds_present
            && self.operator_running
            && self.service_account_present
            && self.experiment_definition_present
    }
}

/// Known shapes of the experiment-definition schema across framework
/// releases. The permissions declaration moved between releases:
/// current releases take a nested list of RBAC rules, older ones a single
/// inline rule map, and the oldest none at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaShape {
    /// `spec.definition.permissions` is a list of RBAC rules.
    NestedPermissions,
    /// `spec.definition.permissions` is a single inline rule map.
    InlinePermissions,
    /// No permissions field at all.
    NoPermissions,
}

impl SchemaShape {
    /// Fixed preference order: newest shape first. Installation attempts
    /// each in turn and stops at the first the cluster accepts.
    pub fn preference_order() -> &'static [Self] {
        &[
            Self::NestedPermissions,
            Self::InlinePermissions,
            Self::NoPermissions,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NestedPermissions => "nested-permissions",
            Self::InlinePermissions => "inline-permissions",
            Self::NoPermissions => "no-permissions",
        }
    }
}
