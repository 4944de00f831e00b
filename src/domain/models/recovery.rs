//! Stuck-experiment records and recovery outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How long an engine may sit in its initial phase before it counts as
/// stuck: five minutes from creation.
pub const DEFAULT_STUCK_THRESHOLD_SECS: u64 = 300;

/// Diagnostics gathered when an engine is first seen stuck.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StuckDiagnostics {
    pub service_account_present: bool,
    pub can_create_pods: bool,
    pub can_access_nodes: bool,
    pub engine_phase: String,
}

/// One wedged engine: identity, when detection first saw it stuck, and a
/// diagnostics snapshot. Created by detection, consumed by recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StuckExperimentRecord {
    pub engine_name: String,
    pub namespace: String,
    pub created_at: Option<DateTime<Utc>>,
    pub first_seen_stuck: DateTime<Utc>,
    pub diagnostics: StuckDiagnostics,
}

/// Outcome of one recovery attempt. `success` reflects only whether the
/// terminal engine delete was attempted without a hard error; the other
/// steps report through `actions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryOutcome {
    pub success: bool,
    pub message: String,
    pub actions: Vec<String>,
}
