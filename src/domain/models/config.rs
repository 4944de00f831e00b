//! Runtime configuration, threaded through constructors.
//!
//! No process-wide option state: the loader builds one [`Config`] and every
//! component receives the slice it needs at construction time.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,
    /// Namespace workloads are deployed into when the repo does not say.
    pub target_namespace: String,
    pub chaos: ChaosDefaults,
    pub installer: InstallerConfig,
    pub poll: PollConfig,
    pub recovery: RecoveryConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            target_namespace: "default".to_string(),
            chaos: ChaosDefaults::default(),
            installer: InstallerConfig::default(),
            poll: PollConfig::default(),
            recovery: RecoveryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Defaults for a run when the caller leaves fields unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaosDefaults {
    /// Wire name of the default experiment type.
    pub experiment: String,
    pub duration_secs: u64,
}

impl Default for ChaosDefaults {
    fn default() -> Self {
        Self {
            experiment: "pod-delete".to_string(),
            duration_secs: 30,
        }
    }
}

/// Where the framework operator comes from and where it lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Authoritative published operator manifest, tried first. Install
    /// falls back to the bundled equivalent when this cannot be fetched
    /// or applied.
    pub operator_manifest_url: String,
    /// Namespace the operator runs in.
    pub framework_namespace: String,
    /// Service account granted to experiment runners.
    pub service_account: String,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            operator_manifest_url:
                "https://litmuschaos.github.io/litmus/litmus-operator-v3.0.0.yaml".to_string(),
            framework_namespace: "litmus".to_string(),
            service_account: "havoc-chaos-admin".to_string(),
        }
    }
}

/// Bounds for every wait in the orchestrator. Nothing blocks indefinitely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Attempts when hunting for the execution pod.
    pub pod_attempts: u32,
    /// Fixed backoff between pod-hunt attempts, in seconds.
    pub pod_backoff_secs: u64,
    /// Timeout for the post-chaos target-pods-ready wait.
    pub ready_timeout_secs: u64,
    /// Settle buffer after the chaos window for pod-level experiments.
    pub settle_buffer_secs: u64,
    /// Longer settle buffer for node/IO experiments.
    pub node_settle_buffer_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            pod_attempts: 12,
            pod_backoff_secs: 5,
            ready_timeout_secs: 120,
            settle_buffer_secs: 30,
            node_settle_buffer_secs: 90,
        }
    }
}

/// Stuck-engine detection and remediation knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Seconds an engine may sit in its initial phase before it is stuck.
    pub stuck_threshold_secs: u64,
    /// When true, detection is composed with remediation; otherwise
    /// detection runs dry.
    pub auto_recover: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            stuck_threshold_secs: super::recovery::DEFAULT_STUCK_THRESHOLD_SECS,
            auto_recover: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json` or `pretty`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
