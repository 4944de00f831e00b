//! Chaos experiment domain model.
//!
//! A [`ChaosExperimentSpec`] is immutable per run: the experiment type, the
//! workload under attack, the bounded duration, and any caller-supplied
//! parameter overrides. Everything derived from it (engine name, env list,
//! settle buffer) is computed, never stored.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::target::TargetWorkload;

/// The fault classes the engine knows how to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChaosExperimentType {
    PodDelete,
    ContainerKill,
    DiskFill,
    NodeIoStress,
    NetworkLatency,
    NetworkLoss,
    NetworkCorruption,
}

impl ChaosExperimentType {
    /// Wire name as it appears in the experiment definition and engine spec.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::PodDelete => "pod-delete",
            Self::ContainerKill => "container-kill",
            Self::DiskFill => "disk-fill",
            Self::NodeIoStress => "node-io-stress",
            Self::NetworkLatency => "network-latency",
            Self::NetworkLoss => "network-loss",
            Self::NetworkCorruption => "network-corruption",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pod-delete" => Some(Self::PodDelete),
            "container-kill" => Some(Self::ContainerKill),
            "disk-fill" => Some(Self::DiskFill),
            "node-io-stress" => Some(Self::NodeIoStress),
            "network-latency" => Some(Self::NetworkLatency),
            "network-loss" => Some(Self::NetworkLoss),
            "network-corruption" => Some(Self::NetworkCorruption),
            _ => None,
        }
    }

    /// All known experiment types, in a stable order.
    pub fn all() -> &'static [Self] {
        &[
            Self::PodDelete,
            Self::ContainerKill,
            Self::DiskFill,
            Self::NodeIoStress,
            Self::NetworkLatency,
            Self::NetworkLoss,
            Self::NetworkCorruption,
        ]
    }

    /// Node and IO experiments inject at the node level and take longer to
    /// settle after the chaos window closes.
    pub fn is_node_level(&self) -> bool {
        matches!(self, Self::DiskFill | Self::NodeIoStress)
    }

    /// Type-specific environment entries beyond the shared tuning set.
    pub fn extra_env(&self) -> Vec<(&'static str, &'static str)> {
        match self {
            Self::PodDelete => vec![],
            Self::ContainerKill => vec![
                ("CONTAINER_RUNTIME", "containerd"),
                ("SOCKET_PATH", "/run/containerd/containerd.sock"),
            ],
            Self::DiskFill => vec![("FILL_PERCENTAGE", "80")],
            Self::NodeIoStress => {
                vec![("FILESYSTEM_UTILIZATION_PERCENTAGE", "10"), ("CPU", "1")]
            }
            Self::NetworkLatency => vec![("NETWORK_LATENCY", "2000")],
            Self::NetworkLoss => vec![("PACKET_LOSS_PERCENTAGE", "100")],
            Self::NetworkCorruption => {
                vec![("NETWORK_PACKET_CORRUPTION_PERCENTAGE", "100")]
            }
        }
    }
}

impl std::fmt::Display for ChaosExperimentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// One run's worth of chaos, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaosExperimentSpec {
    pub experiment: ChaosExperimentType,
    pub target: TargetWorkload,
    /// Chaos window length in seconds.
    pub duration_secs: u64,
    /// Caller-supplied env overrides, merged over the fixed tuning set.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl ChaosExperimentSpec {
    pub fn new(experiment: ChaosExperimentType, target: TargetWorkload, duration_secs: u64) -> Self {
        Self {
            experiment,
            target,
            duration_secs,
            params: BTreeMap::new(),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_name_round_trip() {
        for ty in ChaosExperimentType::all() {
            assert_eq!(ChaosExperimentType::from_str(ty.wire_name()), Some(*ty));
        }
        assert_eq!(
            ChaosExperimentType::from_str("POD-DELETE"),
            Some(ChaosExperimentType::PodDelete)
        );
        assert_eq!(ChaosExperimentType::from_str("cpu-hog"), None);
    }

    #[test]
    fn test_node_level_classification() {
        assert!(ChaosExperimentType::DiskFill.is_node_level());
        assert!(ChaosExperimentType::NodeIoStress.is_node_level());
        assert!(!ChaosExperimentType::PodDelete.is_node_level());
        assert!(!ChaosExperimentType::NetworkLatency.is_node_level());
    }

    #[test]
    fn test_container_kill_carries_runtime_socket() {
        let env = ChaosExperimentType::ContainerKill.extra_env();
        assert!(env.iter().any(|(k, _)| *k == "SOCKET_PATH"));
    }
}
