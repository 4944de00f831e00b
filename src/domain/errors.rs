//! Error taxonomy for the chaos orchestration engine.
//!
//! Three severities, explicit rather than exception-driven:
//! - **Fatal** setup errors abort the run and surface to the caller.
//! - **Recoverable** installation errors are retried through fallbacks and
//!   only become fatal when exhausted.
//! - **Diagnostic** conditions (no result found, pods slow to recover) are
//!   absorbed into `ChaosResult::diagnostics` and never raised as errors.

use thiserror::Error;

/// User-facing pipeline stage an error is classified into, so callers can
/// distinguish "nothing was attacked" from "attack ran, reporting
/// incomplete".
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    ManifestDetection,
    TargetDetection,
    RepoClone,
    ClusterSetup,
    Deployment,
    ChaosExecution,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManifestDetection => "manifest-detection",
            Self::TargetDetection => "target-detection",
            Self::RepoClone => "repository-cloning",
            Self::ClusterSetup => "cluster-setup",
            Self::Deployment => "deployment",
            Self::ChaosExecution => "chaos-execution",
        }
    }
}

/// How bad an error is. Drives caller behavior: abort, retry, or record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fatal,
    Recoverable,
    Diagnostic,
}

/// Errors from the cluster control-plane client.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("cluster connection failed: {0}")]
    Connection(String),

    #[error("cluster API error: {0}")]
    Api(String),

    #[error("manifest rejected by validation: {0}")]
    Validation(String),

    #[error("unparseable resource payload: {0}")]
    Unparseable(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),
}

/// Top-level error for the orchestration pipeline.
#[derive(Debug, Error)]
pub enum HavocError {
    #[error("cluster unreachable: {0}")]
    ClusterUnreachable(String),

    #[error("repository clone failed: {0}")]
    RepoClone(String),

    #[error("no eligible deployment strategy: {0}")]
    NoDeployStrategy(String),

    #[error("target workload not found: {name} in namespace {namespace}")]
    TargetNotFound { name: String, namespace: String },

    #[error("deployment failed: {0}")]
    Deployment(String),

    #[error("chaos framework installation exhausted all fallbacks: {0}")]
    InstallExhausted(String),

    #[error("service account provisioning failed: {0}")]
    ServiceAccount(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

impl HavocError {
    /// Classify into the user-facing stage.
    pub fn stage(&self) -> Stage {
        match self {
            Self::ClusterUnreachable(_) => Stage::ClusterSetup,
            Self::RepoClone(_) => Stage::RepoClone,
            Self::NoDeployStrategy(_) => Stage::ManifestDetection,
            Self::TargetNotFound { .. } => Stage::TargetDetection,
            Self::Deployment(_) => Stage::Deployment,
            Self::InstallExhausted(_) | Self::ServiceAccount(_) => Stage::ChaosExecution,
            Self::Config(_) | Self::Cluster(_) => Stage::ClusterSetup,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::ClusterUnreachable(_)
            | Self::RepoClone(_)
            | Self::NoDeployStrategy(_)
            | Self::TargetNotFound { .. }
            | Self::InstallExhausted(_)
            | Self::ServiceAccount(_)
            | Self::Config(_) => Severity::Fatal,
            Self::Deployment(_) | Self::Cluster(_) => Severity::Recoverable,
        }
    }
}

pub type HavocResult<T> = Result<T, HavocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_classification() {
        assert_eq!(
            HavocError::RepoClone("x".into()).stage(),
            Stage::RepoClone
        );
        assert_eq!(
            HavocError::NoDeployStrategy("x".into()).stage(),
            Stage::ManifestDetection
        );
        assert_eq!(
            HavocError::InstallExhausted("x".into()).stage(),
            Stage::ChaosExecution
        );
        assert_eq!(
            HavocError::TargetNotFound {
                name: "a".into(),
                namespace: "b".into()
            }
            .stage(),
            Stage::TargetDetection
        );
    }

    #[test]
    fn test_setup_errors_are_fatal() {
        assert_eq!(
            HavocError::ClusterUnreachable("x".into()).severity(),
            Severity::Fatal
        );
        assert_eq!(
            HavocError::Deployment("partial".into()).severity(),
            Severity::Recoverable
        );
    }
}
