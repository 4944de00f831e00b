//! Service layer: the orchestration logic between the domain model and
//! the cluster.

pub mod deployer;
pub mod installer;
pub mod orchestrator;
pub mod recovery;
pub mod target;

pub use deployer::{DeployStrategy, ManifestDeployer};
pub use installer::FrameworkInstaller;
pub use orchestrator::ChaosOrchestrator;
pub use recovery::RecoveryService;
pub use target::TargetSelector;
