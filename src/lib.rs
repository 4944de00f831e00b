//! Havoc - Kubernetes chaos orchestration and recovery engine
//!
//! Havoc takes an application repository, stands it up on a cluster,
//! installs a fault-injection framework, runs a bounded chaos experiment
//! against a selected workload, and resolves an honest verdict even when
//! the framework's own reporting is unreliable. Engines that wedge during
//! startup are detected and cleaned up.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Experiment, target, engine, and result models
//! - **Service Layer** (`services`): Deploy, install, orchestrate, recover
//! - **Application Layer** (`application`): The end-to-end pipeline
//! - **Infrastructure Layer** (`infrastructure`): Cluster client, git, helm, config
//! - **API Layer** (`api`): The HTTP surface
//!
//! # Example
//!
//! ```ignore
//! use havoc::application::ChaosPipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Build the pipeline and serve it
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{ChaosPipeline, ChaosRunReport, ChaosRunRequest};
pub use domain::errors::{ClusterError, HavocError, HavocResult, Severity, Stage};
pub use domain::models::{
    ChaosExperimentSpec, ChaosExperimentType, ChaosFrameworkState, ChaosResult, Config,
    DeployReport, ResultSource, SchemaShape, TargetWorkload, Verdict,
};
pub use domain::ports::{ChartInstaller, ClusterClient, OverlayBuilder, RepoFetcher, ResourceKind};
pub use infrastructure::{ConfigError, ConfigLoader, KubeClusterClient};
pub use services::{
    ChaosOrchestrator, FrameworkInstaller, ManifestDeployer, RecoveryService, TargetSelector,
};
