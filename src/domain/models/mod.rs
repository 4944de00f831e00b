//! Domain models for the chaos orchestration engine.

pub mod config;
pub mod engine;
pub mod experiment;
pub mod framework;
pub mod manifest;
pub mod plan;
pub mod recovery;
pub mod result;
pub mod target;

pub use config::{
    ChaosDefaults, Config, InstallerConfig, LoggingConfig, PollConfig, RecoveryConfig,
};
pub use engine::{
    build_engine, engine_name, EngineObservation, EnginePhase, CHAOS_API_VERSION, ENGINE_LABEL,
};
pub use experiment::{ChaosExperimentSpec, ChaosExperimentType};
pub use framework::{ChaosFrameworkState, SchemaShape};
pub use plan::{kind_rank, DeployReport, DeploymentPlan, PlannedResource};
pub use recovery::{
    RecoveryOutcome, StuckDiagnostics, StuckExperimentRecord, DEFAULT_STUCK_THRESHOLD_SECS,
};
pub use result::{ChaosResult, ResultObservation, ResultSource, Verdict};
pub use target::{TargetWorkload, WorkloadView};
