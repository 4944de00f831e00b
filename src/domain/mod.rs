//! Domain layer: models, ports, and the error taxonomy.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{ClusterError, HavocError, HavocResult, Severity, Stage};
pub use ports::{
    ChartInstaller, ClusterClient, DeleteOutcome, OverlayBuilder, RepoFetcher, ResourceKind,
};
