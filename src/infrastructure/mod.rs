//! Infrastructure layer: external integrations and the ambient stack.

pub mod config;
pub mod kube;
pub mod logging;
pub mod packaging;
pub mod repo;
pub mod retry;

pub use config::{ConfigError, ConfigLoader};
pub use kube::KubeClusterClient;
pub use retry::PollPolicy;
