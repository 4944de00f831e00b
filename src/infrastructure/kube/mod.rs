//! Kubernetes control-plane adapter.

pub mod client;
pub mod resources;

pub use client::KubeClusterClient;
