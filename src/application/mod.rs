//! Application layer: the end-to-end pipeline behind the HTTP surface.

pub mod pipeline;

pub use pipeline::{ChaosPipeline, ChaosRunReport, ChaosRunRequest};
