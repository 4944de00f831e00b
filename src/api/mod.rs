//! HTTP surface: one endpoint to run an experiment, plus health and
//! stuck-engine operations.

pub mod model;
pub mod routes;
pub mod server;

pub use model::{ChaosTestRequest, ChaosTestResponse};
pub use routes::router;
pub use server::run_server;
