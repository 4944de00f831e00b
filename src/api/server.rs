use std::sync::Arc;

use axum::serve;
use tokio::net::TcpListener;
use tracing::info;

use crate::application::ChaosPipeline;
use crate::domain::errors::HavocError;

use super::routes::router;

pub async fn run_server(bind_addr: &str, pipeline: Arc<ChaosPipeline>) -> Result<(), HavocError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|err| HavocError::Config(format!("bind {bind_addr}: {err}")))?;
    info!(addr = bind_addr, "listening");
    serve(listener, router(pipeline))
        .await
        .map_err(|err| HavocError::Config(format!("server: {err}")))?;
    Ok(())
}
