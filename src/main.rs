//! fnhost binary: configure from the environment, load the handler once and
//! serve it.

use fnhost::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match HostConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!("Starting fnhost...");
    let server = HostServer::from_config(config)?;
    tracing::info!("Handler kind: {:?}", server.state().handler_kind());

    server.run().await
}
