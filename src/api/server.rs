use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{backend::Backend, config::ApiServerConfig, errors::Error};

use super::routes::build_router;

pub async fn start_api_server(config: ApiServerConfig, backend: Arc<Backend>) -> crate::Result<()> {
    let addr: SocketAddr = config
        .socket_address()
        .parse()
        .map_err(|e| Error::config(format!("Invalid API address: {}", e)))?;

    let listener = TcpListener::bind(addr).await.map_err(|e| Error::Io {
        source: e,
        context: format!("Failed to bind API server on {}", addr),
    })?;

    info!(address = %addr, "Starting HTTP API server");
    serve(listener, backend).await?;

    info!("API server shutdown completed");
    Ok(())
}

/// Serve the router on an already bound listener until Ctrl-C.
pub async fn serve(listener: TcpListener, backend: Arc<Backend>) -> crate::Result<()> {
    axum::serve(listener, build_router(backend))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "API server shutdown listener failed");
            }
        })
        .await
        .map_err(|e| Error::Io { source: e, context: "API server error".to_string() })
}
