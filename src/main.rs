use std::sync::Arc;

use thingsdb_secrets::{
    api::start_api_server,
    backend::Backend,
    observability::{init_observability, log_config_info},
    storage::open_storage,
    thingsdb::ThingsDbConnector,
    Config, Result, APP_NAME, VERSION,
};
use tracing::{error, info};

fn install_rustls_provider() {
    use rustls::crypto::{ring, CryptoProvider};

    if CryptoProvider::get_default().is_none() {
        let _ = ring::default_provider().install_default();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    install_rustls_provider();

    // Load .env file if it exists (optional - won't fail if missing)
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let config = Config::from_env()?;
    init_observability(&config.observability)?;

    info!(app_name = APP_NAME, version = VERSION, "Starting ThingsDB secrets engine");
    log_config_info(&config);

    let storage = open_storage(&config.storage).await?;
    let connector = Arc::new(ThingsDbConnector::new(config.thingsdb.timeout()));
    let backend = Arc::new(Backend::new(storage, connector));

    if let Err(e) = start_api_server(config.api.clone(), backend).await {
        error!(error = %e, "API server terminated with an error");
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}
