use anyhow::Result;
use std::sync::Arc;

use sheet_insights::{
    config, logging, routes,
    services::{auth::FirebaseAuthenticator, db_loader::SqliteWarehouse},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging()?;

    // Load configuration
    let config = config::load_config()?;

    // External collaborators
    let authenticator = Arc::new(FirebaseAuthenticator::new(
        &config.firebase_auth_url,
        &config.firebase_api_key,
    ));
    let warehouse = Arc::new(SqliteWarehouse::open(&config.warehouse_path)?);

    let addr = config.bind_addr;
    let state = Arc::new(AppState::new(config, authenticator, warehouse));
    let app = routes::router(state);

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
