use tokio::net::TcpListener;
use multi_source_scraper::{
    AppState,
    api::routes::create_router,
    config::Config,
    telemetry,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;
    let _error_log_guard = telemetry::init_tracing(&config)?;

    let server_addr = config.server_addr;
    tracing::info!(?config, "configuration loaded");
    if config.openai_api_key.is_some() {
        tracing::info!("OPENAI_API_KEY is set but AI post-processing is not part of this service");
    }

    let app_state = AppState::from_config(config)?;
    let app = create_router(app_state);

    let listener = TcpListener::bind(server_addr).await?;
    tracing::info!(%server_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
