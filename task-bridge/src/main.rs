use dotenvy::dotenv;
use service_core::observability::logging::init_tracing;
use task_bridge::config::get_configuration;
use task_bridge::startup::{build_router, build_state};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "task-bridge",
        &configuration.server.log_level,
        configuration.server.otlp_endpoint.as_deref(),
    )?;

    task_bridge::services::metrics::init_metrics()?;

    let state = build_state(&configuration)?;
    let app = build_router(state);

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!(
        public_url = %configuration.server.public_url,
        "Starting task-bridge on {}", address
    );
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
