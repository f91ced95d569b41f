use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::signal;

use lead_report_service::telemetry::init_telemetry;
use lead_report_service::{AppState, Config, LeadPipeline, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let telemetry_guard = init_telemetry(&config)?;

    tracing::info!(
        port = config.port,
        environment = %config.environment,
        "Starting lead-report-service"
    );

    let pipeline = LeadPipeline::from_config(&config)?;

    tracing::info!(
        ledger = config.ledger_configured(),
        generation = config.generation_configured(),
        messaging = config.mail_configured(),
        model = %config.llm_model,
        report_format = %config.report_format,
        "Lead pipeline initialized"
    );
    if !config.generation_configured() {
        tracing::warn!("OPENAI_API_KEY not set, every report will fail");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = routes::router(AppState::new(config, pipeline));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    telemetry_guard.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
