use bloodwork_service::ai::openai::OpenAiConfig;
use bloodwork_service::ai::{AiProvider, MockAiProvider, OpenAiProvider};
use bloodwork_service::config::BloodworkConfig;
use bloodwork_service::services::init_metrics;
use bloodwork_service::startup::Application;
use service_core::observability::init_tracing;
use std::sync::Arc;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
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

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Metrics recorder must be installed before any metrics are recorded.
    init_metrics();
    init_tracing("bloodwork-service", "info");

    let config = BloodworkConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    let provider: Arc<dyn AiProvider> = if config.ai.use_mock {
        tracing::warn!("Using mock AI provider; no real analysis will be produced");
        Arc::new(MockAiProvider::returning_json("{\"biomarkers\": []}"))
    } else {
        Arc::new(OpenAiProvider::new(OpenAiConfig {
            base_url: config.ai.base_url.clone(),
            api_key: config.ai.api_key.clone(),
            model: config.ai.model.clone(),
        }))
    };

    let application = Application::build(config, provider).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    tokio::select! {
        result = application.run_until_stopped() => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {}
    }

    Ok(())
}
