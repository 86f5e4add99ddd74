use std::error::Error;
use std::sync::Arc;

use cad_ai::GeminiClient;
use cad_pipeline::Orchestrator;
use cad_server::{AppState, ServerConfig, app, init_tracing, spawn_eviction};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = ServerConfig::from_env();
    init_tracing(config.log_json);

    let client = GeminiClient::from_env();
    if !client.has_credentials() {
        warn!("GEMINI_API_KEY is not set, every prompt will use the fallback synthesizer");
    }
    let orchestrator = Orchestrator::new(&config.pipeline, Arc::new(client));
    let state = AppState::new(orchestrator, &config);

    let sweeper = spawn_eviction(
        Arc::clone(state.orchestrator().store()),
        config.cleanup_interval,
        config.pipeline.artifact_max_age,
    );

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(
        address = %listener.local_addr()?,
        temp_dir = %config.pipeline.temp_dir.display(),
        max_models_per_user = config.pipeline.max_models_per_user,
        "listening"
    );
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
