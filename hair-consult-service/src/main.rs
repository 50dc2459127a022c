use std::sync::Arc;

use consult_flow::InMemorySessionStorage;
use hair_consult_service::{AppState, GeminiClient, create_app};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured JSON tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hair_consult_service=debug,consult_flow=debug,tower_http=debug".into());

    match log_format.as_str() {
        "pretty" => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            // Structured JSON logging for production
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    // The model credential is the one hard startup requirement.
    let provider = match GeminiClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let state = AppState {
        session_storage: Arc::new(InMemorySessionStorage::new()),
        provider,
    };

    let app = create_app(state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {bind_addr}: {e}");
            std::process::exit(1);
        }
    };

    info!("Server running on http://{bind_addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!("server error: {e}");
        std::process::exit(1);
    }
}
