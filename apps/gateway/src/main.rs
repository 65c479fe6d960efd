mod auth;
mod cli;
mod config;
mod error;
mod inference;
mod management;
mod oauth_callback;
mod state;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use gproxy_core::AppState;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cli::Cli;
use crate::state::GatewayState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load(&cli).await?;

    let filter = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tokio::fs::create_dir_all(&config.auth_dir).await.ok();
    tokio::fs::create_dir_all(&config.config_dir).await.ok();

    let host = config.host.clone();
    let port = config.port;

    let app_state = AppState::bootstrap(config).await?;
    app_state.spawn_background_tasks();
    let state = GatewayState::new(app_state.clone());

    let app = build_router(state);

    let bind = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "gproxy-gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(app_state))
        .await?;

    Ok(())
}

fn build_router(state: GatewayState) -> Router {
    let inference = Router::new()
        .route("/v1/chat/completions", post(inference::openai_chat_completions))
        .route("/v1/messages", post(inference::anthropic_messages))
        .route("/v1beta/models/{*model_action}", post(inference::gemini_generate))
        .route("/v1/models", get(inference::list_models))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    let manage = management::router()
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_management_key));

    let callbacks = Router::new()
        .route("/google/callback", get(oauth_callback::google))
        .route("/anthropic/callback", get(oauth_callback::anthropic))
        .route("/codex/callback", get(oauth_callback::codex))
        .route("/kiro/callback", get(oauth_callback::kiro));

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/ready", get(|| async { StatusCode::OK }))
        .route("/live", get(|| async { StatusCode::OK }))
        .merge(inference)
        .merge(callbacks)
        .nest("/manage", manage)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down");
    state.shutdown();
}
