use anyhow::Context;
use axum::http::{self, HeaderValue, Method};
use dotenvy::dotenv;
use env_logger::Builder;
use log::LevelFilter;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use server::{
    app,
    models::config::GameConfig,
    state::AppState,
    store::{MemoryStore, RoomStore},
    utils::config::CONFIG,
};

fn init_logger() {
    let mut builder = Builder::new();
    builder
        .filter_level(LevelFilter::Info)
        .filter_module("server", LevelFilter::Debug)
        .filter_module("tower_http", LevelFilter::Debug)
        .filter_module("axum", LevelFilter::Info)
        .format_timestamp(Some(env_logger::TimestampPrecision::Millis))
        .format_target(true)
        .parse_default_env()
        .init();
}

async fn seed_game_config(store: &dyn RoomStore) -> anyhow::Result<()> {
    let Some(path) = &CONFIG.game_config_path else {
        return Ok(());
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading game config {}", path.display()))?;
    let config: GameConfig = serde_json::from_str(&raw)
        .with_context(|| format!("parsing game config {}", path.display()))?;
    config.validate()?;
    store.save_config(config).await?;
    log::info!("loaded game config from {}", path.display());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {}", e);
    }
    log::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenv() {
        eprintln!("Warning: could not load .env file: {}", e);
    }

    init_logger();

    let store: Arc<dyn RoomStore> = Arc::new(MemoryStore::new());
    seed_game_config(store.as_ref()).await?;
    let state = AppState::with_store(store, CONFIG.clone());

    let origin = CONFIG
        .cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("invalid CORS_ORIGIN {}", CONFIG.cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin([origin])
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([http::header::CONTENT_TYPE]);

    let app = app::create_app_with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &http::Request<_>| {
                tracing::info_span!(
                    "HTTP request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        );

    let listener = tokio::net::TcpListener::bind(CONFIG.addr)
        .await
        .with_context(|| format!("binding {}", CONFIG.addr))?;
    log::info!("werewolf server listening on http://{}", CONFIG.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
