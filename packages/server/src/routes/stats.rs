use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::GameError,
    models::{config::GameConfig, history::MatchSummary},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub fn config_routes(state: AppState) -> Router {
    Router::new()
        // curl http://localhost:8080/api/config
        .route("/", get(get_config).put(update_config))
        .with_state(state)
}

pub fn history_routes(state: AppState) -> Router {
    Router::new()
        // curl http://localhost:8080/api/history?limit=5
        .route("/", get(get_history))
        .with_state(state)
}

pub fn user_routes(state: AppState) -> Router {
    Router::new()
        // curl http://localhost:8080/api/users/{playerid}/stats
        .route("/:id/stats", get(get_stats))
        .with_state(state)
}

async fn get_config(State(state): State<AppState>) -> Result<Json<GameConfig>, GameError> {
    Ok(Json(state.store.load_config().await?))
}

async fn update_config(
    State(state): State<AppState>,
    Json(config): Json<GameConfig>,
) -> Result<Json<GameConfig>, GameError> {
    config.validate()?;
    state.store.save_config(config.clone()).await?;
    tracing::info!("game configuration updated");
    Ok(Json(config))
}

async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MatchSummary>>, GameError> {
    let limit = query
        .limit
        .unwrap_or(state.config.history_limit)
        .min(state.config.history_limit);
    Ok(Json(state.store.history(limit).await?))
}

async fn get_stats(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Response, GameError> {
    let response = match state.store.stats(&player_id).await? {
        Some(stats) => Json(stats).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no games recorded for {}", player_id) })),
        )
            .into_response(),
    };
    Ok(response)
}
