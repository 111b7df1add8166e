use crate::state::AppState;
use axum::Router;

mod game;
mod room;
mod stats;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .nest("/api/room", room::routes(state.clone()))
        .nest("/api/game", game::routes(state.clone()))
        .nest("/api/config", stats::config_routes(state.clone()))
        .nest("/api/history", stats::history_routes(state.clone()))
        .nest("/api/users", stats::user_routes(state))
}
