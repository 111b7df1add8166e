use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::GameError,
    models::{game::GameState, role::Faction, room::ActionKey, room::Room},
    services::{
        game_service::{self, ActionReceipt},
        phase_machine::PhaseMachine,
    },
    state::AppState,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct ActorRequest {
    pub player_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteAction {
    pub voter_id: String,
    pub target_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NightActionRequest {
    pub player_id: String,
    pub action: ActionKey,
    pub target_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Viewer {
    #[serde(default)]
    pub player_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WinnerResponse {
    pub winner: Option<Faction>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .nest(
            "/:roomid",
            Router::new()
                .route("/start", post(start_game))
                .route("/state", get(get_game_state))
                .nest(
                    "/actions",
                    Router::new()
                        .route("/vote", post(cast_vote_handler))
                        .route("/night-action", post(night_action_handler)),
                )
                .route("/phase/next", post(advance_phase_handler))
                .route("/check-winner", get(check_winner_handler)),
        )
        .with_state(state)
}

pub async fn start_game(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<Room>, GameError> {
    let room = game_service::start_game(state.store.as_ref(), &room_id, &req.player_id).await?;
    Ok(Json(room.view_for(&req.player_id)))
}

pub async fn get_game_state(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    Query(viewer): Query<Viewer>,
) -> Result<Json<GameState>, GameError> {
    let game_state =
        game_service::get_game_state(state.store.as_ref(), &room_id, &viewer.player_id).await?;
    Ok(Json(game_state))
}

async fn night_action_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<NightActionRequest>,
) -> Result<Json<ActionReceipt>, GameError> {
    let receipt = game_service::submit_action(
        state.store.as_ref(),
        &room_id,
        &req.player_id,
        req.action,
        &req.target_id,
    )
    .await?;
    Ok(Json(receipt))
}

async fn cast_vote_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(vote_action): Json<VoteAction>,
) -> Result<Json<serde_json::Value>, GameError> {
    game_service::submit_vote(
        state.store.as_ref(),
        &room_id,
        &vote_action.voter_id,
        &vote_action.target_id,
    )
    .await?;
    Ok(Json(serde_json::json!({ "status": "accepted" })))
}

async fn advance_phase_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<Room>, GameError> {
    let config = state.store.load_config().await?;
    let machine = PhaseMachine::new(config);
    let room =
        game_service::advance_phase(state.store.as_ref(), &room_id, &req.player_id, &machine)
            .await?;
    Ok(Json(room.view_for(&req.player_id)))
}

async fn check_winner_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<WinnerResponse>, GameError> {
    let winner = game_service::check_winner(state.store.as_ref(), &room_id).await?;
    Ok(Json(WinnerResponse { winner }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::player::Player;
    use crate::utils::test_setup::{seed_waiting_room, setup_test_env};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn post(uri: String, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_game() {
        setup_test_env();
        let state = AppState::new();
        let app = routes(state.clone());
        let room_id = seed_waiting_room(state.store.as_ref(), 5).await;

        let response = app
            .oneshot(post(
                format!("/{}/start", room_id),
                serde_json::json!({ "player_id": "p0" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let room: Room = serde_json::from_slice(&body).unwrap();
        let own: &Player = room.player("p0").unwrap();
        assert!(own.role.is_some());
        assert!(room.pending_actions.is_empty());
    }

    #[tokio::test]
    async fn guests_cannot_start() {
        setup_test_env();
        let state = AppState::new();
        let app = routes(state.clone());
        let room_id = seed_waiting_room(state.store.as_ref(), 5).await;

        let response = app
            .oneshot(post(
                format!("/{}/start", room_id),
                serde_json::json!({ "player_id": "p3" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn state_hides_the_victims_role_from_players() {
        use crate::models::{game::GamePhase, role::Role, room::RoomStatus};
        use crate::store::RoomPatch;

        setup_test_env();
        let state = AppState::new();
        let store = state.store.as_ref();
        let room_id = seed_waiting_room(store, 5).await;
        let mut room = store.get_room(&room_id).await.unwrap();
        let roles = [
            Role::Werewolf,
            Role::Villager,
            Role::Seer,
            Role::Doctor,
            Role::Villager,
        ];
        for (player, role) in room.players.iter_mut().zip(roles) {
            player.role = Some(role);
        }
        room.status = RoomStatus::Playing;
        room.game_state = GameState::first_night(30);
        room.game_state.timer = 0;
        store.replace_room(room).await.unwrap();
        store
            .update(
                &room_id,
                vec![RoomPatch::SetAction {
                    key: ActionKey::Kill,
                    target_id: "p1".into(),
                }],
                None,
            )
            .await
            .unwrap();
        let machine = PhaseMachine::new(store.load_config().await.unwrap());
        game_service::advance_phase(store, &room_id, "p0", &machine)
            .await
            .unwrap();

        let request = Request::builder()
            .uri(format!("/{}/state?player_id=p4", room_id))
            .body(Body::empty())
            .unwrap();
        let response = routes(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let seen: GameState = serde_json::from_slice(&body).unwrap();
        assert_eq!(seen.phase, GamePhase::MorningResult);
        let victim = seen.last_night_victim.unwrap();
        assert_eq!(victim.id, "p1");
        assert_eq!(victim.role, None);
    }

    #[tokio::test]
    async fn voting_before_the_vote_phase_is_a_bad_request() {
        setup_test_env();
        let state = AppState::new();
        let room_id = seed_waiting_room(state.store.as_ref(), 5).await;
        game_service::start_game(state.store.as_ref(), &room_id, "p0")
            .await
            .unwrap();

        let response = routes(state)
            .oneshot(post(
                format!("/{}/actions/vote", room_id),
                serde_json::json!({ "voter_id": "p1", "target_id": "p2" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
