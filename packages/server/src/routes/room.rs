use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::GameError,
    models::{chat::ChatMessage, room::Room},
    services::room_service::{self, CreateRoomRequest, JoinRequest},
    state::AppState,
    utils::websocket,
};

#[derive(Debug, Default, Deserialize)]
pub struct Viewer {
    #[serde(default)]
    pub player_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReadyRequest {
    pub player_id: String,
    #[serde(default = "ready_default")]
    pub ready: bool,
}

fn ready_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub sender_id: String,
    pub text: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        // curl -X POST http://localhost:8080/api/room/create -H 'Content-Type: application/json' \
        //   -d '{"host":{"player_id":"p1","username":"Alice"},"name":"Den"}'
        .route("/create", post(create_room))
        // curl http://localhost:8080/api/room/rooms
        .route("/rooms", get(get_rooms))
        // curl http://localhost:8080/api/room/{roomid}?player_id={playerid}
        .route("/:roomid", get(get_room_info))
        .route("/code/:code", get(get_room_by_code))
        .route("/:roomid/join", post(join_room))
        .route("/code/:code/join", post(join_by_code))
        // curl -X POST http://localhost:8080/api/room/{roomid}/leave/{playerid}
        .route("/:roomid/leave/:playerid", post(leave_room))
        .route("/:roomid/ready", post(set_ready))
        .route("/:roomid/messages", get(get_messages).post(send_message))
        // websocat "ws://localhost:8080/api/room/{roomid}/ws?player_id={playerid}"
        .route("/:roomid/ws", get(websocket::handler))
        .with_state(state)
}

pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<Json<Room>, GameError> {
    let host_id = req.host.player_id.clone();
    let room = room_service::create_room(state.store.as_ref(), req).await?;
    Ok(Json(room.view_for(&host_id)))
}

async fn get_rooms(State(state): State<AppState>) -> Result<Json<Vec<Room>>, GameError> {
    let rooms = room_service::get_rooms(state.store.as_ref()).await?;
    Ok(Json(rooms.iter().map(|room| room.view_for("")).collect()))
}

async fn get_room_info(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(viewer): Query<Viewer>,
) -> Result<Json<Room>, GameError> {
    let room = room_service::get_room_info(state.store.as_ref(), &room_id).await?;
    Ok(Json(room.view_for(&viewer.player_id)))
}

async fn get_room_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(viewer): Query<Viewer>,
) -> Result<Json<Room>, GameError> {
    let room = room_service::find_room_by_code(state.store.as_ref(), &code).await?;
    Ok(Json(room.view_for(&viewer.player_id)))
}

pub async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<JoinRequest>,
) -> Result<Json<Room>, GameError> {
    let player_id = req.player.player_id.clone();
    let room = room_service::join_room(state.store.as_ref(), &room_id, req).await?;
    Ok(Json(room.view_for(&player_id)))
}

async fn join_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<JoinRequest>,
) -> Result<Json<Room>, GameError> {
    let player_id = req.player.player_id.clone();
    let room = room_service::join_by_code(state.store.as_ref(), &code, req).await?;
    Ok(Json(room.view_for(&player_id)))
}

pub async fn leave_room(
    State(state): State<AppState>,
    Path((room_id, player_id)): Path<(String, String)>,
) -> Result<Json<Room>, GameError> {
    let room = room_service::leave_room(state.store.as_ref(), &room_id, &player_id).await?;
    Ok(Json(room.view_for(&player_id)))
}

async fn set_ready(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<ReadyRequest>,
) -> Result<Json<Room>, GameError> {
    let room =
        room_service::set_ready(state.store.as_ref(), &room_id, &req.player_id, req.ready).await?;
    Ok(Json(room.view_for(&req.player_id)))
}

async fn get_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(viewer): Query<Viewer>,
) -> Result<Json<Vec<ChatMessage>>, GameError> {
    let messages =
        room_service::get_messages(state.store.as_ref(), &room_id, &viewer.player_id).await?;
    Ok(Json(messages))
}

async fn send_message(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<ChatMessage>, GameError> {
    let message =
        room_service::send_message(state.store.as_ref(), &room_id, &req.sender_id, &req.text)
            .await?;
    Ok(Json(message))
}
