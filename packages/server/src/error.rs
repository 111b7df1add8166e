use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::models::{game::GamePhase, room::ActionKey};

/// A failed write against the room document store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("room {0} was not found")]
    RoomNotFound(String),
    #[error("room {room_id} changed since revision {expected}")]
    Conflict { room_id: String, expected: u64 },
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Every way a room command can be refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("only the host may do that")]
    NotHost,
    #[error("player {0} is not in this room")]
    NotInRoom(String),
    #[error("player {0} is dead")]
    PlayerDead(String),
    #[error("not allowed during the {0} phase")]
    InvalidPhase(GamePhase),
    #[error("your role cannot perform {0}")]
    WrongRole(ActionKey),
    #[error("invalid target {0}")]
    InvalidTarget(String),
    #[error("cannot guard {0} two nights in a row")]
    GuardRepeat(String),
    #[error("the hunter has already fired")]
    AlreadyFired,
    #[error("the phase timer is still running")]
    TimerRunning,
    #[error("chat is closed right now")]
    ChatClosed,
    #[error("message is empty")]
    EmptyMessage,
    #[error("room is full")]
    RoomFull,
    #[error("wrong room password")]
    WrongPassword,
    #[error("need at least {required} players to start, have {actual}")]
    NotEnoughPlayers { required: usize, actual: usize },
    #[error("the game has already started")]
    AlreadyStarted,
    #[error("the game is over")]
    GameOver,
    #[error("{configured} special roles do not fit {players} players")]
    RoleOverflow { configured: usize, players: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GameError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GameError::Store(StoreError::RoomNotFound(_)) => StatusCode::NOT_FOUND,
            GameError::Store(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
            GameError::Store(StoreError::Rejected(_)) => StatusCode::SERVICE_UNAVAILABLE,
            GameError::NotHost | GameError::WrongPassword => StatusCode::FORBIDDEN,
            GameError::RoomFull | GameError::AlreadyStarted | GameError::GameOver => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.to_string()
        }));
        (self.status_code(), body).into_response()
    }
}
