use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::{GameError, StoreError},
    models::{
        chat::{ChatChannel, ChatMessage},
        game::GamePhase,
        player::{generate_avatar, generate_username, Player},
        room::{Room, RoomStatus, MAX_PLAYERS},
    },
    store::{RoomPatch, RoomStore},
};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 6;
const CODE_ATTEMPTS: usize = 16;
const JOIN_ATTEMPTS: usize = 3;
const PASSWORD_COST: u32 = 10;

/// Who is acting, as vouched for by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub player_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub host: PlayerIdentity,
    pub name: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_max_players")]
    pub max_players: usize,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub player: PlayerIdentity,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_mode() -> String {
    "classic".to_string()
}

fn default_max_players() -> usize {
    MAX_PLAYERS
}

impl PlayerIdentity {
    pub fn new(player_id: impl Into<String>, username: impl Into<String>) -> Self {
        PlayerIdentity {
            player_id: player_id.into(),
            username: Some(username.into()),
            avatar: None,
        }
    }

    fn into_player(self) -> Player {
        let username = match self.username.filter(|u| !u.trim().is_empty()) {
            Some(name) => name.trim().to_string(),
            None => generate_username(&mut rand::thread_rng()),
        };
        let mut player = Player::new(self.player_id, username);
        if let Some(avatar) = self.avatar {
            player.avatar = avatar;
        } else {
            player.avatar = generate_avatar(&player.id);
        }
        player
    }
}

pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub async fn create_room(store: &dyn RoomStore, req: CreateRoomRequest) -> Result<Room, GameError> {
    let password_hash = match (req.is_private, req.password.as_deref()) {
        (false, _) => None,
        (true, Some(password)) if !password.is_empty() => Some(
            bcrypt::hash(password, PASSWORD_COST)
                .map_err(|e| StoreError::Rejected(format!("password hashing failed: {e}")))?,
        ),
        (true, _) => {
            return Err(GameError::InvalidConfig(
                "private rooms need a password".into(),
            ))
        }
    };

    let mut code = None;
    for _ in 0..CODE_ATTEMPTS {
        let candidate = generate_room_code(&mut rand::thread_rng());
        if store.find_by_code(&candidate).await?.is_none() {
            code = Some(candidate);
            break;
        }
    }
    let code = code.ok_or_else(|| StoreError::Rejected("no free room code".into()))?;

    let mut room = Room::new(
        uuid::Uuid::new_v4().to_string(),
        code,
        req.name,
        req.max_players,
        req.host.into_player(),
    );
    room.mode = req.mode;
    room.is_private = req.is_private;
    room.password_hash = password_hash;

    let room = store.create_room(room).await?;
    info!("room {} created with code {}", room.room_id, room.code);
    Ok(room)
}

pub async fn get_rooms(store: &dyn RoomStore) -> Result<Vec<Room>, GameError> {
    Ok(store.list_rooms(RoomStatus::Waiting).await?)
}

pub async fn get_room_info(store: &dyn RoomStore, room_id: &str) -> Result<Room, GameError> {
    Ok(store.get_room(room_id).await?)
}

pub async fn find_room_by_code(store: &dyn RoomStore, code: &str) -> Result<Room, GameError> {
    let code = code.trim().to_uppercase();
    store
        .find_by_code(&code)
        .await?
        .ok_or_else(|| StoreError::RoomNotFound(code).into())
}

/// Adds the player to a waiting room. Joining a room one is already in is a no-op.
pub async fn join_room(
    store: &dyn RoomStore,
    room_id: &str,
    req: JoinRequest,
) -> Result<Room, GameError> {
    let room = store.get_room(room_id).await?;
    if room.is_member(&req.player.player_id) {
        return Ok(room);
    }
    if let Some(hash) = &room.password_hash {
        let given = req.password.as_deref().unwrap_or_default();
        if !bcrypt::verify(given, hash).unwrap_or(false) {
            return Err(GameError::WrongPassword);
        }
    }
    let player = req.player.into_player();

    let mut room = room;
    for _ in 0..JOIN_ATTEMPTS {
        if room.is_member(&player.id) {
            return Ok(room);
        }
        if room.status != RoomStatus::Waiting {
            return Err(GameError::AlreadyStarted);
        }
        if room.is_full() {
            return Err(GameError::RoomFull);
        }
        // Pinned to the read revision so concurrent joins cannot overfill.
        match store
            .update(
                room_id,
                vec![RoomPatch::AddPlayer(player.clone())],
                Some(room.revision),
            )
            .await
        {
            Ok(joined) => {
                info!("{} joined room {}", player.username, room_id);
                return Ok(joined);
            }
            Err(StoreError::Conflict { .. }) => room = store.get_room(room_id).await?,
            Err(e) => return Err(e.into()),
        }
    }
    Err(StoreError::Rejected("room is busy, try again".into()).into())
}

pub async fn join_by_code(
    store: &dyn RoomStore,
    code: &str,
    req: JoinRequest,
) -> Result<Room, GameError> {
    let room = find_room_by_code(store, code).await?;
    join_room(store, &room.room_id, req).await
}

/// Removes the player. The host role passes to the earliest remaining
/// joiner; the last one out finishes the room.
pub async fn leave_room(
    store: &dyn RoomStore,
    room_id: &str,
    player_id: &str,
) -> Result<Room, GameError> {
    let mut room = store.get_room(room_id).await?;
    for _ in 0..JOIN_ATTEMPTS {
        if !room.is_member(player_id) {
            return Err(GameError::NotInRoom(player_id.to_string()));
        }

        let mut patches = vec![RoomPatch::RemovePlayer(player_id.to_string())];
        match room.players.iter().find(|p| p.id != player_id) {
            None => patches.push(RoomPatch::SetStatus(RoomStatus::Finished)),
            Some(next) if room.host_id == player_id => {
                patches.push(RoomPatch::SetHost(next.id.clone()));
            }
            Some(_) => {}
        }

        // Who is last out depends on the roster read, so the write is pinned to it.
        match store.update(room_id, patches, Some(room.revision)).await {
            Ok(left) => {
                if left.players.is_empty() {
                    info!("room {} emptied and closed", room_id);
                }
                return Ok(left);
            }
            Err(StoreError::Conflict { .. }) => room = store.get_room(room_id).await?,
            Err(e) => return Err(e.into()),
        }
    }
    Err(StoreError::Rejected("room is busy, try again".into()).into())
}

pub async fn set_ready(
    store: &dyn RoomStore,
    room_id: &str,
    player_id: &str,
    ready: bool,
) -> Result<Room, GameError> {
    let room = store.get_room(room_id).await?;
    if room.status != RoomStatus::Waiting {
        return Err(GameError::AlreadyStarted);
    }
    if !room.is_member(player_id) {
        return Err(GameError::NotInRoom(player_id.to_string()));
    }
    Ok(store
        .update(
            room_id,
            vec![RoomPatch::SetReady {
                player_id: player_id.to_string(),
                ready,
            }],
            None,
        )
        .await?)
}

/// Posts to the room feed. While playing, the village talks during the
/// discussion and the werewolves talk among themselves at night.
pub async fn send_message(
    store: &dyn RoomStore,
    room_id: &str,
    sender_id: &str,
    text: &str,
) -> Result<ChatMessage, GameError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(GameError::EmptyMessage);
    }
    let room = store.get_room(room_id).await?;
    let sender = room
        .player(sender_id)
        .ok_or_else(|| GameError::NotInRoom(sender_id.to_string()))?;

    let channel = match room.status {
        RoomStatus::Waiting | RoomStatus::Finished => ChatChannel::Public,
        RoomStatus::Playing => {
            if !sender.alive {
                return Err(GameError::PlayerDead(sender_id.to_string()));
            }
            match room.game_state.phase {
                GamePhase::Discuss => ChatChannel::Public,
                GamePhase::Night if sender.is_werewolf() => ChatChannel::Wolf,
                _ => return Err(GameError::ChatClosed),
            }
        }
    };

    let message = ChatMessage::new(
        sender.id.clone(),
        sender.username.clone(),
        text.to_string(),
        channel,
    );
    if let Err(e) = store.push_message(room_id, message.clone()).await {
        warn!("chat message in room {} was not delivered: {}", room_id, e);
        return Err(e.into());
    }
    Ok(message)
}

/// Wolf chatter stays among the werewolves until the match is over.
pub fn can_read(room: &Room, viewer_id: &str, message: &ChatMessage) -> bool {
    match message.channel {
        ChatChannel::Public | ChatChannel::System => true,
        ChatChannel::Wolf => {
            room.status == RoomStatus::Finished
                || room.player(viewer_id).is_some_and(Player::is_werewolf)
        }
    }
}

pub async fn get_messages(
    store: &dyn RoomStore,
    room_id: &str,
    viewer_id: &str,
) -> Result<Vec<ChatMessage>, GameError> {
    let room = store.get_room(room_id).await?;
    let messages = store.messages(room_id).await?;
    Ok(messages
        .into_iter()
        .filter(|m| can_read(&room, viewer_id, m))
        .collect())
}
