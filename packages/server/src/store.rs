//! The shared room document store.
//!
//! Every participant coordinates exclusively through this interface: whole
//! documents are read and watched, while writes are expressed as field-level
//! [`RoomPatch`]es so that concurrent writers touching different keys never
//! clobber each other.

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use crate::error::StoreError;
use crate::models::{
    chat::ChatMessage,
    config::GameConfig,
    game::GameState,
    history::{MatchSummary, PlayerStats},
    player::Player,
    role::Faction,
    room::{ActionKey, Room, RoomStatus},
};

pub mod memory;

pub use memory::MemoryStore;

/// A partial-field update applied atomically with its siblings in one
/// [`RoomStore::update`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomPatch {
    SetVote { voter_id: String, target_id: String },
    SetAction { key: ActionKey, target_id: String },
    /// Atomic increment of `game_state.timer`.
    IncrementTimer(i64),
    /// Array-membership add: a no-op when the id is already present.
    AddPlayer(Player),
    RemovePlayer(String),
    SetPlayers(Vec<Player>),
    SetReady { player_id: String, ready: bool },
    SetHost(String),
    SetStatus(RoomStatus),
    SetGameState(GameState),
    SetWinner(Option<Faction>),
    ClearVotes,
    ClearActions,
}

impl RoomPatch {
    pub fn apply(self, room: &mut Room) -> Result<(), StoreError> {
        match self {
            RoomPatch::SetVote { voter_id, target_id } => {
                room.votes.insert(voter_id, target_id);
            }
            RoomPatch::SetAction { key, target_id } => {
                room.pending_actions.insert(key, target_id);
            }
            RoomPatch::IncrementTimer(delta) => room.game_state.timer += delta,
            RoomPatch::AddPlayer(player) => {
                if !room.is_member(&player.id) {
                    room.players.push(player);
                }
            }
            RoomPatch::RemovePlayer(player_id) => room.players.retain(|p| p.id != player_id),
            RoomPatch::SetPlayers(players) => room.players = players,
            RoomPatch::SetReady { player_id, ready } => {
                let player = room
                    .player_mut(&player_id)
                    .ok_or_else(|| StoreError::Rejected(format!("no player {player_id}")))?;
                player.is_ready = ready;
            }
            RoomPatch::SetHost(host_id) => room.host_id = host_id,
            RoomPatch::SetStatus(status) => room.status = status,
            RoomPatch::SetGameState(state) => room.game_state = state,
            RoomPatch::SetWinner(winner) => room.winner = winner,
            RoomPatch::ClearVotes => room.votes.clear(),
            RoomPatch::ClearActions => room.pending_actions.clear(),
        }
        Ok(())
    }
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn create_room(&self, room: Room) -> Result<Room, StoreError>;

    async fn get_room(&self, room_id: &str) -> Result<Room, StoreError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<Room>, StoreError>;

    async fn list_rooms(&self, status: RoomStatus) -> Result<Vec<Room>, StoreError>;

    /// Applies `patches` in order as one write. With `expected_revision`
    /// set, the write fails with [`StoreError::Conflict`] if anyone else
    /// wrote the document since that revision was read.
    async fn update(
        &self,
        room_id: &str,
        patches: Vec<RoomPatch>,
        expected_revision: Option<u64>,
    ) -> Result<Room, StoreError>;

    async fn replace_room(&self, room: Room) -> Result<Room, StoreError>;

    async fn delete_room(&self, room_id: &str) -> Result<(), StoreError>;

    /// Snapshot subscription. `None` is published once the room is deleted.
    async fn watch_room(&self, room_id: &str) -> Result<watch::Receiver<Option<Room>>, StoreError>;

    /// Rooms currently accepting players.
    async fn watch_lobby(&self) -> watch::Receiver<Vec<Room>>;

    async fn push_message(&self, room_id: &str, message: ChatMessage) -> Result<(), StoreError>;

    async fn messages(&self, room_id: &str) -> Result<Vec<ChatMessage>, StoreError>;

    async fn subscribe_messages(
        &self,
        room_id: &str,
    ) -> Result<broadcast::Receiver<ChatMessage>, StoreError>;

    async fn load_config(&self) -> Result<GameConfig, StoreError>;

    async fn save_config(&self, config: GameConfig) -> Result<(), StoreError>;

    async fn record_match(&self, summary: MatchSummary) -> Result<(), StoreError>;

    /// Newest first.
    async fn history(&self, limit: usize) -> Result<Vec<MatchSummary>, StoreError>;

    async fn record_outcome(&self, player: &Player, won: bool) -> Result<PlayerStats, StoreError>;

    async fn stats(&self, player_id: &str) -> Result<Option<PlayerStats>, StoreError>;
}
