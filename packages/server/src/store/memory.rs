use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::debug;

use super::{RoomPatch, RoomStore};
use crate::error::StoreError;
use crate::models::{
    chat::{ChatLog, ChatMessage},
    config::GameConfig,
    history::{MatchSummary, PlayerStats},
    player::Player,
    room::{Room, RoomStatus},
};

const CHAT_CHANNEL_CAPACITY: usize = 1000;

struct RoomEntry {
    room: Room,
    snapshots: watch::Sender<Option<Room>>,
    chat: ChatLog,
    chat_tx: broadcast::Sender<ChatMessage>,
}

/// Process-local [`RoomStore`]. Each write is serialized behind one lock and
/// published to watchers as a whole snapshot.
pub struct MemoryStore {
    rooms: Mutex<HashMap<String, RoomEntry>>,
    lobby: watch::Sender<Vec<Room>>,
    config: Mutex<GameConfig>,
    history: Mutex<Vec<MatchSummary>>,
    stats: Mutex<HashMap<String, PlayerStats>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(GameConfig::default())
    }

    pub fn with_config(config: GameConfig) -> Self {
        let (lobby, _) = watch::channel(Vec::new());
        MemoryStore {
            rooms: Mutex::new(HashMap::new()),
            lobby,
            config: Mutex::new(config),
            history: Mutex::new(Vec::new()),
            stats: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Simulates losing connectivity: every write is rejected while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("store is unreachable".into()));
        }
        Ok(())
    }

    fn publish_lobby(&self, rooms: &HashMap<String, RoomEntry>) {
        let mut waiting: Vec<Room> = rooms
            .values()
            .filter(|e| e.room.status == RoomStatus::Waiting)
            .map(|e| e.room.clone())
            .collect();
        waiting.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        self.lobby.send_replace(waiting);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn create_room(&self, mut room: Room) -> Result<Room, StoreError> {
        self.check_online()?;
        let mut rooms = self.rooms.lock().await;
        if rooms.contains_key(&room.room_id) {
            return Err(StoreError::Rejected(format!(
                "room {} already exists",
                room.room_id
            )));
        }
        room.revision = 1;
        let (snapshots, _) = watch::channel(Some(room.clone()));
        let (chat_tx, _) = broadcast::channel(CHAT_CHANNEL_CAPACITY);
        rooms.insert(
            room.room_id.clone(),
            RoomEntry {
                room: room.clone(),
                snapshots,
                chat: ChatLog::new(room.room_id.clone()),
                chat_tx,
            },
        );
        self.publish_lobby(&rooms);
        Ok(room)
    }

    async fn get_room(&self, room_id: &str) -> Result<Room, StoreError> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room_id)
            .map(|e| e.room.clone())
            .ok_or_else(|| StoreError::RoomNotFound(room_id.to_string()))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Room>, StoreError> {
        let rooms = self.rooms.lock().await;
        Ok(rooms
            .values()
            .find(|e| e.room.code == code)
            .map(|e| e.room.clone()))
    }

    async fn list_rooms(&self, status: RoomStatus) -> Result<Vec<Room>, StoreError> {
        let rooms = self.rooms.lock().await;
        let mut listed: Vec<Room> = rooms
            .values()
            .filter(|e| e.room.status == status)
            .map(|e| e.room.clone())
            .collect();
        listed.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(listed)
    }

    async fn update(
        &self,
        room_id: &str,
        patches: Vec<RoomPatch>,
        expected_revision: Option<u64>,
    ) -> Result<Room, StoreError> {
        self.check_online()?;
        let mut rooms = self.rooms.lock().await;
        let entry = rooms
            .get_mut(room_id)
            .ok_or_else(|| StoreError::RoomNotFound(room_id.to_string()))?;
        if let Some(expected) = expected_revision {
            if entry.room.revision != expected {
                return Err(StoreError::Conflict {
                    room_id: room_id.to_string(),
                    expected,
                });
            }
        }

        // Apply to a scratch copy so a failing patch leaves nothing behind.
        let mut room = entry.room.clone();
        for patch in patches {
            patch.apply(&mut room)?;
        }
        room.revision += 1;
        entry.room = room.clone();
        entry.snapshots.send_replace(Some(room.clone()));
        debug!("room {} now at revision {}", room_id, room.revision);

        self.publish_lobby(&rooms);
        Ok(room)
    }

    async fn replace_room(&self, mut room: Room) -> Result<Room, StoreError> {
        self.check_online()?;
        let mut rooms = self.rooms.lock().await;
        let entry = rooms
            .get_mut(&room.room_id)
            .ok_or_else(|| StoreError::RoomNotFound(room.room_id.clone()))?;
        room.revision = entry.room.revision + 1;
        entry.room = room.clone();
        entry.snapshots.send_replace(Some(room.clone()));
        self.publish_lobby(&rooms);
        Ok(room)
    }

    async fn delete_room(&self, room_id: &str) -> Result<(), StoreError> {
        self.check_online()?;
        let mut rooms = self.rooms.lock().await;
        let entry = rooms
            .remove(room_id)
            .ok_or_else(|| StoreError::RoomNotFound(room_id.to_string()))?;
        entry.snapshots.send_replace(None);
        self.publish_lobby(&rooms);
        Ok(())
    }

    async fn watch_room(&self, room_id: &str) -> Result<watch::Receiver<Option<Room>>, StoreError> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room_id)
            .map(|e| e.snapshots.subscribe())
            .ok_or_else(|| StoreError::RoomNotFound(room_id.to_string()))
    }

    async fn watch_lobby(&self) -> watch::Receiver<Vec<Room>> {
        self.lobby.subscribe()
    }

    async fn push_message(&self, room_id: &str, message: ChatMessage) -> Result<(), StoreError> {
        self.check_online()?;
        let mut rooms = self.rooms.lock().await;
        let entry = rooms
            .get_mut(room_id)
            .ok_or_else(|| StoreError::RoomNotFound(room_id.to_string()))?;
        entry.chat.add_message(message.clone());
        // Nobody listening is fine.
        let _ = entry.chat_tx.send(message);
        Ok(())
    }

    async fn messages(&self, room_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room_id)
            .map(|e| e.chat.messages.clone())
            .ok_or_else(|| StoreError::RoomNotFound(room_id.to_string()))
    }

    async fn subscribe_messages(
        &self,
        room_id: &str,
    ) -> Result<broadcast::Receiver<ChatMessage>, StoreError> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room_id)
            .map(|e| e.chat_tx.subscribe())
            .ok_or_else(|| StoreError::RoomNotFound(room_id.to_string()))
    }

    async fn load_config(&self) -> Result<GameConfig, StoreError> {
        Ok(self.config.lock().await.clone())
    }

    async fn save_config(&self, config: GameConfig) -> Result<(), StoreError> {
        self.check_online()?;
        *self.config.lock().await = config;
        Ok(())
    }

    async fn record_match(&self, summary: MatchSummary) -> Result<(), StoreError> {
        self.check_online()?;
        self.history.lock().await.push(summary);
        Ok(())
    }

    async fn history(&self, limit: usize) -> Result<Vec<MatchSummary>, StoreError> {
        let history = self.history.lock().await;
        let mut newest: Vec<MatchSummary> = history.iter().rev().take(limit).cloned().collect();
        newest.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(newest)
    }

    async fn record_outcome(&self, player: &Player, won: bool) -> Result<PlayerStats, StoreError> {
        self.check_online()?;
        let mut stats = self.stats.lock().await;
        let entry = stats.entry(player.id.clone()).or_default();
        entry.username = player.username.clone();
        entry.avatar = player.avatar.clone();
        entry.games_played += 1;
        if won {
            entry.wins += 1;
        } else {
            entry.losses += 1;
        }
        entry.last_played = Some(Utc::now());
        Ok(entry.clone())
    }

    async fn stats(&self, player_id: &str) -> Result<Option<PlayerStats>, StoreError> {
        Ok(self.stats.lock().await.get(player_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::room::ActionKey;

    fn room(id: &str, code: &str) -> Room {
        Room::new(
            id.to_string(),
            code.to_string(),
            "Test".to_string(),
            8,
            Player::new("host", "Host"),
        )
    }

    #[tokio::test]
    async fn field_updates_do_not_clobber_each_other() {
        let store = MemoryStore::new();
        store.create_room(room("r1", "AAAAAA")).await.unwrap();

        // Two voters writing from the same stale snapshot both land.
        let stale = store.get_room("r1").await.unwrap();
        store
            .update(
                "r1",
                vec![RoomPatch::SetVote {
                    voter_id: "a".into(),
                    target_id: "x".into(),
                }],
                None,
            )
            .await
            .unwrap();
        store
            .update(
                "r1",
                vec![RoomPatch::SetVote {
                    voter_id: "b".into(),
                    target_id: "y".into(),
                }],
                None,
            )
            .await
            .unwrap();

        let room = store.get_room("r1").await.unwrap();
        assert_eq!(room.votes.len(), 2);
        assert_eq!(room.revision, stale.revision + 2);
    }

    #[tokio::test]
    async fn revision_guard_detects_concurrent_writes() {
        let store = MemoryStore::new();
        let created = store.create_room(room("r1", "AAAAAA")).await.unwrap();
        store
            .update(
                "r1",
                vec![RoomPatch::SetAction {
                    key: ActionKey::Kill,
                    target_id: "host".into(),
                }],
                None,
            )
            .await
            .unwrap();

        let err = store
            .update("r1", vec![RoomPatch::ClearActions], Some(created.revision))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.get_room("r1").await.unwrap().pending_actions.len(), 1);
    }

    #[tokio::test]
    async fn failing_patch_leaves_document_untouched() {
        let store = MemoryStore::new();
        store.create_room(room("r1", "AAAAAA")).await.unwrap();
        let result = store
            .update(
                "r1",
                vec![
                    RoomPatch::IncrementTimer(5),
                    RoomPatch::SetReady {
                        player_id: "ghost".into(),
                        ready: true,
                    },
                ],
                None,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(store.get_room("r1").await.unwrap().game_state.timer, 0);
    }

    #[tokio::test]
    async fn lobby_only_lists_waiting_rooms() {
        let store = MemoryStore::new();
        let lobby = store.watch_lobby().await;
        store.create_room(room("r1", "AAAAAA")).await.unwrap();
        store.create_room(room("r2", "BBBBBB")).await.unwrap();
        store
            .update("r2", vec![RoomPatch::SetStatus(RoomStatus::Playing)], None)
            .await
            .unwrap();

        let listed: Vec<String> = lobby.borrow().iter().map(|r| r.room_id.clone()).collect();
        assert_eq!(listed, ["r1"]);
    }

    #[tokio::test]
    async fn watchers_see_deletion() {
        let store = MemoryStore::new();
        store.create_room(room("r1", "AAAAAA")).await.unwrap();
        let mut rx = store.watch_room("r1").await.unwrap();
        store.delete_room("r1").await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn offline_store_rejects_writes() {
        let store = MemoryStore::new();
        store.create_room(room("r1", "AAAAAA")).await.unwrap();
        store.set_offline(true);
        let err = store
            .update("r1", vec![RoomPatch::IncrementTimer(-1)], None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
    }

    #[tokio::test]
    async fn outcomes_accumulate_per_identity() {
        let store = MemoryStore::new();
        let player = Player::new("p1", "Ann");
        store.record_outcome(&player, true).await.unwrap();
        let stats = store.record_outcome(&player, false).await.unwrap();
        assert_eq!((stats.games_played, stats.wins, stats.losses), (2, 1, 1));
        assert!(stats.last_played.is_some());
    }
}
