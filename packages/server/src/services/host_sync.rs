//! One participant's view of a room: mirrors the document, corrects a
//! missing host, and drives the phase timer while this participant is host.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    error::{GameError, StoreError},
    models::room::{Room, RoomStatus},
    services::{game_service, phase_machine::PhaseMachine},
    store::{RoomPatch, RoomStore},
};

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// This participant owns the timer.
    Drive,
    Watch,
    /// Nothing left to do for this participant.
    Stop,
}

pub struct RoomSync {
    store: Arc<dyn RoomStore>,
    room_id: String,
    player_id: String,
}

impl RoomSync {
    pub fn new(store: Arc<dyn RoomStore>, room_id: String, player_id: String) -> Self {
        RoomSync {
            store,
            room_id,
            player_id,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let room_id = self.room_id.clone();
            if let Err(e) = self.run().await {
                warn!("sync for room {} stopped: {}", room_id, e);
            }
        })
    }

    pub async fn run(self) -> Result<(), GameError> {
        let mut rx = self.store.watch_room(&self.room_id).await?;
        let mut ticker = time::interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick is a full second out, not immediate.
        ticker.reset();

        let first = rx.borrow_and_update().clone();
        let mut state = match first {
            Some(room) => self.observe(&room).await,
            None => Observation::Stop,
        };

        while state != Observation::Stop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = rx.borrow_and_update().clone();
                    let next = match snapshot {
                        Some(room) => self.observe(&room).await,
                        None => Observation::Stop,
                    };
                    if next == Observation::Drive && state != Observation::Drive {
                        info!("{} now drives room {}", self.player_id, self.room_id);
                        ticker.reset();
                    }
                    state = next;
                }
                _ = ticker.tick(), if state == Observation::Drive => {
                    let latest = rx.borrow().clone();
                    match latest {
                        Some(room) if self.drives(&room) => self.tick(&room).await,
                        _ => state = Observation::Watch,
                    }
                }
            }
        }
        debug!("{} stopped syncing room {}", self.player_id, self.room_id);
        Ok(())
    }

    fn drives(&self, room: &Room) -> bool {
        room.host_id == self.player_id && room.status == RoomStatus::Playing && room.winner.is_none()
    }

    async fn observe(&self, room: &Room) -> Observation {
        if room.status == RoomStatus::Finished || !room.is_member(&self.player_id) {
            return Observation::Stop;
        }
        if !room.host_present() {
            if let Err(e) = migrate_host(self.store.as_ref(), room).await {
                warn!("host migration in room {} failed: {}", room.room_id, e);
            }
            // The corrected snapshot arrives through the watch.
            return Observation::Watch;
        }
        if self.drives(room) {
            Observation::Drive
        } else {
            Observation::Watch
        }
    }

    /// One second of the phase clock. The tick that brings the timer to
    /// zero also commits the transition.
    async fn tick(&self, room: &Room) {
        if room.game_state.timer > 0 {
            let result = self
                .store
                .update(&self.room_id, vec![RoomPatch::IncrementTimer(-1)], None)
                .await;
            match result {
                Ok(counted) if counted.game_state.timer > 0 => return,
                Ok(_) => {}
                Err(e) => {
                    warn!("timer write for room {} rejected: {}", self.room_id, e);
                    return;
                }
            }
        }

        let config = match self.store.load_config().await {
            Ok(config) => config,
            Err(e) => {
                warn!("could not load config for room {}: {}", self.room_id, e);
                return;
            }
        };
        let machine = PhaseMachine::new(config);
        match game_service::advance_phase(
            self.store.as_ref(),
            &self.room_id,
            &self.player_id,
            &machine,
        )
        .await
        {
            Ok(_) => {}
            Err(GameError::Store(StoreError::Conflict { .. })) => {
                debug!("room {} changed under the transition, retrying", self.room_id);
            }
            Err(e) => warn!("transition in room {} failed: {}", self.room_id, e),
        }
    }
}

struct SyncSlot {
    sessions: usize,
    task: JoinHandle<()>,
}

/// Keeps at most one `RoomSync` per (room, participant), however many
/// sockets that participant has open.
#[derive(Default)]
pub struct SyncRegistry {
    slots: Mutex<HashMap<(String, String), SyncSlot>>,
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one more session, starting the driver if none is live.
    pub async fn attach(&self, store: Arc<dyn RoomStore>, room_id: &str, player_id: &str) {
        let spawn = || {
            RoomSync::new(store.clone(), room_id.to_string(), player_id.to_string()).spawn()
        };
        let mut slots = self.slots.lock().await;
        let slot = slots
            .entry((room_id.to_string(), player_id.to_string()))
            .or_insert_with(|| SyncSlot {
                sessions: 0,
                task: spawn(),
            });
        if slot.task.is_finished() {
            slot.task = spawn();
        }
        slot.sessions += 1;
    }

    /// Drops one session; the last one out stops the driver.
    pub async fn detach(&self, room_id: &str, player_id: &str) {
        let key = (room_id.to_string(), player_id.to_string());
        let mut slots = self.slots.lock().await;
        let idle = match slots.get_mut(&key) {
            Some(slot) => {
                slot.sessions = slot.sessions.saturating_sub(1);
                slot.sessions == 0
            }
            None => false,
        };
        if idle {
            if let Some(slot) = slots.remove(&key) {
                slot.task.abort();
            }
        }
    }

    pub async fn sessions(&self, room_id: &str, player_id: &str) -> usize {
        let key = (room_id.to_string(), player_id.to_string());
        self.slots
            .lock()
            .await
            .get(&key)
            .map_or(0, |slot| slot.sessions)
    }
}

/// Repairs a `host_id` that names nobody: the earliest remaining joiner
/// takes over, and an empty room is finished. Returns the corrected room,
/// or `None` when nothing was owed or someone else fixed it first.
pub async fn migrate_host(store: &dyn RoomStore, room: &Room) -> Result<Option<Room>, GameError> {
    let patch = if room.players.is_empty() {
        if room.status == RoomStatus::Finished {
            return Ok(None);
        }
        RoomPatch::SetStatus(RoomStatus::Finished)
    } else {
        match room.migration_candidate() {
            Some(candidate) => RoomPatch::SetHost(candidate.id.clone()),
            None => return Ok(None),
        }
    };

    match store
        .update(&room.room_id, vec![patch], Some(room.revision))
        .await
    {
        Ok(fixed) => {
            info!("room {} host is now {}", fixed.room_id, fixed.host_id);
            Ok(Some(fixed))
        }
        Err(StoreError::Conflict { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::player::Player;
    use crate::store::MemoryStore;

    fn room_with(ids: &[&str]) -> Room {
        let mut room = Room::new(
            "r1".into(),
            "HOSTED".into(),
            "Test".into(),
            8,
            Player::new(ids[0], ids[0]),
        );
        for id in &ids[1..] {
            room.players.push(Player::new(*id, *id));
        }
        room
    }

    #[tokio::test]
    async fn missing_host_passes_to_first_joiner() {
        let store = MemoryStore::new();
        store.create_room(room_with(&["a", "b", "c"])).await.unwrap();
        let room = store
            .update("r1", vec![RoomPatch::RemovePlayer("a".into())], None)
            .await
            .unwrap();

        let fixed = migrate_host(&store, &room).await.unwrap().unwrap();
        assert_eq!(fixed.host_id, "b");
        assert!(migrate_host(&store, &fixed).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_correction_loses_to_the_first_one() {
        let store = MemoryStore::new();
        store.create_room(room_with(&["a", "b", "c"])).await.unwrap();
        let room = store
            .update("r1", vec![RoomPatch::RemovePlayer("a".into())], None)
            .await
            .unwrap();

        migrate_host(&store, &room).await.unwrap();
        // A second observer acting on the same snapshot changes nothing.
        assert!(migrate_host(&store, &room).await.unwrap().is_none());
        assert_eq!(store.get_room("r1").await.unwrap().host_id, "b");
    }

    #[tokio::test]
    async fn empty_room_is_finished() {
        let store = MemoryStore::new();
        store.create_room(room_with(&["a"])).await.unwrap();
        let room = store
            .update("r1", vec![RoomPatch::RemovePlayer("a".into())], None)
            .await
            .unwrap();
        let fixed = migrate_host(&store, &room).await.unwrap().unwrap();
        assert_eq!(fixed.status, RoomStatus::Finished);
    }

    fn playing(timer: i64) -> Room {
        use crate::models::{game::GameState, role::Role};
        let mut room = room_with(&["a", "b", "c", "d", "e"]);
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
        room.game_state.timer = timer;
        room
    }

    #[tokio::test(start_paused = true)]
    async fn host_counts_down_then_advances() {
        use crate::models::game::GamePhase;
        let store: Arc<dyn RoomStore> = Arc::new(MemoryStore::new());
        store.create_room(playing(2)).await.unwrap();

        let handle = RoomSync::new(store.clone(), "r1".into(), "a".into()).spawn();
        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(store.get_room("r1").await.unwrap().game_state.timer, 2);

        time::sleep(Duration::from_millis(1000)).await;
        let room = store.get_room("r1").await.unwrap();
        assert_eq!(room.game_state.phase, GamePhase::Night);
        assert_eq!(room.game_state.timer, 1);

        // Reaching zero and moving on happen in the same second.
        time::sleep(Duration::from_millis(1000)).await;
        let room = store.get_room("r1").await.unwrap();
        assert_eq!(room.game_state.phase, GamePhase::MorningResult);
        assert_eq!(room.game_state.timer, 7);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn a_one_second_phase_lasts_one_second() {
        use crate::models::game::GamePhase;
        let store: Arc<dyn RoomStore> = Arc::new(MemoryStore::new());
        store.create_room(playing(1)).await.unwrap();

        let handle = RoomSync::new(store.clone(), "r1".into(), "a".into()).spawn();
        time::sleep(Duration::from_millis(900)).await;
        assert_eq!(
            store.get_room("r1").await.unwrap().game_state.phase,
            GamePhase::Night
        );
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            store.get_room("r1").await.unwrap().game_state.phase,
            GamePhase::MorningResult
        );
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn two_sockets_share_one_clock() {
        let store: Arc<dyn RoomStore> = Arc::new(MemoryStore::new());
        store.create_room(playing(5)).await.unwrap();
        let registry = SyncRegistry::new();

        registry.attach(store.clone(), "r1", "a").await;
        registry.attach(store.clone(), "r1", "a").await;
        assert_eq!(registry.sessions("r1", "a").await, 2);
        time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(store.get_room("r1").await.unwrap().game_state.timer, 3);

        // One socket closing leaves the other's clock running.
        registry.detach("r1", "a").await;
        time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(store.get_room("r1").await.unwrap().game_state.timer, 2);

        registry.detach("r1", "a").await;
        assert_eq!(registry.sessions("r1", "a").await, 0);
        time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(store.get_room("r1").await.unwrap().game_state.timer, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn watchers_leave_the_timer_alone() {
        let store: Arc<dyn RoomStore> = Arc::new(MemoryStore::new());
        store.create_room(playing(5)).await.unwrap();

        let handle = RoomSync::new(store.clone(), "r1".into(), "b".into()).spawn();
        time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(store.get_room("r1").await.unwrap().game_state.timer, 5);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn a_watcher_repairs_a_departed_host() {
        let store: Arc<dyn RoomStore> = Arc::new(MemoryStore::new());
        store.create_room(room_with(&["a", "b", "c"])).await.unwrap();

        let handle = RoomSync::new(store.clone(), "r1".into(), "c".into()).spawn();
        time::sleep(Duration::from_millis(10)).await;
        store
            .update("r1", vec![RoomPatch::RemovePlayer("a".into())], None)
            .await
            .unwrap();
        time::sleep(Duration::from_millis(10)).await;

        assert_eq!(store.get_room("r1").await.unwrap().host_id, "b");
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn sync_ends_with_the_match() {
        let store: Arc<dyn RoomStore> = Arc::new(MemoryStore::new());
        store.create_room(playing(30)).await.unwrap();

        let handle = RoomSync::new(store.clone(), "r1".into(), "a".into()).spawn();
        time::sleep(Duration::from_millis(10)).await;
        store
            .update("r1", vec![RoomPatch::SetStatus(RoomStatus::Finished)], None)
            .await
            .unwrap();

        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sync should stop once the room is finished")
            .unwrap();
    }
}
