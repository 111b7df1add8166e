use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::{game::GameState, player::Player, role::Faction};

pub const MIN_PLAYERS: usize = 5;
pub const MAX_PLAYERS: usize = 12;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

/// Key of a concealed night (or last-stand) action.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ActionKey {
    Kill,
    Protect,
    Guard,
    See,
    HunterShot,
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKey::Kill => "kill",
            ActionKey::Protect => "protect",
            ActionKey::Guard => "guard",
            ActionKey::See => "see",
            ActionKey::HunterShot => "hunter_shot",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub room_id: String,
    pub code: String,
    pub name: String,
    pub mode: String,
    pub max_players: usize,
    pub is_private: bool,
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
    pub host_id: String,
    pub status: RoomStatus,
    pub players: Vec<Player>,
    #[serde(default)]
    pub votes: HashMap<String, String>,
    #[serde(default)]
    pub pending_actions: HashMap<ActionKey, String>,
    pub game_state: GameState,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub winner: Option<Faction>,
    /// Bumped by the store on every write.
    #[serde(default)]
    pub revision: u64,
}

impl Room {
    pub fn new(room_id: String, code: String, name: String, max_players: usize, host: Player) -> Self {
        let mut host = host;
        host.is_ready = true;
        Room {
            room_id,
            code,
            name,
            mode: "classic".to_string(),
            max_players: max_players.clamp(MIN_PLAYERS, MAX_PLAYERS),
            is_private: false,
            password_hash: None,
            host_id: host.id.clone(),
            status: RoomStatus::Waiting,
            game_state: GameState::waiting(&host.username),
            players: vec![host],
            votes: HashMap::new(),
            pending_actions: HashMap::new(),
            created_at: Utc::now(),
            winner: None,
            revision: 0,
        }
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn is_member(&self, player_id: &str) -> bool {
        self.player(player_id).is_some()
    }

    pub fn alive_player(&self, player_id: &str) -> Option<&Player> {
        self.player(player_id).filter(|p| p.alive)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    /// Whether `host_id` names a current member. An empty room has no owed host.
    pub fn host_present(&self) -> bool {
        self.players.is_empty() || self.is_member(&self.host_id)
    }

    /// The host a migration would elect: the earliest remaining joiner.
    pub fn migration_candidate(&self) -> Option<&Player> {
        if self.host_present() {
            return None;
        }
        self.players.first()
    }

    /// A copy safe to hand to `viewer_id`: concealed actions are stripped
    /// and roles are only shown where the viewer is entitled to see them.
    pub fn view_for(&self, viewer_id: &str) -> Room {
        let mut view = self.clone();
        view.pending_actions.clear();
        if self.status == RoomStatus::Finished {
            return view;
        }
        let viewer_is_wolf = self.player(viewer_id).is_some_and(|p| p.is_werewolf());
        let redact = |player: &mut Player| {
            let visible = player.id == viewer_id || (viewer_is_wolf && player.is_werewolf());
            if !visible {
                player.role = None;
            }
        };
        view.players.iter_mut().for_each(&redact);
        view.game_state.last_night_victim.iter_mut().for_each(&redact);
        view.game_state.last_voted_out.iter_mut().for_each(&redact);
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::Role;

    fn room() -> Room {
        let mut room = Room::new(
            "r1".into(),
            "ABC123".into(),
            "Test".into(),
            8,
            Player::new("a", "Ann").with_role(Role::Werewolf),
        );
        room.players.push(Player::new("b", "Bob").with_role(Role::Werewolf));
        room.players.push(Player::new("c", "Cid").with_role(Role::Seer));
        room.pending_actions.insert(ActionKey::Kill, "c".into());
        room.status = RoomStatus::Playing;
        room
    }

    #[test]
    fn werewolves_see_each_other_but_villagers_see_only_themselves() {
        let room = room();

        let wolf_view = room.view_for("a");
        assert_eq!(wolf_view.player("b").unwrap().role, Some(Role::Werewolf));
        assert_eq!(wolf_view.player("c").unwrap().role, None);
        assert!(wolf_view.pending_actions.is_empty());

        let seer_view = room.view_for("c");
        assert_eq!(seer_view.player("a").unwrap().role, None);
        assert_eq!(seer_view.player("c").unwrap().role, Some(Role::Seer));
    }

    #[test]
    fn announced_victims_keep_their_roles_hidden() {
        let mut room = room();
        let victim = room.players.remove(2);
        room.game_state.last_night_victim = Some(Player {
            alive: false,
            ..victim.clone()
        });
        room.game_state.last_voted_out = Some(victim);

        let view = room.view_for("a");
        let state = &view.game_state;
        assert_eq!(state.last_night_victim.as_ref().unwrap().role, None);
        assert_eq!(state.last_voted_out.as_ref().unwrap().role, None);
        assert_eq!(
            room.game_state.last_night_victim.as_ref().unwrap().role,
            Some(Role::Seer)
        );

        room.status = RoomStatus::Finished;
        let view = room.view_for("a");
        assert_eq!(
            view.game_state.last_voted_out.unwrap().role,
            Some(Role::Seer)
        );
    }

    #[test]
    fn finished_rooms_reveal_every_role() {
        let mut room = room();
        room.status = RoomStatus::Finished;
        let view = room.view_for("c");
        assert!(view.players.iter().all(|p| p.role.is_some()));
    }

    #[test]
    fn migration_candidate_is_first_joiner() {
        let mut room = room();
        assert!(room.migration_candidate().is_none());
        room.players.remove(0);
        assert_eq!(room.migration_candidate().unwrap().id, "b");
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let mut room = room();
        room.password_hash = Some("secret-hash".into());
        let json = serde_json::to_string(&room).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
