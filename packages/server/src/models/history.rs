use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    role::{Faction, Role},
    room::Room,
};

/// Summary of a finished match, appended to the history feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub room_id: String,
    pub room_name: String,
    pub winner: Faction,
    pub days: u32,
    pub players: Vec<MatchParticipant>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchParticipant {
    pub id: String,
    pub username: String,
    pub role: Option<Role>,
    pub alive: bool,
}

/// Per-identity counters kept next to the identity service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub username: String,
    pub avatar: String,
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub last_played: Option<DateTime<Utc>>,
}

impl MatchSummary {
    pub fn from_room(room: &Room, winner: Faction) -> Self {
        MatchSummary {
            room_id: room.room_id.clone(),
            room_name: room.name.clone(),
            winner,
            days: room.game_state.day,
            players: room
                .players
                .iter()
                .map(|p| MatchParticipant {
                    id: p.id.clone(),
                    username: p.username.clone(),
                    role: p.role,
                    alive: p.alive,
                })
                .collect(),
            timestamp: Utc::now(),
        }
    }

    pub fn won(&self, participant: &MatchParticipant) -> bool {
        participant.role.map(Role::faction) == Some(self.winner)
    }
}
