use serde::{Deserialize, Serialize};
use std::fmt;

use super::player::Player;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Waiting,
    Night,
    MorningResult,
    Discuss,
    Vote,
    EliminationResult,
}

impl GamePhase {
    /// The phase that follows this one in the day/night cycle.
    pub fn next(self) -> Option<GamePhase> {
        match self {
            GamePhase::Waiting => None,
            GamePhase::Night => Some(GamePhase::MorningResult),
            GamePhase::MorningResult => Some(GamePhase::Discuss),
            GamePhase::Discuss => Some(GamePhase::Vote),
            GamePhase::Vote => Some(GamePhase::EliminationResult),
            GamePhase::EliminationResult => Some(GamePhase::Night),
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GamePhase::Waiting => "waiting",
            GamePhase::Night => "night",
            GamePhase::MorningResult => "morning_result",
            GamePhase::Discuss => "discuss",
            GamePhase::Vote => "vote",
            GamePhase::EliminationResult => "elimination_result",
        };
        f.write_str(name)
    }
}

/// The shared per-match phase state carried inside the room document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GameState {
    pub phase: GamePhase,
    pub day: u32,
    pub timer: i64,
    pub logs: Vec<String>,
    #[serde(default)]
    pub last_night_victim: Option<Player>,
    #[serde(default)]
    pub last_voted_out: Option<Player>,
}

impl GameState {
    pub fn waiting(created_by: &str) -> Self {
        GameState {
            phase: GamePhase::Waiting,
            day: 1,
            timer: 0,
            logs: vec![format!("Room created by {}", created_by)],
            last_night_victim: None,
            last_voted_out: None,
        }
    }

    pub fn first_night(night_duration: u64) -> Self {
        GameState {
            phase: GamePhase::Night,
            day: 1,
            timer: i64::try_from(night_duration).unwrap_or(i64::MAX),
            logs: vec!["The game has started. It is now night 1.".to_string()],
            last_night_victim: None,
            last_voted_out: None,
        }
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }
}

impl Default for GameState {
    fn default() -> Self {
        GameState {
            phase: GamePhase::Waiting,
            day: 1,
            timer: 0,
            logs: Vec::new(),
            last_night_victim: None,
            last_voted_out: None,
        }
    }
}
