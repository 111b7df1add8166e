use crate::error::GameError;
use crate::models::{
    config::GameConfig,
    game::{GamePhase, GameState},
    player::Player,
    role::Faction,
    room::{ActionKey, Room, RoomStatus},
};
use crate::services::{
    resolution::{resolve_night, resolve_vote},
    win_condition::check_winner,
};
use crate::store::RoomPatch;

/// The complete next state produced by one phase edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: GamePhase,
    pub players: Vec<Player>,
    pub game_state: GameState,
    pub winner: Option<Faction>,
}

impl Transition {
    /// The single write that commits this transition.
    pub fn into_patches(self) -> Vec<RoomPatch> {
        let mut patches = vec![
            RoomPatch::SetPlayers(self.players),
            RoomPatch::SetGameState(self.game_state),
            RoomPatch::ClearVotes,
            RoomPatch::ClearActions,
        ];
        if let Some(winner) = self.winner {
            patches.push(RoomPatch::SetWinner(Some(winner)));
            patches.push(RoomPatch::SetStatus(RoomStatus::Finished));
        }
        patches
    }
}

pub struct PhaseMachine {
    config: GameConfig,
}

impl PhaseMachine {
    pub fn new(config: GameConfig) -> Self {
        PhaseMachine { config }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn advance(&self, room: &Room) -> Result<Transition, GameError> {
        match room.status {
            RoomStatus::Waiting => return Err(GameError::InvalidPhase(GamePhase::Waiting)),
            RoomStatus::Finished => return Err(GameError::GameOver),
            RoomStatus::Playing if room.winner.is_some() => return Err(GameError::GameOver),
            RoomStatus::Playing => {}
        }
        let from = room.game_state.phase;
        let next = from.next().ok_or(GameError::InvalidPhase(from))?;

        let mut state = room.game_state.clone();
        let mut players = room.players.clone();

        match from {
            GamePhase::Night => {
                let outcome = resolve_night(&players, &room.pending_actions);
                players = outcome.players;
                state.logs.extend(outcome.logs);
                state.last_night_victim = outcome.victim;
            }
            GamePhase::MorningResult => state.log("Discussion has started."),
            GamePhase::Discuss => state.log("Time to vote!"),
            GamePhase::Vote => {
                let outcome = resolve_vote(
                    &players,
                    &room.votes,
                    room.pending_actions.get(&ActionKey::HunterShot),
                );
                players = outcome.players;
                state.logs.extend(outcome.logs);
                state.last_voted_out = outcome.voted_out;
            }
            GamePhase::EliminationResult => {
                state.day += 1;
                state.log(format!("Night falls on day {}.", state.day));
            }
            GamePhase::Waiting => unreachable!("waiting has no successor"),
        }

        state.phase = next;
        state.timer = self.config.durations.timer_for(next);

        let winner = check_winner(&players, self.config.win_rule);
        if let Some(winner) = winner {
            state.log(format!("The game is over. The {} have won!", winner));
        }

        Ok(Transition {
            from,
            players,
            game_state: state,
            winner,
        })
    }
}
