use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::GameError,
    models::{
        game::{GamePhase, GameState},
        history::MatchSummary,
        role::{Ability, Faction, Role},
        room::{ActionKey, Room, RoomStatus},
    },
    services::{
        phase_machine::PhaseMachine,
        role_assignment::{assign_roles, build_role_pool},
        win_condition,
    },
    store::{RoomPatch, RoomStore},
};

/// What the actor learns back from a concealed action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionReceipt {
    pub key: ActionKey,
    pub target_id: String,
    /// Only set for a seer's peek.
    pub revealed: Option<Role>,
}

fn required_ability(key: ActionKey) -> Ability {
    match key {
        ActionKey::Kill => Ability::KillVote,
        ActionKey::Protect => Ability::Protect,
        ActionKey::Guard => Ability::ProtectNoRepeat,
        ActionKey::See => Ability::Peek,
        ActionKey::HunterShot => Ability::DeathRetaliation,
    }
}

fn ensure_in_progress(room: &Room) -> Result<(), GameError> {
    match room.status {
        RoomStatus::Waiting => Err(GameError::InvalidPhase(GamePhase::Waiting)),
        RoomStatus::Finished => Err(GameError::GameOver),
        RoomStatus::Playing if room.winner.is_some() => Err(GameError::GameOver),
        RoomStatus::Playing => Ok(()),
    }
}

/// Deals roles and opens night 1. Host only.
pub async fn start_game(
    store: &dyn RoomStore,
    room_id: &str,
    actor_id: &str,
) -> Result<Room, GameError> {
    let room = store.get_room(room_id).await?;
    if room.host_id != actor_id {
        return Err(GameError::NotHost);
    }
    if room.status != RoomStatus::Waiting {
        return Err(GameError::AlreadyStarted);
    }

    let config = store.load_config().await?;
    config.validate()?;
    let required = config.roles.min_players;
    if room.players.len() < required {
        return Err(GameError::NotEnoughPlayers {
            required,
            actual: room.players.len(),
        });
    }

    let pool = build_role_pool(room.players.len(), &config.roles)?;
    let players = {
        let mut rng = rand::thread_rng();
        assign_roles(&room.players, pool, &mut rng)?
    };

    // Pinned to the read revision so nobody joins a table that was just dealt.
    let started = store
        .update(
            room_id,
            vec![
                RoomPatch::SetPlayers(players),
                RoomPatch::SetStatus(RoomStatus::Playing),
                RoomPatch::SetGameState(GameState::first_night(config.durations.night)),
                RoomPatch::SetWinner(None),
                RoomPatch::ClearVotes,
                RoomPatch::ClearActions,
            ],
            Some(room.revision),
        )
        .await?;
    info!(
        "room {} started with {} players",
        room_id,
        started.players.len()
    );
    Ok(started)
}

/// The phase state as `viewer_id` may see it.
pub async fn get_game_state(
    store: &dyn RoomStore,
    room_id: &str,
    viewer_id: &str,
) -> Result<GameState, GameError> {
    let room = store.get_room(room_id).await?;
    Ok(room.view_for(viewer_id).game_state)
}

/// Casts `voter_id`'s ballot as an isolated field write.
pub async fn submit_vote(
    store: &dyn RoomStore,
    room_id: &str,
    voter_id: &str,
    target_id: &str,
) -> Result<(), GameError> {
    let room = store.get_room(room_id).await?;
    ensure_in_progress(&room)?;
    if room.game_state.phase != GamePhase::Vote {
        return Err(GameError::InvalidPhase(room.game_state.phase));
    }
    let voter = room
        .player(voter_id)
        .ok_or_else(|| GameError::NotInRoom(voter_id.to_string()))?;
    if !voter.alive {
        return Err(GameError::PlayerDead(voter_id.to_string()));
    }
    if target_id == voter_id || room.alive_player(target_id).is_none() {
        return Err(GameError::InvalidTarget(target_id.to_string()));
    }

    store
        .update(
            room_id,
            vec![RoomPatch::SetVote {
                voter_id: voter_id.to_string(),
                target_id: target_id.to_string(),
            }],
            None,
        )
        .await?;
    Ok(())
}

/// Records a concealed ability use after checking role, phase and target.
pub async fn submit_action(
    store: &dyn RoomStore,
    room_id: &str,
    actor_id: &str,
    key: ActionKey,
    target_id: &str,
) -> Result<ActionReceipt, GameError> {
    let room = store.get_room(room_id).await?;
    ensure_in_progress(&room)?;

    let phase = room.game_state.phase;
    let phase_ok = match key {
        ActionKey::HunterShot => matches!(phase, GamePhase::Night | GamePhase::Vote),
        _ => phase == GamePhase::Night,
    };
    if !phase_ok {
        return Err(GameError::InvalidPhase(phase));
    }

    let actor = room
        .player(actor_id)
        .ok_or_else(|| GameError::NotInRoom(actor_id.to_string()))?;
    if !actor.alive {
        return Err(GameError::PlayerDead(actor_id.to_string()));
    }
    if actor.role.map(|r| r.ability()) != Some(required_ability(key)) {
        return Err(GameError::WrongRole(key));
    }

    let target = room
        .alive_player(target_id)
        .ok_or_else(|| GameError::InvalidTarget(target_id.to_string()))?;
    match key {
        ActionKey::See | ActionKey::HunterShot if target_id == actor_id => {
            return Err(GameError::InvalidTarget(target_id.to_string()));
        }
        ActionKey::Guard if actor.last_protected.as_deref() == Some(target_id) => {
            return Err(GameError::GuardRepeat(target_id.to_string()));
        }
        ActionKey::HunterShot if actor.has_fired => return Err(GameError::AlreadyFired),
        _ => {}
    }
    let revealed = (key == ActionKey::See).then_some(target.role).flatten();

    store
        .update(
            room_id,
            vec![RoomPatch::SetAction {
                key,
                target_id: target_id.to_string(),
            }],
            None,
        )
        .await?;
    Ok(ActionReceipt {
        key,
        target_id: target_id.to_string(),
        revealed,
    })
}

/// Runs the next phase edge against a fresh read and commits it in one
/// write. Host only, and only once the timer has run out.
pub async fn advance_phase(
    store: &dyn RoomStore,
    room_id: &str,
    actor_id: &str,
    machine: &PhaseMachine,
) -> Result<Room, GameError> {
    let room = store.get_room(room_id).await?;
    if room.host_id != actor_id {
        return Err(GameError::NotHost);
    }
    ensure_in_progress(&room)?;
    if room.game_state.timer > 0 {
        return Err(GameError::TimerRunning);
    }

    let transition = machine.advance(&room)?;
    let from = transition.from;
    let winner = transition.winner;
    let committed = store
        .update(room_id, transition.into_patches(), Some(room.revision))
        .await?;
    info!(
        "room {} advanced {} -> {} (day {})",
        room_id, from, committed.game_state.phase, committed.game_state.day
    );

    if let Some(winner) = winner {
        info!("room {} finished, {} win", room_id, winner);
        // The match is already committed; bookkeeping failures are only reported.
        if let Err(e) = finalize_match(store, &committed, winner).await {
            warn!("failed to record result of room {}: {}", room_id, e);
        }
    }
    Ok(committed)
}

/// Appends the match summary and bumps every participant's counters.
pub async fn finalize_match(
    store: &dyn RoomStore,
    room: &Room,
    winner: Faction,
) -> Result<(), GameError> {
    let summary = MatchSummary::from_room(room, winner);
    for (player, participant) in room.players.iter().zip(&summary.players) {
        if participant.role.is_none() {
            continue;
        }
        store
            .record_outcome(player, summary.won(participant))
            .await?;
    }
    store.record_match(summary).await?;
    Ok(())
}

pub async fn check_winner(
    store: &dyn RoomStore,
    room_id: &str,
) -> Result<Option<Faction>, GameError> {
    let room = store.get_room(room_id).await?;
    if room.winner.is_some() || room.status != RoomStatus::Playing {
        return Ok(room.winner);
    }
    let config = store.load_config().await?;
    Ok(win_condition::check_winner(&room.players, config.win_rule))
}
