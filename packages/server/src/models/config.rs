use serde::{Deserialize, Serialize};

use super::{
    game::GamePhase,
    role::Role,
    room::{MAX_PLAYERS, MIN_PLAYERS},
};
use crate::error::GameError;

/// The global game configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub durations: PhaseDurations,
    pub roles: RoleConfig,
    #[serde(default)]
    pub win_rule: WinRule,
}

/// Seconds spent in each phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub night: u64,
    pub morning_result: u64,
    pub discuss: u64,
    pub vote: u64,
    pub elimination_result: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub min_players: usize,
    #[serde(default)]
    pub plan: RolePlan,
    pub counts: RoleCounts,
    #[serde(default)]
    pub distributions: Vec<Distribution>,
}

/// Which part of [`RoleConfig`] decides the role pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolePlan {
    #[default]
    Counts,
    Distribution,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCounts {
    pub werewolves: usize,
    pub seer: usize,
    pub doctor: usize,
    #[serde(default)]
    pub hunter: usize,
    #[serde(default)]
    pub guardian: usize,
}

/// A fixed role pool used for every table of up to `max_players`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub max_players: usize,
    pub pool: Vec<Role>,
}

/// When the werewolves are declared the winners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinRule {
    /// Living werewolves can no longer be outnumbered (`w >= v`).
    #[default]
    Parity,
    /// Every non-werewolf is dead.
    Elimination,
}

impl PhaseDurations {
    pub fn for_phase(&self, phase: GamePhase) -> u64 {
        match phase {
            GamePhase::Waiting => 0,
            GamePhase::Night => self.night,
            GamePhase::MorningResult => self.morning_result,
            GamePhase::Discuss => self.discuss,
            GamePhase::Vote => self.vote,
            GamePhase::EliminationResult => self.elimination_result,
        }
    }

    /// The countdown value a phase starts with.
    pub fn timer_for(&self, phase: GamePhase) -> i64 {
        i64::try_from(self.for_phase(phase)).unwrap_or(i64::MAX)
    }
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            night: 30,
            morning_result: 7,
            discuss: 60,
            vote: 15,
            elimination_result: 7,
        }
    }
}

impl RoleCounts {
    /// Number of non-villager seats this configuration asks for. Saturates
    /// instead of wrapping.
    pub fn specials(&self) -> usize {
        [
            self.werewolves,
            self.seer,
            self.doctor,
            self.hunter,
            self.guardian,
        ]
        .into_iter()
        .try_fold(0usize, usize::checked_add)
        .unwrap_or(usize::MAX)
    }
}

impl Default for RoleConfig {
    fn default() -> Self {
        use Role::*;
        Self {
            min_players: MIN_PLAYERS,
            plan: RolePlan::Counts,
            counts: RoleCounts {
                werewolves: 1,
                seer: 1,
                doctor: 1,
                hunter: 0,
                guardian: 0,
            },
            distributions: vec![
                Distribution {
                    max_players: 6,
                    pool: vec![Werewolf, Seer, Villager, Villager, Villager, Villager],
                },
                Distribution {
                    max_players: 8,
                    pool: vec![
                        Werewolf, Werewolf, Seer, Doctor, Villager, Villager, Villager, Villager,
                    ],
                },
                Distribution {
                    max_players: 12,
                    pool: vec![
                        Werewolf, Werewolf, Werewolf, Seer, Doctor, Villager, Villager, Villager,
                        Villager, Villager, Villager, Villager,
                    ],
                },
            ],
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            durations: PhaseDurations::default(),
            roles: RoleConfig::default(),
            win_rule: WinRule::default(),
        }
    }
}

/// Upper bound for a single phase, one hour.
pub const MAX_PHASE_SECONDS: u64 = 3600;

impl GameConfig {
    pub fn validate(&self) -> Result<(), GameError> {
        let d = &self.durations;
        let all = [d.night, d.morning_result, d.discuss, d.vote, d.elimination_result];
        if all.contains(&0) {
            return Err(GameError::InvalidConfig(
                "every phase needs a duration of at least one second".into(),
            ));
        }
        if all.iter().any(|secs| *secs > MAX_PHASE_SECONDS) {
            return Err(GameError::InvalidConfig(format!(
                "phases may last at most {MAX_PHASE_SECONDS} seconds"
            )));
        }
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&self.roles.min_players) {
            return Err(GameError::InvalidConfig(format!(
                "min_players must be between {MIN_PLAYERS} and {MAX_PLAYERS}"
            )));
        }
        match self.roles.plan {
            RolePlan::Counts => {
                if self.roles.counts.werewolves == 0 {
                    return Err(GameError::InvalidConfig(
                        "at least one werewolf is required".into(),
                    ));
                }
                if self.roles.counts.specials() > MAX_PLAYERS {
                    return Err(GameError::InvalidConfig(format!(
                        "special roles cannot exceed {MAX_PLAYERS} seats"
                    )));
                }
            }
            RolePlan::Distribution => {
                for dist in &self.roles.distributions {
                    if !dist.pool.contains(&Role::Werewolf) {
                        return Err(GameError::InvalidConfig(format!(
                            "distribution for {} players has no werewolf",
                            dist.max_players
                        )));
                    }
                }
                let covers_all = self
                    .roles
                    .distributions
                    .iter()
                    .any(|d| d.max_players >= MAX_PLAYERS);
                if !covers_all {
                    return Err(GameError::InvalidConfig(format!(
                        "distributions must cover tables of {MAX_PLAYERS} players"
                    )));
                }
            }
        }
        Ok(())
    }
}
