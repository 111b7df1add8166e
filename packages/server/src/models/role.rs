use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Werewolves,
    Villagers,
}

/// What a role is allowed to do during a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    None,
    KillVote,
    Peek,
    Protect,
    /// Like `Protect`, but never the same target two nights running.
    ProtectNoRepeat,
    /// May take one other player down when dying.
    DeathRetaliation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Werewolf,
    Villager,
    Seer,
    Doctor,
    Hunter,
    Guardian,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Werewolf,
        Role::Villager,
        Role::Seer,
        Role::Doctor,
        Role::Hunter,
        Role::Guardian,
    ];

    pub fn faction(self) -> Faction {
        match self {
            Role::Werewolf => Faction::Werewolves,
            Role::Villager | Role::Seer | Role::Doctor | Role::Hunter | Role::Guardian => {
                Faction::Villagers
            }
        }
    }

    pub fn ability(self) -> Ability {
        match self {
            Role::Werewolf => Ability::KillVote,
            Role::Villager => Ability::None,
            Role::Seer => Ability::Peek,
            Role::Doctor => Ability::Protect,
            Role::Hunter => Ability::DeathRetaliation,
            Role::Guardian => Ability::ProtectNoRepeat,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Role::Werewolf => "Kill one villager every night. Don't get caught!",
            Role::Villager => "Find the werewolves and vote them out.",
            Role::Seer => "Peek at one player's role every night.",
            Role::Doctor => "Protect one player from the werewolves every night.",
            Role::Hunter => "When you die, you may shoot one other player.",
            Role::Guardian => "Protect one player, never the same one two nights in a row.",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Werewolf => write!(f, "Werewolf"),
            Role::Villager => write!(f, "Villager"),
            Role::Seer => write!(f, "Seer"),
            Role::Doctor => write!(f, "Doctor"),
            Role::Hunter => write!(f, "Hunter"),
            Role::Guardian => write!(f, "Guardian"),
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Faction::Werewolves => write!(f, "werewolves"),
            Faction::Villagers => write!(f, "villagers"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_werewolf_is_on_the_werewolf_side() {
        for role in Role::ALL {
            let expected = if role == Role::Werewolf {
                Faction::Werewolves
            } else {
                Faction::Villagers
            };
            assert_eq!(role.faction(), expected, "{role}");
        }
    }

    #[test]
    fn roles_serialize_as_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Guardian).unwrap(), "\"guardian\"");
        assert_eq!(
            serde_json::from_str::<Ability>("\"protect_no_repeat\"").unwrap(),
            Ability::ProtectNoRepeat
        );
    }
}
