use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::role::Role;

const ADJECTIVES: [&str; 10] = [
    "Silent", "Hungry", "Mystic", "Brave", "Cunning", "Swift", "Shadow", "Ancient", "Lone", "Wild",
];
const NOUNS: [&str; 10] = [
    "Wolf", "Hunter", "Seer", "Villager", "Guardian", "Witch", "Ghost", "Stalker", "Alpha", "Omega",
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub username: String,
    pub avatar: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default = "default_alive")]
    pub alive: bool,
    #[serde(default)]
    pub is_ready: bool,
    /// Guardian memory: who was guarded last night.
    #[serde(default)]
    pub last_protected: Option<String>,
    /// Hunter one-shot guard.
    #[serde(default)]
    pub has_fired: bool,
}

fn default_alive() -> bool {
    true
}

impl Player {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            avatar: generate_avatar(&id),
            id,
            username: username.into(),
            role: None,
            alive: true,
            is_ready: false,
            last_protected: None,
            has_fired: false,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn is_werewolf(&self) -> bool {
        self.role == Some(Role::Werewolf)
    }
}

/// Builds a guest name such as `CunningGhost417`.
pub fn generate_username<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adj = ADJECTIVES.choose(rng).copied().unwrap_or("Lone");
    let noun = NOUNS.choose(rng).copied().unwrap_or("Wolf");
    let num = rng.gen_range(100..1000);
    format!("{adj}{noun}{num}")
}

pub fn generate_avatar(seed: &str) -> String {
    format!(
        "https://api.dicebear.com/7.x/avataaars/svg?seed={}&backgroundColor=b6e3f4,c0aede,d1d4f9",
        seed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generated_usernames_end_in_three_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let name = generate_username(&mut rng);
            let digits: String = name.chars().rev().take(3).collect();
            assert!(digits.chars().all(|c| c.is_ascii_digit()), "{name}");
            assert!(ADJECTIVES.iter().any(|a| name.starts_with(a)), "{name}");
        }
    }

    #[test]
    fn missing_fields_take_lobby_defaults() {
        let player: Player =
            serde_json::from_str(r#"{"id":"p1","username":"Ann","avatar":""}"#).unwrap();
        assert!(player.alive);
        assert!(!player.has_fired);
        assert_eq!(player.role, None);
    }
}
