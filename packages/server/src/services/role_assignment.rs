use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::GameError;
use crate::models::{
    config::{RoleConfig, RoleCounts, RolePlan},
    player::Player,
    role::Role,
};

/// Builds the multiset of roles dealt to a table of `n` players.
pub fn build_role_pool(n: usize, roles: &RoleConfig) -> Result<Vec<Role>, GameError> {
    match roles.plan {
        RolePlan::Counts => pool_from_counts(n, &roles.counts),
        RolePlan::Distribution => {
            let dist = roles
                .distributions
                .iter()
                .filter(|d| d.max_players >= n)
                .min_by_key(|d| d.max_players)
                .ok_or_else(|| {
                    GameError::InvalidConfig(format!("no role distribution for {n} players"))
                })?;
            let mut pool: Vec<Role> = dist.pool.iter().copied().take(n).collect();
            pool.resize(n, Role::Villager);
            Ok(pool)
        }
    }
}

fn pool_from_counts(n: usize, counts: &RoleCounts) -> Result<Vec<Role>, GameError> {
    if counts.specials() > n {
        return Err(GameError::RoleOverflow {
            configured: counts.specials(),
            players: n,
        });
    }

    let mut pool = Vec::with_capacity(n);
    for (role, count) in [
        (Role::Werewolf, counts.werewolves),
        (Role::Seer, counts.seer),
        (Role::Doctor, counts.doctor),
        (Role::Hunter, counts.hunter),
        (Role::Guardian, counts.guardian),
    ] {
        pool.extend(std::iter::repeat(role).take(count));
    }
    pool.resize(n, Role::Villager);
    Ok(pool)
}

/// Shuffles `pool` uniformly and deals it to `players` in join order,
/// resetting every per-match field.
pub fn assign_roles<R: Rng + ?Sized>(
    players: &[Player],
    mut pool: Vec<Role>,
    rng: &mut R,
) -> Result<Vec<Player>, GameError> {
    if pool.len() != players.len() {
        return Err(GameError::InvalidConfig(format!(
            "role pool has {} roles for {} players",
            pool.len(),
            players.len()
        )));
    }
    // Fisher-Yates.
    pool.shuffle(rng);

    Ok(players
        .iter()
        .zip(pool)
        .map(|(player, role)| Player {
            role: Some(role),
            alive: true,
            has_fired: false,
            last_protected: None,
            ..player.clone()
        })
        .collect())
}
