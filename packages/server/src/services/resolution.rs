use std::collections::{BTreeMap, HashMap};

use crate::models::{
    player::Player,
    role::Ability,
    room::ActionKey,
};

/// Result of resolving one night's concealed actions.
#[derive(Debug, Clone, PartialEq)]
pub struct NightOutcome {
    pub players: Vec<Player>,
    pub victim: Option<Player>,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteTally {
    Eliminated { target_id: String, votes: usize },
    /// Two or more targets share the highest count.
    Tie { target_ids: Vec<String>, votes: usize },
    NoVotes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoteOutcome {
    pub players: Vec<Player>,
    pub voted_out: Option<Player>,
    pub tally: VoteTally,
    pub logs: Vec<String>,
}

pub fn resolve_night(players: &[Player], actions: &HashMap<ActionKey, String>) -> NightOutcome {
    let mut players = players.to_vec();
    let mut logs = Vec::new();

    let kill = actions.get(&ActionKey::Kill);
    let protect = actions.get(&ActionKey::Protect);
    let guard = actions.get(&ActionKey::Guard);

    // Either defence alone cancels the kill.
    let victim_id = kill
        .filter(|target| Some(*target) != protect && Some(*target) != guard)
        .filter(|target| players.iter().any(|p| &p.id == *target && p.alive))
        .cloned();

    for guardian in players
        .iter_mut()
        .filter(|p| p.alive && p.role.map(|r| r.ability()) == Some(Ability::ProtectNoRepeat))
    {
        guardian.last_protected = guard.cloned();
    }

    let victim = match victim_id {
        Some(victim_id) => {
            let victim = kill_player(&mut players, &victim_id);
            if let Some(victim) = &victim {
                logs.push(format!(
                    "Morning has come... {} was found dead.",
                    victim.username
                ));
                logs.extend(hunter_retaliation(
                    &mut players,
                    &victim_id,
                    actions.get(&ActionKey::HunterShot),
                ));
            }
            victim
        }
        None => None,
    };
    if victim.is_none() {
        logs.push("Morning has come... it was a peaceful night.".to_string());
    }

    NightOutcome {
        players,
        victim,
        logs,
    }
}

pub fn tally_votes(votes: &HashMap<String, String>) -> VoteTally {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for target in votes.values() {
        *counts.entry(target.as_str()).or_default() += 1;
    }

    let Some(max) = counts.values().copied().max() else {
        return VoteTally::NoVotes;
    };
    let leaders: Vec<String> = counts
        .iter()
        .filter(|(_, count)| **count == max)
        .map(|(target, _)| target.to_string())
        .collect();

    match leaders.as_slice() {
        [target_id] => VoteTally::Eliminated {
            target_id: target_id.clone(),
            votes: max,
        },
        _ => VoteTally::Tie {
            target_ids: leaders,
            votes: max,
        },
    }
}

/// Tallies the day vote and applies the elimination. Ballots cast by or for
/// anyone no longer alive in `players` are ignored.
pub fn resolve_vote(
    players: &[Player],
    votes: &HashMap<String, String>,
    hunter_shot: Option<&String>,
) -> VoteOutcome {
    let mut players = players.to_vec();
    let is_alive = |id: &str| players.iter().any(|p| p.id == id && p.alive);
    let valid: HashMap<String, String> = votes
        .iter()
        .filter(|(voter, target)| is_alive(voter) && is_alive(target))
        .map(|(voter, target)| (voter.clone(), target.clone()))
        .collect();

    let tally = tally_votes(&valid);
    let mut logs = Vec::new();
    let voted_out = match &tally {
        VoteTally::Eliminated { target_id, .. } => {
            let voted_out = kill_player(&mut players, target_id);
            if let Some(voted_out) = &voted_out {
                logs.push(format!(
                    "The village has voted... {} was executed.",
                    voted_out.username
                ));
                logs.extend(hunter_retaliation(&mut players, target_id, hunter_shot));
            }
            voted_out
        }
        VoteTally::Tie { .. } => {
            logs.push("The vote was tied... nobody was executed.".to_string());
            None
        }
        VoteTally::NoVotes => {
            logs.push("Nobody voted... the village could not decide.".to_string());
            None
        }
    };

    VoteOutcome {
        players,
        voted_out,
        tally,
        logs,
    }
}

fn kill_player(players: &mut [Player], player_id: &str) -> Option<Player> {
    let player = players.iter_mut().find(|p| p.id == player_id && p.alive)?;
    player.alive = false;
    Some(player.clone())
}

/// Fires the dead hunter's last shot, at most once per match. Returns the
/// log line when somebody was taken down.
fn hunter_retaliation(
    players: &mut [Player],
    dead_id: &str,
    shot: Option<&String>,
) -> Option<String> {
    let target_id = shot.filter(|t| t.as_str() != dead_id)?;
    let hunter = players.iter().find(|p| p.id == dead_id)?;
    if hunter.role.map(|r| r.ability()) != Some(Ability::DeathRetaliation) || hunter.has_fired {
        return None;
    }
    let hunter_name = hunter.username.clone();

    let target = kill_player(players, target_id)?;
    if let Some(hunter) = players.iter_mut().find(|p| p.id == dead_id) {
        hunter.has_fired = true;
    }
    Some(format!(
        "{} the Hunter fired a last shot... {} was taken down.",
        hunter_name, target.username
    ))
}
