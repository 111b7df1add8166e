use crate::models::{config::WinRule, player::Player, role::Faction};

/// Decides the match from the living players, or `None` while it goes on.
pub fn check_winner(players: &[Player], rule: WinRule) -> Option<Faction> {
    let (wolves, others) = players
        .iter()
        .filter(|p| p.alive)
        .fold((0usize, 0usize), |(w, v), p| {
            match p.role.map(|r| r.faction()) {
                Some(Faction::Werewolves) => (w + 1, v),
                _ => (w, v + 1),
            }
        });

    if wolves == 0 {
        return Some(Faction::Villagers);
    }
    let wolves_win = match rule {
        WinRule::Parity => wolves >= others,
        WinRule::Elimination => others == 0,
    };
    wolves_win.then_some(Faction::Werewolves)
}
