use server::{
    error::{GameError, StoreError},
    models::{
        config::GameConfig,
        game::GamePhase,
        role::{Faction, Role},
        room::{ActionKey, Room, RoomStatus},
    },
    services::{game_service, phase_machine::PhaseMachine, room_service},
    store::{MemoryStore, RoomPatch, RoomStore},
    utils::test_setup::{seed_waiting_room, setup_test_env},
};

fn holder(room: &Room, role: Role) -> String {
    room.players
        .iter()
        .find(|p| p.role == Some(role))
        .map(|p| p.id.clone())
        .expect("role was dealt")
}

/// Lets the current countdown run out, as the host loop would.
async fn expire_timer(store: &MemoryStore, room_id: &str) {
    let room = store.get_room(room_id).await.unwrap();
    store
        .update(
            room_id,
            vec![RoomPatch::IncrementTimer(-room.game_state.timer)],
            None,
        )
        .await
        .unwrap();
}

async fn advance_to(store: &MemoryStore, room_id: &str, host: &str, phase: GamePhase) -> Room {
    let machine = PhaseMachine::new(GameConfig::default());
    let mut room = store.get_room(room_id).await.unwrap();
    while room.game_state.phase != phase {
        expire_timer(store, room_id).await;
        room = game_service::advance_phase(store, room_id, host, &machine)
            .await
            .unwrap();
    }
    room
}

#[tokio::test]
async fn test_every_table_size_is_fully_dealt() {
    setup_test_env();
    let store = MemoryStore::new();
    for n in 5..=12 {
        let room_id = seed_waiting_room(&store, n).await;
        let room = game_service::start_game(&store, &room_id, "p0").await.unwrap();
        assert_eq!(room.players.len(), n);
        assert!(room.players.iter().all(|p| p.role.is_some() && p.alive));
        let wolves = room.players.iter().filter(|p| p.is_werewolf()).count();
        assert_eq!(wolves, 1);
        assert_eq!(room.game_state.phase, GamePhase::Night);
        assert_eq!(room.game_state.day, 1);
    }
}

#[tokio::test]
async fn test_full_match_ends_with_a_village_win() {
    setup_test_env();
    let store = MemoryStore::new();
    let room_id = seed_waiting_room(&store, 5).await;
    let room = game_service::start_game(&store, &room_id, "p0").await.unwrap();

    let wolf = holder(&room, Role::Werewolf);
    let doctor = holder(&room, Role::Doctor);
    let seer = holder(&room, Role::Seer);
    let victim = holder(&room, Role::Villager);

    game_service::submit_action(&store, &room_id, &wolf, ActionKey::Kill, &victim)
        .await
        .unwrap();
    game_service::submit_action(&store, &room_id, &doctor, ActionKey::Protect, &doctor)
        .await
        .unwrap();
    let peek = game_service::submit_action(&store, &room_id, &seer, ActionKey::See, &wolf)
        .await
        .unwrap();
    assert_eq!(peek.revealed, Some(Role::Werewolf));

    let morning = advance_to(&store, &room_id, "p0", GamePhase::MorningResult).await;
    assert!(!morning.player(&victim).unwrap().alive);
    assert_eq!(
        morning.game_state.last_night_victim.as_ref().map(|p| p.id.as_str()),
        Some(victim.as_str())
    );
    assert!(morning.pending_actions.is_empty());

    let vote = advance_to(&store, &room_id, "p0", GamePhase::Vote).await;
    for voter in vote.players.iter().filter(|p| p.alive) {
        let target = if voter.id == wolf { &seer } else { &wolf };
        game_service::submit_vote(&store, &room_id, &voter.id, target)
            .await
            .unwrap();
    }
    let err = game_service::submit_vote(&store, &room_id, &victim, &wolf)
        .await
        .unwrap_err();
    assert_eq!(err, GameError::PlayerDead(victim.clone()));

    let end = advance_to(&store, &room_id, "p0", GamePhase::EliminationResult).await;
    assert_eq!(end.winner, Some(Faction::Villagers));
    assert_eq!(end.status, RoomStatus::Finished);
    assert!(!end.player(&wolf).unwrap().alive);
    assert_eq!(
        game_service::check_winner(&store, &room_id).await.unwrap(),
        Some(Faction::Villagers)
    );

    let history = store.history(20).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].days, 1);
    let wolf_stats = store.stats(&wolf).await.unwrap().unwrap();
    assert_eq!((wolf_stats.wins, wolf_stats.losses), (0, 1));
    // Dead villagers still share the win.
    let victim_stats = store.stats(&victim).await.unwrap().unwrap();
    assert_eq!((victim_stats.wins, victim_stats.losses), (1, 0));
}

#[tokio::test]
async fn test_late_vote_is_not_lost_to_a_stale_transition() {
    setup_test_env();
    let store = MemoryStore::new();
    let room_id = seed_waiting_room(&store, 5).await;
    let room = game_service::start_game(&store, &room_id, "p0").await.unwrap();
    let wolf = holder(&room, Role::Werewolf);
    let seer = holder(&room, Role::Seer);
    advance_to(&store, &room_id, "p0", GamePhase::Vote).await;
    expire_timer(&store, &room_id).await;

    let machine = PhaseMachine::new(GameConfig::default());
    let read = store.get_room(&room_id).await.unwrap();
    let stale = machine.advance(&read).unwrap();

    game_service::submit_vote(&store, &room_id, &seer, &wolf)
        .await
        .unwrap();

    let err = store
        .update(&room_id, stale.into_patches(), Some(read.revision))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    let committed = game_service::advance_phase(&store, &room_id, "p0", &machine)
        .await
        .unwrap();
    assert_eq!(
        committed.game_state.last_voted_out.as_ref().map(|p| p.id.as_str()),
        Some(wolf.as_str())
    );
    assert!(committed.votes.is_empty());
}

#[tokio::test]
async fn test_host_leaving_mid_match_hands_over_the_clock() {
    setup_test_env();
    let store = MemoryStore::new();
    let room_id = seed_waiting_room(&store, 6).await;
    game_service::start_game(&store, &room_id, "p0").await.unwrap();

    let room = room_service::leave_room(&store, &room_id, "p0").await.unwrap();
    assert_eq!(room.host_id, "p1");
    assert_eq!(room.status, RoomStatus::Playing);

    expire_timer(&store, &room_id).await;
    let machine = PhaseMachine::new(GameConfig::default());
    let err = game_service::advance_phase(&store, &room_id, "p0", &machine)
        .await
        .unwrap_err();
    assert_eq!(err, GameError::NotHost);
    let room = game_service::advance_phase(&store, &room_id, "p1", &machine)
        .await
        .unwrap();
    assert_eq!(room.game_state.phase, GamePhase::MorningResult);
}
