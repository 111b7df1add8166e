use dotenvy::dotenv;
use std::sync::Once;

use crate::models::player::Player;
use crate::models::room::Room;
use crate::store::RoomStore;

static INIT: Once = Once::new();

pub fn setup_test_env() {
    INIT.call_once(|| {
        dotenv().ok();
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Stores a waiting room seated with `p0`..`p{n-1}` (host `p0`) and
/// returns its id.
pub async fn seed_waiting_room(store: &dyn RoomStore, players: usize) -> String {
    let room_id = uuid::Uuid::new_v4().to_string();
    let mut room = Room::new(
        room_id.clone(),
        room_id[..6].to_uppercase(),
        "Test Room".to_string(),
        players.max(5),
        Player::new("p0", "Player0"),
    );
    for i in 1..players {
        room.players
            .push(Player::new(format!("p{i}"), format!("Player{i}")));
    }
    match store.create_room(room).await {
        Ok(room) => room.room_id,
        Err(e) => panic!("failed to seed room: {e}"),
    }
}
