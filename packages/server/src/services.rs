pub mod game_service;
pub mod host_sync;
pub mod phase_machine;
pub mod resolution;
pub mod role_assignment;
pub mod room_service;
pub mod win_condition;
