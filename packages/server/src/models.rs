pub mod chat;
pub mod config;
pub mod game;
pub mod history;
pub mod player;
pub mod role;
pub mod room;
