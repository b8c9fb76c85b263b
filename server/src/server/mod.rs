// gore_server/server/src/server/mod.rs
pub mod game_loop;
pub mod instance;

pub use instance::{GameServer, TickReport};
