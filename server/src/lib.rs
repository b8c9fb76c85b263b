// gore_server/server/src/lib.rs

pub mod core;
pub mod concurrent;
pub mod entities;
pub mod world;
pub mod server;
pub mod network;
pub mod operational;
pub mod persistence;
pub mod systems;

pub use crate::core::config::ServerConfig;
pub use crate::core::error::{ServerError, ServerResult};
pub use crate::server::instance::GameServer;
pub use crate::world::World;
