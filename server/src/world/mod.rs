// gore_server/server/src/world/mod.rs
pub mod context;
pub mod map;
pub mod map_loader;
mod game_world;

pub use game_world::{UpdateOutcome, UserAction, World, WorldStats};
