// gore_server/server/src/systems/mod.rs
pub mod ai;
pub mod physics;
pub mod respawn;
