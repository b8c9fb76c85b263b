// gore_server/server/src/core/mod.rs
pub mod invariant;
pub mod config;
pub mod constants;
pub mod error;
pub mod time;
pub mod types;
