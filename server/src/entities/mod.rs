// gore_server/server/src/entities/mod.rs
pub mod character;
pub mod inventory;
pub mod item;
pub mod stats;
pub mod template;
pub mod user;
