// gore_server/server/src/concurrent/mod.rs
pub mod dispose_queue;
pub mod event_queue;
pub mod receive_queue;
pub mod spatial_index;
pub mod wall_spatial_index;
