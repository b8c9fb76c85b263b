// gore_server/server/src/network/mod.rs
pub mod codec;
pub mod connection;
pub mod packets;
pub mod tcp;
pub mod udp;
