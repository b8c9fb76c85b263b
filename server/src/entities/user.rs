// gore_server/server/src/entities/user.rs
use crate::core::types::{CharacterId, ConnectionId, MapId, Timestamp};
use crate::network::connection::ConnectionSender;
use bytes::Bytes;

/// A connected player. The playable character itself lives on `map`.
#[derive(Debug, Clone)]
pub struct User {
    name: String,
    pub connection: ConnectionId,
    pub character: CharacterId,
    pub map: MapId,
    pub joined_at: Timestamp,
    sender: ConnectionSender,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        connection: ConnectionId,
        character: CharacterId,
        map: MapId,
        sender: ConnectionSender,
        joined_at: Timestamp,
    ) -> Self {
        User { name: name.into(), connection, character, map, joined_at, sender }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues a reliable packet. Returns `false` once the connection is gone.
    pub fn send(&self, data: Bytes) -> bool {
        self.sender.send(data)
    }
}
