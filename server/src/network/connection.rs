// gore_server/server/src/network/connection.rs
use crate::core::types::ConnectionId;
use ahash::AHashMap;
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Outbound half of a reliable connection. Cloneable and usable from any thread.
#[derive(Debug, Clone)]
pub struct ConnectionSender {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl ConnectionSender {
    pub fn new(tx: mpsc::UnboundedSender<Bytes>) -> Self {
        ConnectionSender { tx }
    }

    /// Sender plus the receiving end a writer task (or a test) drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionSender { tx }, rx)
    }

    /// Fire-and-forget. Returns `false` once the writer has gone away.
    pub fn send(&self, data: Bytes) -> bool {
        self.tx.send(data).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One client's reliable connection plus its binding to a user.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    remote: SocketAddr,
    /// Name of the bound user, the authoritative "who sent this".
    tag: Option<String>,
    udp_endpoint: Option<SocketAddr>,
    sender: ConnectionSender,
}

impl Connection {
    pub fn new(id: ConnectionId, remote: SocketAddr, sender: ConnectionSender) -> Self {
        Connection { id, remote, tag: None, udp_endpoint: None, sender }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn bind_user(&mut self, name: &str) {
        if let Some(old) = &self.tag {
            warn!("Connection {} rebinding from user '{}' to '{}'", self.id, old, name);
        }
        self.tag = Some(name.to_string());
    }

    pub fn clear_tag(&mut self) {
        self.tag = None;
    }

    pub fn udp_endpoint(&self) -> Option<SocketAddr> {
        self.udp_endpoint
    }

    pub fn sender(&self) -> &ConnectionSender {
        &self.sender
    }

    pub fn send(&self, data: Bytes) -> bool {
        self.sender.send(data)
    }
}

/// Live connections, with a reverse index from UDP endpoint.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    connections: AHashMap<ConnectionId, Connection>,
    by_udp: AHashMap<SocketAddr, ConnectionId>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, conn: Connection) {
        debug!("Connection {} from {} registered", conn.id, conn.remote);
        if let Some(old) = self.connections.insert(conn.id, conn) {
            warn!("Connection id {} reused; previous entry dropped", old.id);
            if let Some(ep) = old.udp_endpoint {
                self.by_udp.remove(&ep);
            }
        }
    }

    /// Removing drops the sender, which lets the writer task shut the socket.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        let conn = self.connections.remove(&id)?;
        if let Some(ep) = conn.udp_endpoint {
            self.by_udp.remove(&ep);
        }
        Some(conn)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    /// Records where a connection's datagrams come from. Returns `false` for
    /// unknown connections or an endpoint already claimed by another connection.
    pub fn bind_udp(&mut self, id: ConnectionId, endpoint: SocketAddr) -> bool {
        if let Some(&owner) = self.by_udp.get(&endpoint) {
            if owner != id {
                warn!("UDP endpoint {} already bound to connection {}", endpoint, owner);
                return false;
            }
        }
        let Some(conn) = self.connections.get_mut(&id) else {
            return false;
        };
        if let Some(old) = conn.udp_endpoint.replace(endpoint) {
            self.by_udp.remove(&old);
        }
        self.by_udp.insert(endpoint, id);
        true
    }

    pub fn by_udp_endpoint(&self, endpoint: &SocketAddr) -> Option<ConnectionId> {
        self.by_udp.get(endpoint).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
