// gore_server/server/src/server/instance.rs
use crate::concurrent::dispose_queue::DisposeTarget;
use crate::concurrent::event_queue::WorldEvent;
use crate::core::config::ServerConfig;
use crate::core::error::ServerResult;
use crate::core::time::TimeSource;
use crate::core::types::{CharacterId, ConnectionId, Direction, Timestamp, Vec2};
use crate::network::connection::{Connection, ConnectionTable};
use crate::network::packets::{ClientPacket, ServerPacket};
use crate::network::tcp::{ConnectionEvent, TcpTransport};
use crate::network::udp::{AddressedPacket, UdpChannel};
use crate::operational::monitoring::metrics::MetricsSystem;
use crate::world::{UpdateOutcome, UserAction, World};
use ahash::AHashMap;
use bytes::Bytes;
use metrics::counter;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// What one [`GameServer::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub frame: u64,
    pub outcome: UpdateOutcome,
    pub packets_in: usize,
    pub packets_out: usize,
}

/// Owns the world and its transports, and moves data between them once per tick.
pub struct GameServer {
    pub(super) config: Arc<ServerConfig>,
    world: World,
    connections: ConnectionTable,
    tcp: Option<TcpTransport>,
    udp: Option<UdpChannel>,
    clock: Arc<dyn TimeSource>,
    pub(super) metrics: MetricsSystem,
    /// Last position sent for each character.
    synced: AHashMap<CharacterId, Vec2>,
    last_sync: Timestamp,
    pub(super) frame: u64,
}

impl GameServer {
    /// Binds the TCP listener and the UDP channel.
    pub async fn start(config: Arc<ServerConfig>, world: World, clock: Arc<dyn TimeSource>) -> ServerResult<Self> {
        let tcp = TcpTransport::bind(config.tcp_bind, config.max_frame_size).await?;
        let udp = UdpChannel::bind(config.udp_bind, config.max_datagram_size).await?;
        info!("Game server listening: TCP {}, UDP port {}", tcp.local_addr(), udp.port());

        let mut server = GameServer::with_parts(config, world, clock);
        server.tcp = Some(tcp);
        server.attach_udp(udp);
        Ok(server)
    }

    /// Replaces the datagram channel. Positions sync over it from then on.
    pub fn attach_udp(&mut self, channel: UdpChannel) {
        self.udp = Some(channel);
    }

    /// A server without sockets. Connection events are fed in by hand.
    pub fn with_parts(config: Arc<ServerConfig>, world: World, clock: Arc<dyn TimeSource>) -> Self {
        GameServer {
            config,
            world,
            connections: ConnectionTable::new(),
            tcp: None,
            udp: None,
            clock,
            metrics: MetricsSystem::new(),
            synced: AHashMap::new(),
            last_sync: 0,
            frame: 0,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn connections(&self) -> &ConnectionTable {
        &self.connections
    }

    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp.as_ref().map(TcpTransport::local_addr)
    }

    pub fn udp_port(&self) -> Option<u16> {
        self.udp.as_ref().map(UdpChannel::port)
    }

    /// One full server step: network in, simulation, network out.
    ///
    /// Only a dead transport is returned as an error.
    pub fn tick(&mut self) -> ServerResult<TickReport> {
        if let Some(tcp) = &self.tcp {
            tcp.check_health()?;
        }
        if let Some(udp) = &self.udp {
            udp.check_health()?;
        }

        let mut packets_in = 0;
        let events = self.tcp.as_ref().map(TcpTransport::get_events).unwrap_or_default();
        for event in events {
            if self.handle_connection_event(event) {
                packets_in += 1;
            }
        }
        let datagrams = self.udp.as_ref().map(UdpChannel::get_recv_data).unwrap_or_default();
        for datagram in datagrams {
            if self.handle_datagram(datagram) {
                packets_in += 1;
            }
        }

        let now = self.clock.get_time();
        let outcome = self.world.update(now);
        let mut packets_out = self.flush_world_events();

        if now < self.last_sync {
            self.last_sync = now;
        }
        if now - self.last_sync >= self.config.sync_extra_user_info_rate_ms {
            packets_out += self.sync_positions();
            self.last_sync = now;
        }

        self.metrics.update_user_count(self.world.user_count());
        self.frame += 1;
        Ok(TickReport { frame: self.frame, outcome, packets_in, packets_out })
    }

    /// Applies one event from the reliable transport. Returns `true` if a
    /// packet was decoded and handled.
    pub fn handle_connection_event(&mut self, event: ConnectionEvent) -> bool {
        match event {
            ConnectionEvent::Connected { id, remote, sender } => {
                self.connections.insert(Connection::new(id, remote, sender));
                info!("Connection {} opened from {}", id, remote);
                false
            }
            ConnectionEvent::Frame { id, data } => self.handle_packet(id, &data, false),
            ConnectionEvent::Closed { id, reason } => {
                if let Some(conn) = self.connections.remove(id) {
                    info!("Connection {} closed ({})", id, reason.as_deref().unwrap_or("clean"));
                    if let Some(name) = conn.tag() {
                        self.world.dispose_stack().push(DisposeTarget::User { name: name.to_string() });
                    }
                }
                false
            }
        }
    }

    fn handle_datagram(&mut self, datagram: AddressedPacket) -> bool {
        match self.connections.by_udp_endpoint(&datagram.remote) {
            Some(id) => self.handle_packet(id, &datagram.data, true),
            None => {
                trace!("Datagram from unregistered endpoint {}", datagram.remote);
                counter!("net_packets_dropped_total", "reason" => "unknown_endpoint").increment(1);
                false
            }
        }
    }

    fn handle_packet(&mut self, id: ConnectionId, data: &[u8], unreliable: bool) -> bool {
        let packet = match ClientPacket::decode(data) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Dropping malformed packet from connection {}: {}", id, e);
                counter!("net_packets_dropped_total", "reason" => "malformed").increment(1);
                return false;
            }
        };
        if unreliable && !packet.is_unreliable_ok() {
            warn!("Connection {} sent {:?} over UDP; dropped", id, packet.id());
            counter!("net_packets_dropped_total", "reason" => "wrong_channel").increment(1);
            return false;
        }
        self.dispatch(id, packet)
    }

    fn dispatch(&mut self, id: ConnectionId, packet: ClientPacket) -> bool {
        let now = self.clock.get_time();
        let Some(conn) = self.connections.get_mut(id) else {
            warn!("Packet for unknown connection {}", id);
            return false;
        };

        let action = match packet {
            ClientPacket::Login { name } => {
                match self.world.login(&name, conn, now) {
                    Ok(user) => {
                        let (me, map) = (user.character, user.map);
                        send_packet(conn, &ServerPacket::LoginSuccessful { character: me, map });
                        if let Some(map) = self.world.get_map(map) {
                            for ch in map.characters().filter(|c| c.is_alive() && c.id != me) {
                                send_packet(conn, &ServerPacket::CreateCharacter {
                                    id: ch.id,
                                    name: ch.name.clone(),
                                    position: ch.position,
                                });
                            }
                            for item in map.items() {
                                send_packet(conn, &ServerPacket::CreateItem {
                                    id: item.id,
                                    name: item.name.clone(),
                                    position: item.position,
                                });
                            }
                        }
                    }
                    Err(e) => {
                        debug!("Login '{}' on connection {} refused: {}", name, id, e);
                        send_packet(conn, &ServerPacket::LoginUnsuccessful { reason: e.to_string() });
                    }
                }
                return true;
            }
            ClientPacket::Ping { id: ping } => {
                send_packet(conn, &ServerPacket::Pong { id: ping });
                return true;
            }
            ClientPacket::SetUdpPort { port } => {
                let endpoint = SocketAddr::new(conn.remote().ip(), port);
                return self.connections.bind_udp(id, endpoint);
            }
            ClientPacket::MoveLeft => UserAction::Move(Some(Direction::Left)),
            ClientPacket::MoveRight => UserAction::Move(Some(Direction::Right)),
            ClientPacket::MoveStop => UserAction::Move(None),
            ClientPacket::Jump => UserAction::Jump,
            ClientPacket::Attack => UserAction::Attack,
            ClientPacket::PickupItem => UserAction::Pickup,
            ClientPacket::Say { text } => UserAction::Say(text),
        };

        let Some(user) = self.world.get_user(conn, true) else {
            debug!("Connection {} sent {:?} before logging in", id, action);
            return false;
        };
        let name = user.name().to_string();
        self.world.user_action(&name, action, now)
    }

    /// Encodes this tick's world events and sends them to the affected maps.
    fn flush_world_events(&mut self) -> usize {
        let mut sent = 0;
        let events = self.world.events().drain();
        for event in events {
            let map = event.map();
            if let Some(packet) = packet_for_event(event) {
                sent += self.world.send_to_map(map, Bytes::from(packet.encode()));
            }
        }
        sent
    }

    /// Sends positions of characters that moved since the last sync. Users
    /// with a registered UDP endpoint get them as datagrams.
    fn sync_positions(&mut self) -> usize {
        let mut sent = 0;
        let mut synced = AHashMap::with_capacity(self.synced.len());

        for map in self.world.maps() {
            let mut updates = Vec::new();
            for ch in map.characters().filter(|c| c.is_alive()) {
                if self.synced.get(&ch.id) != Some(&ch.position) {
                    updates.push(ServerPacket::UpdatePosition { id: ch.id, position: ch.position, velocity: ch.velocity }.encode());
                }
                synced.insert(ch.id, ch.position);
            }
            if updates.is_empty() {
                continue;
            }

            for user in self.world.users().filter(|u| u.map == map.id()) {
                let endpoint = self.connections.get(user.connection).and_then(Connection::udp_endpoint);
                for data in &updates {
                    let delivered = match (&self.udp, endpoint) {
                        (Some(udp), Some(endpoint)) => match udp.send(data, endpoint) {
                            Ok(()) => true,
                            Err(e) => {
                                debug!("Position datagram to {} failed: {}", endpoint, e);
                                false
                            }
                        },
                        _ => user.send(Bytes::copy_from_slice(data)),
                    };
                    if delivered {
                        sent += 1;
                    }
                }
            }
        }

        self.synced = synced;
        sent
    }

    /// Logs everybody out and tears the world down.
    pub fn shutdown(&mut self) {
        self.world.shutdown();
        self.connections = ConnectionTable::new();
        info!("Game server stopped after {} frames", self.frame);
    }
}

fn send_packet(conn: &Connection, packet: &ServerPacket) -> bool {
    conn.send(Bytes::from(packet.encode()))
}

/// The client-facing form of a world event, if clients care about it.
fn packet_for_event(event: WorldEvent) -> Option<ServerPacket> {
    let packet = match event {
        WorldEvent::UserJoined { .. } | WorldEvent::UserLeft { .. } => return None,
        WorldEvent::CharacterSpawned { id, name, position, .. } => ServerPacket::CreateCharacter { id, name, position },
        WorldEvent::CharacterRemoved { id, .. } => ServerPacket::RemoveCharacter { id },
        WorldEvent::CharacterDamaged { id, amount, .. } => ServerPacket::CharacterDamaged { id, amount: amount.max(0) as u32 },
        WorldEvent::CharacterKilled { id, .. } => ServerPacket::CharacterKilled { id },
        WorldEvent::CharacterRespawned { id, position, .. } => ServerPacket::CharacterRespawned { id, position },
        WorldEvent::StatChanged { character, stat, new, .. } => ServerPacket::SetStat { id: character, stat, value: new },
        WorldEvent::ItemDropped { id, name, position, .. } => ServerPacket::CreateItem { id, name, position },
        WorldEvent::ItemRemoved { id, .. } => ServerPacket::RemoveItem { id },
        WorldEvent::Chat { speaker, text, .. } => ServerPacket::Chat { speaker, text },
    };
    Some(packet)
}
