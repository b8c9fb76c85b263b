// gore_server/server/tests/integration/dispatch.rs
mod common;

use bytes::Bytes;
use common::{build_world, drain, map_with_npcs, remote};
use gore_server_core::core::config::ServerConfig;
use gore_server_core::core::time::ManualClock;
use gore_server_core::core::types::{CharacterId, ConnectionId, Direction, MapId, Vec2};
use gore_server_core::entities::stats::StatKind;
use gore_server_core::network::connection::ConnectionSender;
use gore_server_core::network::packets::{ClientPacket, ServerPacket};
use gore_server_core::network::tcp::ConnectionEvent;
use gore_server_core::persistence::{CharacterStore, MemoryCharacterStore};
use gore_server_core::world::map_loader::MapDefinition;
use gore_server_core::GameServer;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

struct Harness {
    server: GameServer,
    clock: Arc<ManualClock>,
    store: Arc<MemoryCharacterStore>,
}

fn harness() -> Harness {
    harness_with(vec![map_with_npcs(1, &[("slime", Vec2::new(600.0, 400.0), None)])])
}

fn harness_with(maps: Vec<MapDefinition>) -> Harness {
    let (world, store) = build_world(maps);
    let clock = Arc::new(ManualClock::new(1000));
    let server = GameServer::with_parts(Arc::new(ServerConfig::default()), world, clock.clone());
    Harness { server, clock, store }
}

impl Harness {
    fn connect(&mut self, id: u64) -> UnboundedReceiver<Bytes> {
        let (sender, rx) = ConnectionSender::channel();
        self.server.handle_connection_event(ConnectionEvent::Connected {
            id: ConnectionId(id),
            remote: remote(6000 + id as u16),
            sender,
        });
        rx
    }

    fn send(&mut self, id: u64, packet: ClientPacket) -> bool {
        self.frame(id, packet.encode())
    }

    fn frame(&mut self, id: u64, data: Vec<u8>) -> bool {
        self.server.handle_connection_event(ConnectionEvent::Frame { id: ConnectionId(id), data: Bytes::from(data) })
    }

    fn tick(&mut self, ms: u64) {
        self.clock.advance(ms);
        self.server.tick().expect("tick");
    }
}

fn decoded(rx: &mut UnboundedReceiver<Bytes>) -> Vec<ServerPacket> {
    drain(rx).iter().map(|b| ServerPacket::decode(b).expect("server packet decodes")).collect()
}

#[test]
fn login_binds_connection_and_describes_the_map() {
    let mut h = harness();
    let mut rx = h.connect(1);
    assert!(h.send(1, ClientPacket::Login { name: "alice".into() }));

    let packets = decoded(&mut rx);
    let me = match packets.first() {
        Some(ServerPacket::LoginSuccessful { character, map }) => {
            assert_eq!(*map, MapId(1));
            *character
        }
        other => panic!("expected LoginSuccessful, got {:?}", other),
    };
    assert!(packets.iter().any(|p| matches!(p, ServerPacket::CreateCharacter { name, .. } if name == "slime")));
    assert_eq!(h.server.connections().get(ConnectionId(1)).and_then(|c| c.tag()), Some("alice"));

    h.tick(33);
    let packets = decoded(&mut rx);
    assert!(packets
        .iter()
        .any(|p| matches!(p, ServerPacket::CreateCharacter { id, .. } if *id == me)));
}

#[test]
fn failed_login_is_reported_to_the_client() {
    let mut h = harness();
    let mut rx = h.connect(1);
    h.send(1, ClientPacket::Login { name: "no spaces".into() });
    assert!(matches!(decoded(&mut rx).as_slice(), [ServerPacket::LoginUnsuccessful { .. }]));
    assert_eq!(h.server.world().user_count(), 0);
}

#[test]
fn malformed_packets_are_dropped_without_affecting_others() {
    let mut h = harness();
    let mut bad_rx = h.connect(1);
    let mut good_rx = h.connect(2);
    h.send(2, ClientPacket::Login { name: "bob".into() });
    decoded(&mut good_rx);

    assert!(!h.frame(1, vec![0xFF, 0xFF]));
    assert!(!h.frame(1, Vec::new()));
    assert!(!h.frame(1, vec![ClientPacket::Login { name: "x".into() }.encode()[0]]));
    h.tick(33);
    assert!(decoded(&mut bad_rx).is_empty());
    decoded(&mut good_rx);

    assert!(h.send(2, ClientPacket::Ping { id: 9 }));
    assert_eq!(decoded(&mut good_rx), vec![ServerPacket::Pong { id: 9 }]);
}

#[test]
fn actions_before_login_are_ignored() {
    let mut h = harness();
    let _rx = h.connect(1);
    assert!(!h.send(1, ClientPacket::MoveLeft));
    assert!(!h.send(1, ClientPacket::Say { text: "hi".into() }));
}

#[test]
fn chat_reaches_users_on_the_same_map() {
    let mut h = harness();
    let mut a = h.connect(1);
    let mut b = h.connect(2);
    h.send(1, ClientPacket::Login { name: "ann".into() });
    h.send(2, ClientPacket::Login { name: "ben".into() });
    h.tick(33);
    decoded(&mut a);
    decoded(&mut b);

    assert!(h.send(1, ClientPacket::Say { text: "hello".into() }));
    h.tick(33);
    let heard = decoded(&mut b);
    assert!(heard.iter().any(|p| matches!(p, ServerPacket::Chat { text, .. } if text == "hello")));
}

#[test]
fn disconnect_disposes_user_on_next_tick_and_saves_them() {
    let mut h = harness();
    let _rx = h.connect(1);
    h.send(1, ClientPacket::Login { name: "dora".into() });
    h.tick(33);
    let character = h.server.world().find_user("dora").map(|u| u.character).unwrap();

    h.server.handle_connection_event(ConnectionEvent::Closed { id: ConnectionId(1), reason: None });
    assert!(h.server.world().find_user("dora").is_some(), "teardown waits for the dispose drain");
    assert_eq!(h.server.world().dispose_stack().len(), 1);

    h.tick(33);
    assert!(h.server.world().find_user("dora").is_none());
    assert!(h.server.world().get_map(MapId(1)).unwrap().character(character).is_none());
    let saved = h.store.load("DORA").unwrap().expect("record saved on logout");
    assert_eq!(saved.map, MapId(1));

    // Logging back in restores the saved record.
    let mut rx = h.connect(2);
    h.send(2, ClientPacket::Login { name: "dora".into() });
    assert!(matches!(decoded(&mut rx).first(), Some(ServerPacket::LoginSuccessful { .. })));
    let user = h.server.world().find_user("dora").unwrap();
    let ch = h.server.world().get_map(MapId(1)).unwrap().character(user.character).unwrap();
    assert_eq!(ch.position, saved.position);
}

#[test]
fn positions_are_synced_to_users() {
    let mut h = harness();
    let mut rx = h.connect(1);
    h.send(1, ClientPacket::Login { name: "eve".into() });
    h.send(1, ClientPacket::MoveRight);
    h.tick(200);
    h.tick(200);
    let packets = decoded(&mut rx);
    assert!(packets.iter().any(|p| matches!(p, ServerPacket::UpdatePosition { .. })));
}

/// Puts a one-hit rat directly in front of `me`.
fn line_up_rat(h: &mut Harness, me: CharacterId) -> CharacterId {
    let events = h.server.world().events().clone();
    let map = h.server.world_mut().get_map_mut(MapId(1)).unwrap();
    let rat = map.characters().find(|c| c.name == "rat").map(|c| c.id).unwrap();
    let (position, width) = {
        let hero = map.character_mut(me).unwrap();
        hero.heading = Direction::Right;
        (hero.position, hero.size.x)
    };
    assert!(map.teleport_character(rat, Vec2::new(position.x + width + 1.0, position.y)));
    map.character_mut(rat).unwrap().set_stat(StatKind::Hp, 1, &events);
    rat
}

#[test]
fn kill_from_a_packet_starts_the_respawn_timer_at_the_clock_time() {
    let mut h = harness_with(vec![map_with_npcs(1, &[("rat", Vec2::new(300.0, 100.0), None)])]);
    let _rx = h.connect(1);
    h.send(1, ClientPacket::Login { name: "finn".into() });
    h.tick(0);
    let me = h.server.world().find_user("finn").map(|u| u.character).unwrap();
    let rat = line_up_rat(&mut h, me);

    // Between ticks: the packet lands 900ms after the last world update.
    h.clock.advance(900);
    assert!(h.send(1, ClientPacket::Attack));

    let map = h.server.world().get_map(MapId(1)).unwrap();
    assert!(!map.is_indexed(rat));
    assert_eq!(map.respawn_wake_time(rat), Some(1900 + 5000));
}

#[test]
fn killing_an_npc_pays_the_user_and_is_saved() {
    let mut h = harness_with(vec![map_with_npcs(1, &[("rat", Vec2::new(300.0, 100.0), None)])]);
    let _rx = h.connect(1);
    h.send(1, ClientPacket::Login { name: "gwen".into() });
    h.tick(0);
    let me = h.server.world().find_user("gwen").map(|u| u.character).unwrap();
    line_up_rat(&mut h, me);

    assert!(h.send(1, ClientPacket::Attack));
    let hero = h.server.world().get_map(MapId(1)).unwrap().character(me).unwrap();
    assert_eq!((hero.exp, hero.cash), (4, 2));

    h.server.handle_connection_event(ConnectionEvent::Closed { id: ConnectionId(1), reason: None });
    h.tick(33);
    let saved = h.store.load("gwen").unwrap().expect("record saved on logout");
    assert_eq!((saved.exp, saved.cash), (4, 2));
}
