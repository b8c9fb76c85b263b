// gore_server/server/tests/integration/common/mod.rs
#![allow(dead_code)]

use bytes::Bytes;
use gore_server_core::core::config::ServerConfig;
use gore_server_core::core::types::{ConnectionId, MapId, Vec2};
use gore_server_core::entities::template::TemplateRegistry;
use gore_server_core::network::connection::{Connection, ConnectionSender};
use gore_server_core::persistence::MemoryCharacterStore;
use gore_server_core::systems::ai::AiRegistry;
use gore_server_core::world::map_loader::{MapDefinition, NpcSpawnDefinition, StaticMapLoader};
use gore_server_core::World;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

pub const TEMPLATES: &str = r#"
- name: rat
  stats: { hp: 10, max_hp: 10, mp: 4, max_mp: 4, str: 1, def: 0 }
  respawn_secs: 5
  give_exp: 4
  give_cash: 2
- name: slime
  stats: { hp: 5, max_hp: 5, mp: 0, max_mp: 0, str: 1, def: 0 }
- name: bat
  stats: { hp: 8, max_hp: 8, mp: 0, max_mp: 0, str: 1, def: 0 }
  respawn_secs: 2
  inventory:
    - name: wing
      amount: 2
"#;

pub fn map_with_npcs(id: u16, npcs: &[(&str, Vec2, Option<u16>)]) -> MapDefinition {
    let mut def = MapDefinition::empty(MapId(id), 1000.0, 500.0);
    def.spawn = Vec2::new(40.0, 100.0);
    def.npcs = npcs
        .iter()
        .map(|(template, position, respawn_map)| NpcSpawnDefinition {
            template: template.to_string(),
            position: *position,
            count: 1,
            respawn_map: respawn_map.map(MapId),
        })
        .collect();
    def
}

pub fn build_world(maps: Vec<MapDefinition>) -> (World, Arc<MemoryCharacterStore>) {
    build_world_with(ServerConfig::default(), maps)
}

pub fn build_world_with(config: ServerConfig, maps: Vec<MapDefinition>) -> (World, Arc<MemoryCharacterStore>) {
    let config = Arc::new(config);
    let templates = TemplateRegistry::from_yaml_str(TEMPLATES).expect("templates parse");
    let store = Arc::new(MemoryCharacterStore::new());
    let world = World::new(config, &StaticMapLoader::new(maps), templates, AiRegistry::with_builtins(), store.clone())
        .expect("world loads");
    (world, store)
}

pub fn remote(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

pub fn connection(id: u64) -> (Connection, UnboundedReceiver<Bytes>) {
    let (sender, rx) = ConnectionSender::channel();
    (Connection::new(ConnectionId(id), remote(5000 + id as u16), sender), rx)
}

pub fn drain(rx: &mut UnboundedReceiver<Bytes>) -> Vec<Bytes> {
    let mut out = Vec::new();
    while let Ok(data) = rx.try_recv() {
        out.push(data);
    }
    out
}
