// gore_server/server/src/world/game_world.rs
use super::context::{MapTransfer, SimResources};
use super::map::Map;
use super::map_loader::{MapDefinition, MapLoader};
use crate::concurrent::dispose_queue::{Disposable, DisposeStack, DisposeTarget, DrainReport};
use crate::concurrent::event_queue::{WorldEvent, WorldEventQueue};
use crate::core::config::ServerConfig;
use crate::core::constants::{MAX_CHAT_LEN, MAX_USER_NAME_LEN};
use crate::core::error::{ServerError, ServerResult};
use crate::core::types::{CharacterId, Direction, MapId, Timestamp, Vec2};
use crate::entities::character::{Character, CharacterKind, RespawnPolicy};
use crate::entities::item::ItemEntity;
use crate::entities::stats::CharacterStats;
use crate::entities::template::TemplateRegistry;
use crate::entities::user::User;
use crate::network::connection::Connection;
use crate::persistence::{CharacterRecord, CharacterStore};
use crate::systems::ai::AiRegistry;
use ahash::AHashMap;
use bytes::Bytes;
use metrics::{counter, gauge};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Result of one [`World::update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Advanced { delta_ms: u64, disposed: usize },
    /// `now` was behind the last update. Nothing ran and the stored time was reset.
    ClockRegression,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WorldStats {
    pub ticks: u64,
    pub clock_regressions: u64,
    pub disposed: u64,
    pub user_lookup_fallbacks: u64,
    pub rejected_broadcasts: u64,
}

/// What a connected user asked their character to do.
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    Move(Option<Direction>),
    Jump,
    Attack,
    Pickup,
    Say(String),
}

/// Root of the simulation: every map, every connected user and the dispose stack.
///
/// Only the tick thread touches a `World`. Other threads reach it through the
/// dispose stack and the event queue, both of which are shared handles.
pub struct World {
    config: Arc<ServerConfig>,
    maps: Vec<Option<Map>>,
    /// Keyed by lowercase user name.
    users: AHashMap<String, User>,
    res: SimResources,
    store: Arc<dyn CharacterStore>,
    transfers: Vec<MapTransfer>,
    last_update: Option<Timestamp>,
    stats: WorldStats,
}

impl World {
    /// Loads every map the loader knows about and spawns their NPCs.
    pub fn new(
        config: Arc<ServerConfig>,
        loader: &dyn MapLoader,
        templates: TemplateRegistry,
        ai: AiRegistry,
        store: Arc<dyn CharacterStore>,
    ) -> ServerResult<World> {
        let res = SimResources::new(config.engine.clone(), templates, ai, rand::random());
        let mut world = World {
            config,
            maps: Vec::new(),
            users: AHashMap::new(),
            res,
            store,
            transfers: Vec::new(),
            last_update: None,
            stats: WorldStats::default(),
        };

        for id in loader.map_ids()? {
            let def = loader.load(id)?;
            world.load_map(&def)?;
        }
        if world.map(world.config.start_map).is_none() {
            return Err(ServerError::InitializationFailed(format!(
                "start map {} was not loaded",
                world.config.start_map
            )));
        }
        info!("World loaded {} maps", world.maps().count());
        Ok(world)
    }

    /// Creates the map in its slot and spawns the NPCs it lists.
    pub fn load_map(&mut self, def: &MapDefinition) -> ServerResult<()> {
        let index = def.id.index();
        if self.maps.get(index).map_or(false, Option::is_some) {
            return Err(ServerError::InitializationFailed(format!("map {} loaded twice", def.id)));
        }
        if self.maps.len() <= index {
            self.maps.resize_with(index + 1, || None);
        }
        self.maps[index] = Some(Map::from_definition(def));

        for npc in &def.npcs {
            for _ in 0..npc.count {
                self.spawn_npc(def.id, &npc.template, npc.position, npc.respawn_map)?;
            }
        }
        debug!("Loaded map {} '{}' with {} NPC spawns", def.id, def.name, def.npcs.len());
        Ok(())
    }

    /// Creates an NPC from a template. Its respawn map defaults to `map`.
    pub fn spawn_npc(
        &mut self,
        map: MapId,
        template: &str,
        position: Vec2,
        respawn_map: Option<MapId>,
    ) -> ServerResult<CharacterId> {
        let ch = {
            let res = &mut self.res;
            let template = res
                .templates
                .get(template)
                .ok_or_else(|| ServerError::NotFound(format!("character template '{}'", template)))?;
            let id = res.ids.next_character();
            let mut ch = Character::from_template(id, template, position);
            if let Some(ai) = &template.ai {
                ch.ai = res.ai.create(ai, rand::Rng::gen(&mut res.rng));
            }
            if let Some(secs) = template.respawn_secs {
                ch.respawn = Some(RespawnPolicy { map: respawn_map.unwrap_or(map), secs, position });
            }
            for spawn in &template.inventory {
                if spawn.roll(&mut res.rng) {
                    ch.inventory.add(ItemEntity::new(res.ids.next_item(), spawn.name.clone(), spawn.amount));
                }
            }
            ch
        };

        let id = ch.id;
        let name = ch.name.clone();
        let target = self
            .map_mut(map)
            .ok_or_else(|| ServerError::NotFound(format!("map {}", map)))?;
        target.add_character(ch)?;
        self.res.events.publish(WorldEvent::CharacterSpawned { map, id, name, position });
        Ok(id)
    }

    /// Advances the simulation to `now`.
    ///
    /// Drains the dispose stack before any map runs, so nothing queued during
    /// the previous tick is still live when the maps update.
    pub fn update(&mut self, now: Timestamp) -> UpdateOutcome {
        let delta_ms = match self.last_update {
            Some(last) if now < last => {
                warn!("Clock went backwards ({} -> {}); skipping tick", last, now);
                counter!("world_clock_regressions_total").increment(1);
                self.stats.clock_regressions += 1;
                self.last_update = Some(now);
                return UpdateOutcome::ClockRegression;
            }
            Some(last) => (now - last).min(self.config.max_tick_delta_ms),
            None => 0,
        };
        self.last_update = Some(now);

        let report = self.process_dispose_stack();

        let mut transfers = std::mem::take(&mut self.transfers);
        for (index, slot) in self.maps.iter_mut().enumerate() {
            let Some(map) = slot else { continue };
            if map.id().index() != index {
                crate::invariant_violation!("Map slot {} holds map {}; skipping it", index, map.id());
                continue;
            }
            let mut ctx = self.res.context(now, delta_ms, &mut transfers);
            map.update(&mut ctx);
        }
        self.transfers = transfers;
        self.route_transfers();

        self.stats.ticks += 1;
        gauge!("world_connected_users").set(self.users.len() as f64);
        UpdateOutcome::Advanced { delta_ms, disposed: report.disposed }
    }

    /// Pops and disposes everything on the dispose stack, newest first.
    pub fn process_dispose_stack(&mut self) -> DrainReport {
        let stack = Arc::clone(&self.res.dispose);
        let report = stack.drain(|target| self.dispose_target(target));
        if report.disposed > 0 || report.skipped > 0 {
            debug!("Dispose drain: {} disposed, {} skipped", report.disposed, report.skipped);
        }
        counter!("world_disposed_total").increment(report.disposed as u64);
        self.stats.disposed += report.disposed as u64;
        report
    }

    fn dispose_target(&mut self, target: DisposeTarget) -> bool {
        match target {
            DisposeTarget::Character { map, id } => {
                let Some(mut ch) = self.map_mut(map).and_then(|m| m.remove_character(id)) else {
                    trace!("Character {} already gone from map {}", id, map);
                    return false;
                };
                self.res.events.publish(WorldEvent::CharacterRemoved { map, id });
                ch.dispose()
            }
            DisposeTarget::Item { map, id } => {
                if self.map_mut(map).and_then(|m| m.remove_item(id)).is_none() {
                    return false;
                }
                self.res.events.publish(WorldEvent::ItemRemoved { map, id });
                true
            }
            DisposeTarget::User { name } => self.dispose_user(&name),
            DisposeTarget::Object(mut obj) => obj.dispose(),
        }
    }

    /// Logs a user out: saves their character and takes it off its map.
    fn dispose_user(&mut self, name: &str) -> bool {
        let Some(user) = self.users.remove(&name.to_lowercase()) else {
            trace!("User '{}' already disposed", name);
            return false;
        };
        match self.map_mut(user.map).and_then(|m| m.remove_character(user.character)) {
            Some(mut ch) => {
                let record = CharacterRecord::from_character(&ch, user.map);
                if let Err(e) = self.store.save(&record) {
                    error!("Failed to save character '{}': {}", user.name(), e);
                }
                ch.dispose();
                self.res.events.publish(WorldEvent::CharacterRemoved { map: user.map, id: user.character });
            }
            None => {
                crate::invariant_violation!(
                    "User '{}' character {} missing from map {}",
                    user.name(),
                    user.character,
                    user.map
                );
            }
        }
        self.res.events.publish(WorldEvent::UserLeft {
            user: user.name().to_string(),
            map: user.map,
            character: user.character,
        });
        info!("User '{}' left", user.name());
        true
    }

    fn route_transfers(&mut self) {
        for transfer in std::mem::take(&mut self.transfers) {
            match transfer {
                MapTransfer::Respawn { map, killed_at, character } => match self.map_mut(map) {
                    Some(target) => {
                        target.add_to_respawn(character, killed_at);
                    }
                    None => {
                        crate::invariant_violation!(
                            "Respawn map {} for character {} does not exist; dropping it",
                            map,
                            character.id
                        );
                        let mut character = character;
                        character.dispose();
                    }
                },
            }
        }
    }

    /// Registers a connected user. Rejects empty and duplicate names.
    pub fn add_user(&mut self, user: User) -> ServerResult<()> {
        if user.name().is_empty() {
            warn!("Rejected user with an empty name");
            return Err(ServerError::InvalidArgument("user name is empty".into()));
        }
        let key = user.name().to_lowercase();
        if self.users.contains_key(&key) {
            return Err(ServerError::LogicError(format!("user '{}' is already connected", user.name())));
        }
        self.users.insert(key, user);
        Ok(())
    }

    /// Creates the user's character from its saved record (or fresh), places
    /// it on its map and binds the connection to the user.
    pub fn login(&mut self, name: &str, conn: &mut Connection, now: Timestamp) -> ServerResult<&User> {
        if name.is_empty() || name.len() > MAX_USER_NAME_LEN || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ServerError::InvalidArgument(format!("invalid user name '{}'", name)));
        }
        if let Some(bound) = conn.tag() {
            return Err(ServerError::LogicError(format!("connection already logged in as '{}'", bound)));
        }
        let key = name.to_lowercase();
        if self.users.contains_key(&key) {
            return Err(ServerError::LogicError(format!("user '{}' is already connected", name)));
        }

        let record = self.store.load(name)?;
        let id = self.res.ids.next_character();
        let mut ch;
        let map_id;
        match record {
            Some(rec) => {
                map_id = if self.map(rec.map).is_some() { rec.map } else { self.config.start_map };
                let position = if map_id == rec.map { rec.position } else { self.spawn_of(map_id)? };
                ch = Character::new(id, rec.name.clone(), CharacterKind::User, rec.stats, position);
                ch.exp = rec.exp;
                ch.cash = rec.cash;
                for (item, amount) in rec.inventory {
                    ch.inventory.add(ItemEntity::new(self.res.ids.next_item(), item, amount));
                }
            }
            None => {
                map_id = self.config.start_map;
                let position = self.spawn_of(map_id)?;
                ch = Character::new(id, name, CharacterKind::User, CharacterStats::default(), position);
            }
        }
        let display_name = ch.name.clone();
        let position = ch.position;

        let map = self.map_mut(map_id).ok_or_else(|| ServerError::NotFound(format!("map {}", map_id)))?;
        map.add_character(ch)?;
        let user = User::new(display_name.clone(), conn.id(), id, map_id, conn.sender().clone(), now);
        if let Err(e) = self.add_user(user) {
            if let Some(map) = self.map_mut(map_id) {
                map.remove_character(id);
            }
            return Err(e);
        }
        conn.bind_user(&display_name);

        self.res.events.publish(WorldEvent::UserJoined { user: display_name.clone(), map: map_id, character: id });
        self.res.events.publish(WorldEvent::CharacterSpawned { map: map_id, id, name: display_name.clone(), position });
        info!("User '{}' logged in on connection {} (map {})", display_name, conn.id(), map_id);
        self.users.get(&key).ok_or_else(|| ServerError::Internal(format!("user '{}' vanished after login", name)))
    }

    fn spawn_of(&self, map: MapId) -> ServerResult<Vec2> {
        self.map(map)
            .map(Map::spawn_position)
            .ok_or_else(|| ServerError::NotFound(format!("map {}", map)))
    }

    pub fn find_user(&self, name: &str) -> Option<&User> {
        self.users.get(&name.to_lowercase())
    }

    /// Resolves the user a connection is bound to.
    ///
    /// With `fail_recover`, a missing or stale tag falls back to scanning every
    /// user for the connection id. A hit there re-binds the tag and is reported
    /// as an invariant violation.
    pub fn get_user(&mut self, conn: &mut Connection, fail_recover: bool) -> Option<&User> {
        if let Some(tag) = conn.tag() {
            let key = tag.to_lowercase();
            if self.users.contains_key(&key) {
                return self.users.get(&key);
            }
        }
        if !fail_recover {
            return None;
        }

        let (key, name) = self
            .users
            .iter()
            .find(|(_, u)| u.connection == conn.id())
            .map(|(k, u)| (k.clone(), u.name().to_string()))?;
        crate::invariant_violation!(
            "Connection {} lost its user binding (tag {:?}); recovered '{}' by linear search",
            conn.id(),
            conn.tag(),
            name
        );
        counter!("world_user_lookup_fallbacks_total").increment(1);
        self.stats.user_lookup_fallbacks += 1;
        conn.bind_user(&name);
        self.users.get(&key)
    }

    /// Sends `data` to every connected user. Returns how many accepted it.
    pub fn send(&mut self, data: &[u8]) -> usize {
        if data.is_empty() {
            warn!("Refusing to broadcast an empty payload");
            counter!("world_rejected_broadcasts_total").increment(1);
            self.stats.rejected_broadcasts += 1;
            return 0;
        }
        let payload = Bytes::copy_from_slice(data);
        self.users.values().filter(|u| u.send(payload.clone())).count()
    }

    /// Sends `data` to the users whose character is on `map`.
    pub fn send_to_map(&self, map: MapId, data: Bytes) -> usize {
        if data.is_empty() {
            warn!("Refusing to send an empty payload to map {}", map);
            return 0;
        }
        self.users.values().filter(|u| u.map == map).filter(|u| u.send(data.clone())).count()
    }

    /// Looks up a map. Unknown ids log a warning.
    pub fn get_map(&self, id: MapId) -> Option<&Map> {
        let map = self.map(id);
        if map.is_none() {
            warn!("Requested unknown map {}", id);
        }
        map
    }

    pub fn get_map_mut(&mut self, id: MapId) -> Option<&mut Map> {
        if self.map(id).is_none() {
            warn!("Requested unknown map {}", id);
        }
        self.map_mut(id)
    }

    fn map(&self, id: MapId) -> Option<&Map> {
        self.maps.get(id.index()).and_then(Option::as_ref)
    }

    fn map_mut(&mut self, id: MapId) -> Option<&mut Map> {
        self.maps.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn maps(&self) -> impl Iterator<Item = &Map> {
        self.maps.iter().flatten()
    }

    /// Applies a user's request to their character at time `now`.
    pub fn user_action(&mut self, name: &str, action: UserAction, now: Timestamp) -> bool {
        let Some(user) = self.users.get(&name.to_lowercase()) else {
            warn!("Action {:?} for unknown user '{}'", action, name);
            return false;
        };
        let (map_id, character) = (user.map, user.character);

        let Some(map) = self.maps.get_mut(map_id.index()).and_then(Option::as_mut) else {
            crate::invariant_violation!("User '{}' is on missing map {}", name, map_id);
            return false;
        };
        let mut transfers = std::mem::take(&mut self.transfers);
        let mut ctx = self.res.context(now, 0, &mut transfers);
        let handled = match action {
            UserAction::Move(dir) => match map.character_mut(character) {
                Some(ch) if ch.is_alive() => {
                    ch.set_moving(dir);
                    true
                }
                _ => false,
            },
            UserAction::Jump => map.character_mut(character).map_or(false, |ch| ch.jump()),
            UserAction::Attack => map.attack(character, &mut ctx).is_some(),
            UserAction::Pickup => map.pickup(character, &ctx).is_some(),
            UserAction::Say(text) => {
                let text: String = text.chars().take(MAX_CHAT_LEN).collect();
                map.say(character, &text, &ctx)
            }
        };
        self.transfers = transfers;
        self.route_transfers();
        handled
    }

    /// Kills a character at time `now`. Respawn timers start from `now`.
    pub fn kill_character(&mut self, map: MapId, id: CharacterId, killer: Option<CharacterId>, now: Timestamp) -> bool {
        let Some(target) = self.maps.get_mut(map.index()).and_then(Option::as_mut) else {
            warn!("Kill requested on unknown map {}", map);
            return false;
        };
        let mut transfers = std::mem::take(&mut self.transfers);
        let mut ctx = self.res.context(now, 0, &mut transfers);
        let killed = target.kill_character(id, killer, &mut ctx);
        self.transfers = transfers;
        self.route_transfers();
        killed
    }

    /// Saves every user and tears down all maps.
    pub fn shutdown(&mut self) {
        let names: Vec<String> = self.users.values().map(|u| u.name().to_string()).collect();
        for name in names {
            self.dispose_user(&name);
        }
        self.process_dispose_stack();
        for map in self.maps.iter_mut().flatten() {
            map.dispose();
        }
        info!("World shut down after {} ticks", self.stats.ticks);
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn dispose_stack(&self) -> &Arc<DisposeStack> {
        &self.res.dispose
    }

    pub fn events(&self) -> &Arc<WorldEventQueue> {
        &self.res.events
    }

    pub fn stats(&self) -> WorldStats {
        self.stats
    }

    pub fn last_update(&self) -> Option<Timestamp> {
        self.last_update
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
