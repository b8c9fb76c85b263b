// gore_server/server/src/world/map.rs
use super::context::{MapTransfer, TickContext};
use super::map_loader::MapDefinition;
use crate::concurrent::dispose_queue::{Disposable, DisposeTarget};
use crate::concurrent::event_queue::WorldEvent;
use crate::concurrent::spatial_index::{MapSpatialIndex, SpatialId};
use crate::concurrent::wall_spatial_index::WallSpatialIndex;
use crate::core::constants::{ATTACK_COOLDOWN_MS, PICKUP_RANGE, SPATIAL_INDEX_CELL_SIZE};
use crate::core::error::{ServerError, ServerResult};
use crate::core::types::{CharacterId, ItemId, MapGrh, MapGrhId, MapId, Rect, Timestamp, Vec2, Wall, WallId};
use crate::entities::character::{Character, CharacterKind};
use crate::entities::item::ItemEntity;
use crate::entities::stats::StatKind;
use crate::systems::ai::{AiAction, AiView};
use crate::systems::physics;
use crate::systems::respawn::RespawnScheduler;
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// One game area: its characters, loose items, walls and respawn queue.
///
/// Every character whose map is this map appears exactly once in the
/// spatial index, except dead ones waiting in the dispose stack.
pub struct Map {
    id: MapId,
    name: String,
    bounds: Rect,
    spawn: Vec2,
    index: MapSpatialIndex,
    walls: WallSpatialIndex,
    wall_list: Vec<Wall>,
    characters: BTreeMap<CharacterId, Character>,
    items: BTreeMap<ItemId, ItemEntity>,
    grhs: BTreeMap<MapGrhId, MapGrh>,
    next_grh: u64,
    respawns: RespawnScheduler,
    disposed: bool,
}

impl Map {
    pub fn new(id: MapId, name: impl Into<String>, width: f32, height: f32, spawn: Vec2, walls: Vec<Wall>) -> Self {
        let mut index = MapSpatialIndex::new(width, height, SPATIAL_INDEX_CELL_SIZE);
        for wall in &walls {
            index.insert(wall.id, wall.bounds);
        }
        let mut wall_index = WallSpatialIndex::new();
        wall_index.rebuild(&walls);

        Map {
            id,
            name: name.into(),
            bounds: Rect::new(0.0, 0.0, width, height),
            spawn,
            index,
            walls: wall_index,
            wall_list: walls,
            characters: BTreeMap::new(),
            items: BTreeMap::new(),
            grhs: BTreeMap::new(),
            next_grh: 1,
            respawns: RespawnScheduler::new(),
            disposed: false,
        }
    }

    /// Builds the static part of a map. NPC spawns are left to the world.
    pub fn from_definition(def: &MapDefinition) -> Self {
        let walls = def
            .walls
            .iter()
            .enumerate()
            .map(|(i, w)| Wall { id: WallId(i as u64 + 1), bounds: w.bounds(), platform: w.platform })
            .collect();
        let mut map = Map::new(def.id, def.name.clone(), def.width, def.height, def.spawn, walls);
        for g in &def.grhs {
            map.add_map_grh(g.grh, Rect::new(g.x, g.y, g.width, g.height), g.foreground);
        }
        map
    }

    pub fn id(&self) -> MapId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn spawn_position(&self) -> Vec2 {
        self.spawn
    }

    pub fn walls(&self) -> &[Wall] {
        &self.wall_list
    }

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn character_mut(&mut self, id: CharacterId) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    pub fn item(&self, id: ItemId) -> Option<&ItemEntity> {
        self.items.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemEntity> {
        self.items.values()
    }

    pub fn is_indexed<T: SpatialId>(&self, id: T) -> bool {
        self.index.contains(id)
    }

    pub fn get_entity<T: SpatialId>(&self, point: Vec2) -> Option<T> {
        self.index.get_entity(point)
    }

    pub fn get_entities<T: SpatialId>(&self, rect: &Rect) -> Vec<T> {
        self.index.get_entities(rect)
    }

    pub fn respawn_wake_time(&self, id: CharacterId) -> Option<Timestamp> {
        self.respawns.wake_time_of(id)
    }

    pub fn respawn_count(&self) -> usize {
        self.respawns.len()
    }

    /// Registers a living character on this map.
    pub fn add_character(&mut self, mut ch: Character) -> ServerResult<()> {
        if !ch.is_alive() {
            crate::invariant_violation!("Dead character {} added to map {}", ch.id, self.id);
            return Err(ServerError::LogicError(format!("character {} is dead", ch.id)));
        }
        if self.characters.contains_key(&ch.id) || !self.index.insert(ch.id, ch.bounds()) {
            crate::invariant_violation!("Character {} added to map {} twice", ch.id, self.id);
            return Err(ServerError::LogicError(format!("character {} already on map {}", ch.id, self.id)));
        }
        ch.set_map(Some(self.id));
        trace!("Character {} joined map {}", ch.id, self.id);
        self.characters.insert(ch.id, ch);
        Ok(())
    }

    /// Takes a character off the map and out of the index.
    pub fn remove_character(&mut self, id: CharacterId) -> Option<Character> {
        let mut ch = self.characters.remove(&id)?;
        self.index.remove(id);
        ch.set_map(None);
        Some(ch)
    }

    /// Moves a character and re-indexes it.
    pub fn teleport_character(&mut self, id: CharacterId, position: Vec2) -> bool {
        let Some(ch) = self.characters.get_mut(&id) else { return false };
        ch.teleport(position);
        self.index.update(id, ch.bounds())
    }

    pub fn add_item(&mut self, item: ItemEntity) -> ItemId {
        let id = item.id;
        if !self.index.insert(id, item.bounds()) {
            self.index.update(id, item.bounds());
        }
        self.items.insert(id, item);
        id
    }

    pub fn remove_item(&mut self, id: ItemId) -> Option<ItemEntity> {
        let item = self.items.remove(&id)?;
        self.index.remove(id);
        Some(item)
    }

    /// Places a graphic. Ids are local to the map.
    pub fn add_map_grh(&mut self, grh: u32, bounds: Rect, foreground: bool) -> MapGrhId {
        let id = MapGrhId(self.next_grh);
        self.next_grh += 1;
        self.index.insert(id, bounds);
        self.grhs.insert(id, MapGrh { id, grh, bounds, foreground });
        id
    }

    pub fn remove_map_grh(&mut self, id: MapGrhId) -> Option<MapGrh> {
        let grh = self.grhs.remove(&id)?;
        self.index.remove(id);
        Some(grh)
    }

    pub fn map_grh(&self, id: MapGrhId) -> Option<&MapGrh> {
        self.grhs.get(&id)
    }

    pub fn map_grhs(&self) -> impl Iterator<Item = &MapGrh> {
        self.grhs.values()
    }

    fn drop_item(&mut self, mut item: ItemEntity, position: Vec2, ctx: &TickContext<'_>) {
        item.position = position;
        item.dropped_at = Some(ctx.now);
        ctx.events.publish(WorldEvent::ItemDropped {
            map: self.id,
            id: item.id,
            name: item.name.clone(),
            position,
        });
        self.add_item(item);
    }

    /// Queues a dead character to come back `RespawnSecs` after `now`.
    pub fn add_to_respawn(&mut self, mut ch: Character, now: Timestamp) -> Timestamp {
        self.index.remove(ch.id);
        ch.set_alive(false);
        ch.set_map(None);
        let delay = match ch.respawn {
            Some(policy) => policy.delay_ms(),
            None => {
                crate::invariant_violation!("Character {} queued for respawn without a respawn policy", ch.id);
                0
            }
        };
        let wake = now + delay;
        self.respawns.schedule(wake, ch);
        wake
    }

    /// Kills a living character: drops its items, then either restores it
    /// (users), queues it for respawn, or hands it to the dispose stack.
    pub fn kill_character(&mut self, id: CharacterId, killer: Option<CharacterId>, ctx: &mut TickContext<'_>) -> bool {
        let Some(ch) = self.characters.get_mut(&id) else {
            warn!("Kill requested for character {} not on map {}", id, self.id);
            return false;
        };
        if !ch.is_alive() {
            crate::invariant_violation!("Kill requested for dead character {} on map {}", id, self.id);
            return false;
        }
        if ch.map() != Some(self.id) {
            crate::invariant_violation!("Character {} is held by map {} but bound to {:?}", id, self.id, ch.map());
            return false;
        }

        let position = ch.position;
        let reward = (ch.give_exp, ch.give_cash);
        let drops = ch.take_drops();
        ctx.events.publish(WorldEvent::CharacterKilled { map: self.id, id, killer });
        debug!("Character {} ({}) killed on map {}", id, ch.name, self.id);

        match (ch.kind, ch.respawn) {
            (CharacterKind::User, _) => {
                ch.restore(ctx.events);
                self.teleport_character(id, self.spawn);
                ctx.events.publish(WorldEvent::CharacterRespawned { map: self.id, id, position: self.spawn });
            }
            (CharacterKind::Npc, Some(policy)) => {
                if let Some(ch) = self.remove_character(id) {
                    if policy.map == self.id {
                        self.add_to_respawn(ch, ctx.now);
                    } else {
                        ctx.transfers.push(MapTransfer::Respawn { map: policy.map, killed_at: ctx.now, character: ch });
                    }
                }
                ctx.events.publish(WorldEvent::CharacterRemoved { map: self.id, id });
            }
            (CharacterKind::Npc, None) => {
                ch.set_alive(false);
                self.index.remove(id);
                ctx.dispose.push(DisposeTarget::Character { map: self.id, id });
            }
        }

        if let Some(k) = killer.and_then(|k| self.characters.get_mut(&k)).filter(|k| !k.is_npc()) {
            k.reward(reward.0, reward.1);
            debug!("Character {} earned {} exp and {} cash", k.id, reward.0, reward.1);
        }
        for item in drops {
            self.drop_item(item, position, ctx);
        }
        true
    }

    /// Melee swing. Users hit NPCs and NPCs hit users. Returns who was hit.
    pub fn attack(&mut self, attacker: CharacterId, ctx: &mut TickContext<'_>) -> Option<CharacterId> {
        let (area, attacker_is_npc) = {
            let a = self.characters.get_mut(&attacker)?;
            if !a.is_alive() || ctx.now < a.last_attack + ATTACK_COOLDOWN_MS {
                return None;
            }
            a.last_attack = ctx.now;
            (a.attack_area(), a.is_npc())
        };

        let target = self
            .index
            .get_entities::<CharacterId>(&area)
            .into_iter()
            .filter(|t| *t != attacker)
            .find(|t| self.characters.get(t).map_or(false, |c| c.is_alive() && c.is_npc() != attacker_is_npc))?;

        let amount = match (self.characters.get(&attacker), self.characters.get(&target)) {
            (Some(a), Some(t)) => a.attack_damage_against(t),
            _ => return None,
        };
        let died = self.characters.get_mut(&target)?.damage(amount, ctx.events);
        ctx.events.publish(WorldEvent::CharacterDamaged { map: self.id, id: target, attacker: Some(attacker), amount });
        if died {
            self.kill_character(target, Some(attacker), ctx);
        }
        Some(target)
    }

    /// Picks up the nearest loose item within reach.
    pub fn pickup(&mut self, id: CharacterId, ctx: &TickContext<'_>) -> Option<ItemId> {
        let reach = self.characters.get(&id).filter(|c| c.is_alive())?.bounds().inflate(PICKUP_RANGE);
        let item_id = self.index.get_entities::<ItemId>(&reach).into_iter().next()?;
        let mut item = self.remove_item(item_id)?;
        item.dropped_at = None;
        ctx.events.publish(WorldEvent::ItemRemoved { map: self.id, id: item_id });

        let leftover = match self.characters.get_mut(&id) {
            Some(ch) => ch.inventory.add(item),
            None => Some(item),
        };
        if let Some(rest) = leftover {
            let position = rest.position;
            self.drop_item(rest, position, ctx);
        }
        Some(item_id)
    }

    pub fn say(&self, id: CharacterId, text: &str, ctx: &TickContext<'_>) -> bool {
        match self.characters.get(&id) {
            Some(ch) if ch.is_alive() => {
                ctx.events.publish(WorldEvent::Chat { map: self.id, speaker: id, text: text.to_string() });
                true
            }
            _ => false,
        }
    }

    /// Advances one tick: AI, then physics, then due respawns.
    pub fn update(&mut self, ctx: &mut TickContext<'_>) {
        let depleted: Vec<CharacterId> = self
            .characters
            .values()
            .filter(|c| c.is_alive() && c.stat(StatKind::Hp) <= 0)
            .map(|c| c.id)
            .collect();
        for id in depleted {
            self.kill_character(id, None, ctx);
        }

        let users: Vec<(CharacterId, Vec2)> = self
            .characters
            .values()
            .filter(|c| c.is_alive() && !c.is_npc())
            .map(|c| (c.id, c.center()))
            .collect();
        let ids: Vec<CharacterId> = self.characters.keys().copied().collect();

        for &id in &ids {
            let action = {
                let Some(ch) = self.characters.get_mut(&id) else { continue };
                if !ch.is_alive() {
                    continue;
                }
                let Some(mut ai) = ch.ai.take() else { continue };
                let action = ai.update(ch, &AiView { now: ctx.now, users: &users });
                ch.ai = Some(ai);
                action
            };
            self.apply_ai_action(id, action, ctx);
        }

        for &id in &ids {
            let Some(ch) = self.characters.get_mut(&id) else { continue };
            if !ch.is_alive() {
                continue;
            }
            if physics::step_character(ch, ctx.engine, ctx.delta_ms, &self.walls, &self.bounds)
                && !self.index.update(id, ch.bounds())
            {
                crate::invariant_violation!("Live character {} on map {} missing from spatial index", id, self.id);
                self.index.insert(id, ch.bounds());
            }
        }

        for ch in self.respawns.take_ready(ctx.now) {
            self.respawn_character(ch, ctx);
        }

        self.expire_items(ctx);
    }

    /// Queues items that outlived their ground time for disposal. Each item
    /// is queued once.
    fn expire_items(&mut self, ctx: &mut TickContext<'_>) {
        let lifetime = ctx.engine.item_lifetime_ms;
        for item in self.items.values_mut().filter(|i| i.is_expired(ctx.now, lifetime)) {
            item.dropped_at = None;
            trace!("Item {} expired on map {}", item.id, self.id);
            ctx.dispose.push(DisposeTarget::Item { map: self.id, id: item.id });
        }
    }

    fn apply_ai_action(&mut self, id: CharacterId, action: AiAction, ctx: &mut TickContext<'_>) {
        match action {
            AiAction::Idle => {}
            AiAction::Attack => {
                self.attack(id, ctx);
            }
            other => {
                let Some(ch) = self.characters.get_mut(&id) else { return };
                match other {
                    AiAction::Move(dir) => ch.set_moving(Some(dir)),
                    AiAction::Stop => ch.set_moving(None),
                    AiAction::Jump => {
                        ch.jump();
                    }
                    AiAction::Idle | AiAction::Attack => {}
                }
            }
        }
    }

    fn respawn_character(&mut self, mut ch: Character, ctx: &mut TickContext<'_>) {
        let position = ch.respawn.map(|p| p.position).unwrap_or(self.spawn);
        ch.respawn(position);
        if let Some(template) = ch.template.as_deref().and_then(|t| ctx.templates.get(t)) {
            for spawn in &template.inventory {
                if spawn.roll(&mut *ctx.rng) {
                    let item = ItemEntity::new(ctx.ids.next_item(), spawn.name.clone(), spawn.amount);
                    if ch.inventory.add(item).is_some() {
                        debug!("Inventory full while restocking {}", ch.id);
                    }
                }
            }
        }
        let id = ch.id;
        let name = ch.name.clone();
        if self.add_character(ch).is_ok() {
            debug!("Character {} respawned on map {} at {:?}", id, self.id, position);
            ctx.events.publish(WorldEvent::CharacterRespawned { map: self.id, id, position });
            ctx.events.publish(WorldEvent::CharacterSpawned { map: self.id, id, name, position });
        }
    }
}

impl Disposable for Map {
    fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        for (_, mut ch) in std::mem::take(&mut self.characters) {
            ch.dispose();
        }
        for mut ch in self.respawns.take_all() {
            ch.dispose();
        }
        self.items.clear();
        self.grhs.clear();
        self.index.clear();
        self.walls.clear();
        true
    }
}
