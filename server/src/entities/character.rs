// gore_server/server/src/entities/character.rs
use super::inventory::{Equipped, Inventory};
use super::item::ItemEntity;
use super::stats::{CharacterStats, StatChange, StatKind};
use super::template::CharacterTemplate;
use crate::concurrent::dispose_queue::Disposable;
use crate::concurrent::event_queue::{WorldEvent, WorldEventQueue};
use crate::core::constants::{CHARACTER_JUMP_VELOCITY, INVENTORY_SLOTS, MELEE_RANGE};
use crate::core::types::{CharacterId, Direction, MapId, Rect, Timestamp, Vec2};
use crate::systems::ai::AiStrategy;
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharacterKind {
    Npc,
    User,
}

/// Where and when a killed NPC comes back.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RespawnPolicy {
    pub map: MapId,
    pub secs: u32,
    pub position: Vec2,
}

impl RespawnPolicy {
    pub fn delay_ms(&self) -> u64 {
        self.secs as u64 * 1000
    }
}

/// Any living thing on a map. NPC and user behaviour differ only through
/// `kind` and the optional `ai` and `respawn` capabilities.
#[derive(Debug)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub kind: CharacterKind,
    pub template: Option<String>,
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: Vec2,
    pub heading: Direction,
    pub on_ground: bool,
    pub inventory: Inventory,
    pub equipped: Equipped,
    pub ai: Option<Box<dyn AiStrategy>>,
    pub respawn: Option<RespawnPolicy>,
    pub exp: u32,
    pub cash: u32,
    /// Paid to the user that lands the killing blow.
    pub give_exp: u32,
    pub give_cash: u32,
    pub last_attack: Timestamp,
    moving: Option<Direction>,
    map: Option<MapId>,
    stats: CharacterStats,
    alive: bool,
    disposed: bool,
}

impl Character {
    pub fn new(id: CharacterId, name: impl Into<String>, kind: CharacterKind, stats: CharacterStats, position: Vec2) -> Self {
        Character {
            id,
            name: name.into(),
            kind,
            template: None,
            position,
            velocity: Vec2::zero(),
            size: Vec2::new(24.0, 48.0),
            heading: Direction::Right,
            on_ground: false,
            inventory: Inventory::new(INVENTORY_SLOTS),
            equipped: Equipped::default(),
            ai: None,
            respawn: None,
            exp: 0,
            cash: 0,
            give_exp: 0,
            give_cash: 0,
            last_attack: 0,
            moving: None,
            map: None,
            stats,
            alive: true,
            disposed: false,
        }
    }

    pub fn from_template(id: CharacterId, template: &CharacterTemplate, position: Vec2) -> Self {
        let mut ch = Character::new(id, template.name.clone(), CharacterKind::Npc, template.stats, position);
        ch.template = Some(template.name.clone());
        ch.size = template.size;
        ch.give_exp = template.give_exp;
        ch.give_cash = template.give_cash;
        ch
    }

    pub fn is_npc(&self) -> bool {
        self.kind == CharacterKind::Npc
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Map the character is currently registered on.
    pub fn map(&self) -> Option<MapId> {
        self.map
    }

    pub fn stats(&self) -> &CharacterStats {
        &self.stats
    }

    pub fn stat(&self, stat: StatKind) -> i32 {
        self.stats.get(stat)
    }

    pub fn moving(&self) -> Option<Direction> {
        self.moving
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_position(self.position, self.size)
    }

    pub fn center(&self) -> Vec2 {
        self.bounds().center()
    }

    /// Sets a stat and notifies observers with the old and new value.
    pub fn set_stat(&mut self, stat: StatKind, value: i32, events: &WorldEventQueue) -> Option<StatChange> {
        let change = self.stats.set(stat, value)?;
        if let Some(map) = self.map {
            events.publish(WorldEvent::StatChanged {
                map,
                character: self.id,
                stat: change.stat,
                old: change.old,
                new: change.new,
            });
        }
        Some(change)
    }

    /// Refills HP and MP.
    pub fn restore(&mut self, events: &WorldEventQueue) {
        self.set_stat(StatKind::Hp, self.stats.max_hp, events);
        self.set_stat(StatKind::Mp, self.stats.max_mp, events);
    }

    /// Applies damage. Returns `true` when HP reached zero.
    pub fn damage(&mut self, amount: i32, events: &WorldEventQueue) -> bool {
        let hp = self.stats.hp - amount.max(0);
        self.set_stat(StatKind::Hp, hp, events);
        self.stats.hp == 0
    }

    pub fn set_moving(&mut self, direction: Option<Direction>) {
        if let Some(dir) = direction {
            self.heading = dir;
        }
        self.moving = direction;
    }

    pub fn jump(&mut self) -> bool {
        if !self.alive || !self.on_ground {
            return false;
        }
        self.velocity.y = CHARACTER_JUMP_VELOCITY;
        self.on_ground = false;
        true
    }

    /// Area in front of the character hit by a melee swing.
    pub fn attack_area(&self) -> Rect {
        let b = self.bounds();
        match self.heading {
            Direction::Right => Rect::new(b.x + b.width, b.y, MELEE_RANGE, b.height),
            Direction::Left => Rect::new(b.x - MELEE_RANGE, b.y, MELEE_RANGE, b.height),
        }
    }

    pub fn attack_damage_against(&self, target: &Character) -> i32 {
        (self.stats.str - target.stats.def).max(1)
    }

    /// Empties the inventory for dropping on death. Equipment is destroyed.
    pub fn take_drops(&mut self) -> Vec<ItemEntity> {
        let lost = self.equipped.take_all();
        if !lost.is_empty() {
            trace!("Character {} lost {} equipped items", self.id, lost.len());
        }
        self.inventory.take_all()
    }

    /// Credits a kill reward.
    pub fn reward(&mut self, exp: u32, cash: u32) {
        self.exp = self.exp.saturating_add(exp);
        self.cash = self.cash.saturating_add(cash);
    }

    pub fn teleport(&mut self, position: Vec2) {
        self.position = position;
        self.velocity = Vec2::zero();
        self.on_ground = false;
    }

    /// Brings a dead character back at its spawn point with full HP and MP.
    pub fn respawn(&mut self, position: Vec2) {
        self.stats.hp = self.stats.max_hp;
        self.stats.mp = self.stats.max_mp;
        self.moving = None;
        self.teleport(position);
        self.alive = true;
    }

    pub(crate) fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
    }

    pub(crate) fn set_map(&mut self, map: Option<MapId>) {
        self.map = map;
    }
}

impl Disposable for Character {
    fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        self.alive = false;
        self.map = None;
        self.ai = None;
        self.inventory.take_all();
        self.equipped.take_all();
        true
    }
}
