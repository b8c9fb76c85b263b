// gore_server/server/src/systems/ai/mod.rs
mod strategies;

pub use strategies::{AggressiveAi, IdleAi, WanderAi};

use crate::core::types::{CharacterId, Direction, Timestamp, Vec2};
use crate::entities::character::Character;
use ahash::AHashMap;
use std::fmt;
use tracing::{error, warn};

/// What an NPC wants to do this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AiAction {
    Idle,
    Move(Direction),
    Stop,
    Jump,
    Attack,
}

/// Read-only snapshot of the map handed to AI.
pub struct AiView<'a> {
    pub now: Timestamp,
    /// Living user characters on the map: id and center point.
    pub users: &'a [(CharacterId, Vec2)],
}

impl<'a> AiView<'a> {
    pub fn nearest_user(&self, from: Vec2, radius: f32) -> Option<(CharacterId, Vec2)> {
        let r2 = radius * radius;
        self.users
            .iter()
            .map(|&(id, pos)| (id, pos, pos.distance_squared(from)))
            .filter(|&(_, _, d)| d <= r2)
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(id, pos, _)| (id, pos))
    }
}

pub trait AiStrategy: Send + fmt::Debug {
    fn name(&self) -> &'static str;
    fn update(&mut self, actor: &Character, view: &AiView<'_>) -> AiAction;
}

pub type AiFactory = fn(seed: u64) -> Box<dyn AiStrategy>;

fn idle(_seed: u64) -> Box<dyn AiStrategy> {
    Box::new(IdleAi)
}

fn wander(seed: u64) -> Box<dyn AiStrategy> {
    Box::new(WanderAi::new(seed))
}

fn aggressive(seed: u64) -> Box<dyn AiStrategy> {
    Box::new(AggressiveAi::new(seed))
}

/// Explicit name-to-constructor table, filled at startup.
#[derive(Default)]
pub struct AiRegistry {
    factories: AHashMap<String, AiFactory>,
}

impl AiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("idle", idle);
        registry.register("wander", wander);
        registry.register("aggressive", aggressive);
        registry
    }

    /// Returns `false` if `name` replaced an earlier registration.
    pub fn register(&mut self, name: &str, factory: AiFactory) -> bool {
        let replaced = self.factories.insert(name.to_ascii_lowercase(), factory).is_some();
        if replaced {
            warn!("AI factory '{}' registered twice; keeping the latest", name);
        }
        !replaced
    }

    pub fn create(&self, name: &str, seed: u64) -> Option<Box<dyn AiStrategy>> {
        match self.factories.get(&name.to_ascii_lowercase()) {
            Some(factory) => Some(factory(seed)),
            None => {
                error!("Unknown AI '{}', character will have no AI", name);
                None
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for AiRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("AiRegistry").field("factories", &names).finish()
    }
}
