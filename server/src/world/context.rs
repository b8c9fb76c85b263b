// gore_server/server/src/world/context.rs
use crate::concurrent::dispose_queue::DisposeStack;
use crate::concurrent::event_queue::WorldEventQueue;
use crate::core::config::EngineSettings;
use crate::core::types::{IdAllocator, MapId, Timestamp};
use crate::entities::character::Character;
use crate::entities::template::TemplateRegistry;
use crate::systems::ai::AiRegistry;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// Work a map cannot finish on its own and hands back to the world.
#[derive(Debug)]
pub enum MapTransfer {
    /// A killed NPC whose respawn map is a different map.
    Respawn { map: MapId, killed_at: Timestamp, character: Character },
}

/// Everything a map update may touch besides the map itself.
pub struct TickContext<'a> {
    pub now: Timestamp,
    pub delta_ms: u64,
    pub engine: &'a EngineSettings,
    pub dispose: &'a DisposeStack,
    pub events: &'a WorldEventQueue,
    pub templates: &'a TemplateRegistry,
    pub ai: &'a AiRegistry,
    pub ids: &'a IdAllocator,
    pub rng: &'a mut StdRng,
    pub transfers: &'a mut Vec<MapTransfer>,
}

/// Owned simulation services, lent out as a [`TickContext`].
pub struct SimResources {
    pub engine: EngineSettings,
    pub dispose: Arc<DisposeStack>,
    pub events: Arc<WorldEventQueue>,
    pub templates: TemplateRegistry,
    pub ai: AiRegistry,
    pub ids: IdAllocator,
    pub rng: StdRng,
}

impl SimResources {
    pub fn new(engine: EngineSettings, templates: TemplateRegistry, ai: AiRegistry, seed: u64) -> Self {
        SimResources {
            engine,
            dispose: Arc::new(DisposeStack::new()),
            events: Arc::new(WorldEventQueue::new()),
            templates,
            ai,
            ids: IdAllocator::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn context<'a>(&'a mut self, now: Timestamp, delta_ms: u64, transfers: &'a mut Vec<MapTransfer>) -> TickContext<'a> {
        TickContext {
            now,
            delta_ms,
            engine: &self.engine,
            dispose: &self.dispose,
            events: &self.events,
            templates: &self.templates,
            ai: &self.ai,
            ids: &self.ids,
            rng: &mut self.rng,
            transfers,
        }
    }
}
