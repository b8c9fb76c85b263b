// gore_server/server/src/concurrent/event_queue.rs
use crate::core::types::{CharacterId, ItemId, MapId, Vec2};
use crate::entities::stats::StatKind;
use crossbeam_queue::SegQueue;

/// Something the simulation wants the outside world to hear about.
#[derive(Clone, Debug, PartialEq)]
pub enum WorldEvent {
    UserJoined { user: String, map: MapId, character: CharacterId },
    UserLeft { user: String, map: MapId, character: CharacterId },
    CharacterSpawned { map: MapId, id: CharacterId, name: String, position: Vec2 },
    CharacterRemoved { map: MapId, id: CharacterId },
    CharacterDamaged { map: MapId, id: CharacterId, attacker: Option<CharacterId>, amount: i32 },
    CharacterKilled { map: MapId, id: CharacterId, killer: Option<CharacterId> },
    CharacterRespawned { map: MapId, id: CharacterId, position: Vec2 },
    /// Observer notification carrying both sides of the change.
    StatChanged { map: MapId, character: CharacterId, stat: StatKind, old: i32, new: i32 },
    ItemDropped { map: MapId, id: ItemId, name: String, position: Vec2 },
    ItemRemoved { map: MapId, id: ItemId },
    Chat { map: MapId, speaker: CharacterId, text: String },
}

impl WorldEvent {
    pub fn map(&self) -> MapId {
        match self {
            WorldEvent::UserJoined { map, .. }
            | WorldEvent::UserLeft { map, .. }
            | WorldEvent::CharacterSpawned { map, .. }
            | WorldEvent::CharacterRemoved { map, .. }
            | WorldEvent::CharacterDamaged { map, .. }
            | WorldEvent::CharacterKilled { map, .. }
            | WorldEvent::CharacterRespawned { map, .. }
            | WorldEvent::StatChanged { map, .. }
            | WorldEvent::ItemDropped { map, .. }
            | WorldEvent::ItemRemoved { map, .. }
            | WorldEvent::Chat { map, .. } => *map,
        }
    }

    pub fn default_priority(&self) -> EventPriority {
        match self {
            WorldEvent::CharacterKilled { .. }
            | WorldEvent::CharacterRemoved { .. }
            | WorldEvent::UserLeft { .. } => EventPriority::High,
            WorldEvent::Chat { .. } | WorldEvent::StatChanged { .. } => EventPriority::Low,
            _ => EventPriority::Normal,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventPriority {
    High,
    Normal,
    Low,
}

/// Lock-free event queue with priority.
pub struct WorldEventQueue {
    high_priority: SegQueue<WorldEvent>,
    normal_priority: SegQueue<WorldEvent>,
    low_priority: SegQueue<WorldEvent>,
}

impl WorldEventQueue {
    pub fn new() -> Self {
        WorldEventQueue {
            high_priority: SegQueue::new(),
            normal_priority: SegQueue::new(),
            low_priority: SegQueue::new(),
        }
    }

    pub fn publish(&self, event: WorldEvent) {
        let priority = event.default_priority();
        self.push(event, priority);
    }

    pub fn push(&self, event: WorldEvent, priority: EventPriority) {
        match priority {
            EventPriority::High => self.high_priority.push(event),
            EventPriority::Normal => self.normal_priority.push(event),
            EventPriority::Low => self.low_priority.push(event),
        }
    }

    pub fn pop(&self) -> Option<WorldEvent> {
        self.high_priority
            .pop()
            .or_else(|| self.normal_priority.pop())
            .or_else(|| self.low_priority.pop())
    }

    /// Pops everything currently queued, highest priority first.
    pub fn drain(&self) -> Vec<WorldEvent> {
        let mut batch = Vec::with_capacity(self.len());
        while let Some(event) = self.pop() {
            batch.push(event);
        }
        batch
    }

    pub fn is_empty(&self) -> bool {
        self.high_priority.is_empty() && self.normal_priority.is_empty() && self.low_priority.is_empty()
    }

    pub fn len(&self) -> usize {
        self.high_priority.len() + self.normal_priority.len() + self.low_priority.len()
    }
}

impl Default for WorldEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_priority_events_come_out_first() {
        let q = WorldEventQueue::new();
        q.publish(WorldEvent::Chat { map: MapId(1), speaker: CharacterId(1), text: "hi".into() });
        q.publish(WorldEvent::CharacterKilled { map: MapId(1), id: CharacterId(2), killer: None });
        q.publish(WorldEvent::ItemRemoved { map: MapId(1), id: ItemId(3) });

        let drained = q.drain();
        assert!(matches!(drained[0], WorldEvent::CharacterKilled { .. }));
        assert!(matches!(drained[1], WorldEvent::ItemRemoved { .. }));
        assert!(matches!(drained[2], WorldEvent::Chat { .. }));
        assert!(q.is_empty());
    }
}
