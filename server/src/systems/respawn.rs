// gore_server/server/src/systems/respawn.rs
use crate::core::types::{CharacterId, Timestamp};
use crate::entities::character::Character;
use tracing::debug;

/// Dead characters waiting to come back, ordered by wake time.
///
/// Characters in here belong to no spatial index.
#[derive(Debug, Default)]
pub struct RespawnScheduler {
    queue: Vec<(Timestamp, Character)>,
}

impl RespawnScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, wake: Timestamp, character: Character) {
        debug!("Character {} scheduled to respawn at {}", character.id, wake);
        // Equal wake times keep insertion order.
        let idx = self.queue.partition_point(|(t, _)| *t <= wake);
        self.queue.insert(idx, (wake, character));
    }

    /// Removes every character whose wake time is `<= now`.
    pub fn take_ready(&mut self, now: Timestamp) -> Vec<Character> {
        let ready = self.queue.partition_point(|(t, _)| *t <= now);
        self.queue.drain(..ready).map(|(_, ch)| ch).collect()
    }

    pub fn wake_time_of(&self, id: CharacterId) -> Option<Timestamp> {
        self.queue.iter().find(|(_, ch)| ch.id == id).map(|(t, _)| *t)
    }

    pub fn contains(&self, id: CharacterId) -> bool {
        self.wake_time_of(id).is_some()
    }

    pub fn next_wake(&self) -> Option<Timestamp> {
        self.queue.first().map(|(t, _)| *t)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Empties the scheduler, e.g. when the owning map is torn down.
    pub fn take_all(&mut self) -> Vec<Character> {
        self.queue.drain(..).map(|(_, ch)| ch).collect()
    }
}
