// gore_server/server/src/persistence.rs
//! Saved user characters. The world loads a record on login and writes it
//! back when the user is disposed.
use crate::core::error::ServerResult;
use crate::core::types::{MapId, Vec2};
use crate::entities::character::Character;
use crate::entities::stats::CharacterStats;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub name: String,
    pub map: MapId,
    pub position: Vec2,
    pub stats: CharacterStats,
    pub exp: u32,
    pub cash: u32,
    /// Item name and stack size per occupied inventory slot.
    #[serde(default)]
    pub inventory: Vec<(String, u8)>,
}

impl CharacterRecord {
    pub fn from_character(ch: &Character, map: MapId) -> Self {
        CharacterRecord {
            name: ch.name.clone(),
            map,
            position: ch.position,
            stats: *ch.stats(),
            exp: ch.exp,
            cash: ch.cash,
            inventory: ch.inventory.items().map(|i| (i.name.clone(), i.amount)).collect(),
        }
    }
}

pub trait CharacterStore: Send + Sync {
    fn load(&self, name: &str) -> ServerResult<Option<CharacterRecord>>;
    fn save(&self, record: &CharacterRecord) -> ServerResult<()>;
}

/// Keeps records for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryCharacterStore {
    records: DashMap<String, CharacterRecord>,
}

impl MemoryCharacterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CharacterStore for MemoryCharacterStore {
    fn load(&self, name: &str) -> ServerResult<Option<CharacterRecord>> {
        Ok(self.records.get(&name.to_lowercase()).map(|r| r.value().clone()))
    }

    fn save(&self, record: &CharacterRecord) -> ServerResult<()> {
        debug!("Saving character '{}'", record.name);
        self.records.insert(record.name.to_lowercase(), record.clone());
        Ok(())
    }
}
