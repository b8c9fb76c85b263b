// gore_server/server/src/entities/template.rs
use super::stats::CharacterStats;
use crate::core::error::{ServerError, ServerResult};
use crate::core::types::Vec2;
use ahash::AHashMap;
use rand::Rng;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Clone, Debug, Deserialize)]
pub struct SpawnItem {
    pub name: String,
    #[serde(default = "one")]
    pub amount: u8,
    /// Probability in `0.0..=1.0` that the item is given on spawn.
    #[serde(default = "always")]
    pub chance: f32,
}

fn one() -> u8 { 1 }
fn always() -> f32 { 1.0 }
fn default_size() -> Vec2 { Vec2::new(24.0, 48.0) }

impl SpawnItem {
    pub fn roll<R: Rng>(&self, rng: &mut R) -> bool {
        self.chance >= 1.0 || rng.gen::<f32>() < self.chance
    }
}

/// Blueprint an NPC is created from.
#[derive(Clone, Debug, Deserialize)]
pub struct CharacterTemplate {
    pub name: String,
    #[serde(default)]
    pub stats: CharacterStats,
    #[serde(default)]
    pub ai: Option<String>,
    /// Seconds until respawn. Absent means the NPC is disposed on death.
    #[serde(default)]
    pub respawn_secs: Option<u32>,
    #[serde(default = "default_size")]
    pub size: Vec2,
    #[serde(default)]
    pub inventory: Vec<SpawnItem>,
    #[serde(default)]
    pub give_exp: u32,
    #[serde(default)]
    pub give_cash: u32,
}

#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: AHashMap<String, CharacterTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(text: &str) -> ServerResult<Self> {
        let list: Vec<CharacterTemplate> = serde_yaml::from_str(text)?;
        let mut registry = TemplateRegistry::new();
        for template in list {
            if registry.get(&template.name).is_some() {
                return Err(ServerError::ConfigError(format!("duplicate character template '{}'", template.name)));
            }
            registry.insert(template);
        }
        Ok(registry)
    }

    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let registry = Self::from_yaml_str(&text)?;
        info!("Loaded {} character templates from {}", registry.len(), path.display());
        Ok(registry)
    }

    pub fn insert(&mut self, template: CharacterTemplate) {
        self.templates.insert(template.name.to_ascii_lowercase(), template);
    }

    pub fn get(&self, name: &str) -> Option<&CharacterTemplate> {
        self.templates.get(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
