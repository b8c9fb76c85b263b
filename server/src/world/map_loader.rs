// gore_server/server/src/world/map_loader.rs
use crate::core::error::{ServerError, ServerResult};
use crate::core::types::{MapId, Rect, Vec2};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Clone, Debug, Deserialize)]
pub struct WallDefinition {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub platform: bool,
}

impl WallDefinition {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct MapGrhDefinition {
    pub grh: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub foreground: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NpcSpawnDefinition {
    pub template: String,
    pub position: Vec2,
    #[serde(default = "one")]
    pub count: u8,
    /// Defaults to the map the NPC spawns on.
    #[serde(default)]
    pub respawn_map: Option<MapId>,
}

fn one() -> u8 {
    1
}

/// On-disk description of one map.
#[derive(Clone, Debug, Deserialize)]
pub struct MapDefinition {
    pub id: MapId,
    pub name: String,
    pub width: f32,
    pub height: f32,
    pub spawn: Vec2,
    #[serde(default)]
    pub walls: Vec<WallDefinition>,
    #[serde(default)]
    pub grhs: Vec<MapGrhDefinition>,
    #[serde(default)]
    pub npcs: Vec<NpcSpawnDefinition>,
}

impl MapDefinition {
    pub fn empty(id: MapId, width: f32, height: f32) -> Self {
        MapDefinition {
            id,
            name: format!("map {}", id),
            width,
            height,
            spawn: Vec2::new(width * 0.5, 0.0),
            walls: Vec::new(),
            grhs: Vec::new(),
            npcs: Vec::new(),
        }
    }
}

/// Given a map id, produces its definition.
pub trait MapLoader {
    fn map_ids(&self) -> ServerResult<Vec<MapId>>;
    fn load(&self, id: MapId) -> ServerResult<MapDefinition>;
}

/// Reads `<content>/maps/<id>.yaml`.
#[derive(Debug, Clone)]
pub struct YamlMapLoader {
    dir: PathBuf,
}

impl YamlMapLoader {
    pub fn new(content_dir: impl AsRef<Path>) -> Self {
        YamlMapLoader { dir: content_dir.as_ref().join("maps") }
    }

    fn path_for(&self, id: MapId) -> PathBuf {
        self.dir.join(format!("{}.yaml", id))
    }
}

impl MapLoader for YamlMapLoader {
    fn map_ids(&self) -> ServerResult<Vec<MapId>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse::<u16>().ok()) {
                Some(id) => ids.push(MapId(id)),
                None => warn!("Ignoring map file with non-numeric name: {}", path.display()),
            }
        }
        ids.sort();
        debug!("Found {} map files in {}", ids.len(), self.dir.display());
        Ok(ids)
    }

    fn load(&self, id: MapId) -> ServerResult<MapDefinition> {
        let path = self.path_for(id);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| ServerError::NotFound(format!("map {} ({}): {}", id, path.display(), e)))?;
        let def: MapDefinition = serde_yaml::from_str(&text)?;
        if def.id != id {
            return Err(ServerError::ConfigError(format!(
                "{} declares map id {} but is named for {}",
                path.display(),
                def.id,
                id
            )));
        }
        Ok(def)
    }
}

/// Serves definitions held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticMapLoader {
    maps: Vec<MapDefinition>,
}

impl StaticMapLoader {
    pub fn new(maps: Vec<MapDefinition>) -> Self {
        StaticMapLoader { maps }
    }
}

impl MapLoader for StaticMapLoader {
    fn map_ids(&self) -> ServerResult<Vec<MapId>> {
        let mut ids: Vec<MapId> = self.maps.iter().map(|m| m.id).collect();
        ids.sort();
        Ok(ids)
    }

    fn load(&self, id: MapId) -> ServerResult<MapDefinition> {
        self.maps
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| ServerError::NotFound(format!("map {}", id)))
    }
}
