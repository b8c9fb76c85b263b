// gore_server/server/src/concurrent/spatial_index.rs

use crate::core::types::{CharacterId, ItemId, MapGrhId, Rect, Vec2, WallId};
use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Character,
    Item,
    Wall,
    MapGrh,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: u64,
}

/// Id types that can be stored in and queried from the index.
pub trait SpatialId: Copy + Ord {
    const KIND: EntityKind;
    fn raw(self) -> u64;
    fn from_raw(raw: u64) -> Self;

    fn key(self) -> EntityKey {
        EntityKey { kind: Self::KIND, id: self.raw() }
    }
}

macro_rules! spatial_id {
    ($ty:ty, $kind:expr) => {
        impl SpatialId for $ty {
            const KIND: EntityKind = $kind;
            fn raw(self) -> u64 { self.0 }
            fn from_raw(raw: u64) -> Self { Self(raw) }
        }
    };
}

spatial_id!(CharacterId, EntityKind::Character);
spatial_id!(ItemId, EntityKind::Item);
spatial_id!(WallId, EntityKind::Wall);
spatial_id!(MapGrhId, EntityKind::MapGrh);

#[derive(Debug)]
struct Entry {
    bounds: Rect,
    cells: SmallVec<[usize; 4]>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialIndexStats {
    pub entities: usize,
    pub characters: usize,
    pub items: usize,
    pub walls: usize,
    pub grhs: usize,
    pub occupied_cells: usize,
    pub total_cells: usize,
}

/// Uniform grid over one map.
///
/// Every entity remembers the cells it covers, so moves and removals touch
/// only those cells. Queries take `&self` and never mutate.
#[derive(Debug)]
pub struct MapSpatialIndex {
    cells: Vec<AHashSet<EntityKey>>,
    grid_width: usize,
    grid_height: usize,
    cell_size: f32,
    entries: AHashMap<EntityKey, Entry>,
}

impl MapSpatialIndex {
    pub fn new(world_width: f32, world_height: f32, cell_size: f32) -> Self {
        let grid_width = ((world_width / cell_size).ceil() as usize).max(1);
        let grid_height = ((world_height / cell_size).ceil() as usize).max(1);
        let total_cells = grid_width * grid_height;

        debug!(
            "Spatial index initialized: {}x{} grid, {} total cells, cell size: {}",
            grid_width, grid_height, total_cells, cell_size
        );

        MapSpatialIndex {
            cells: (0..total_cells).map(|_| AHashSet::new()).collect(),
            grid_width,
            grid_height,
            cell_size,
            entries: AHashMap::new(),
        }
    }

    #[inline]
    fn grid_coord(&self, v: f32, max: usize) -> usize {
        ((v / self.cell_size).floor().max(0.0) as usize).min(max.saturating_sub(1))
    }

    #[inline]
    fn get_cell_index(&self, p: Vec2) -> usize {
        self.grid_coord(p.y, self.grid_height) * self.grid_width + self.grid_coord(p.x, self.grid_width)
    }

    fn cells_for_rect(&self, rect: &Rect) -> SmallVec<[usize; 4]> {
        let min_x = self.grid_coord(rect.x, self.grid_width);
        let max_x = self.grid_coord(rect.x + rect.width, self.grid_width);
        let min_y = self.grid_coord(rect.y, self.grid_height);
        let max_y = self.grid_coord(rect.y + rect.height, self.grid_height);

        let mut out = SmallVec::new();
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                out.push(y * self.grid_width + x);
            }
        }
        out
    }

    /// Adds an entity. Returns `false` if it is already indexed.
    pub fn insert<T: SpatialId>(&mut self, id: T, bounds: Rect) -> bool {
        let key = id.key();
        if self.entries.contains_key(&key) {
            return false;
        }
        let cells = self.cells_for_rect(&bounds);
        for &c in &cells {
            self.cells[c].insert(key);
        }
        self.entries.insert(key, Entry { bounds, cells });
        true
    }

    /// Moves an entity. Returns `false` if it is not indexed.
    pub fn update<T: SpatialId>(&mut self, id: T, bounds: Rect) -> bool {
        let key = id.key();
        let new_cells = self.cells_for_rect(&bounds);
        let Some(entry) = self.entries.get_mut(&key) else {
            return false;
        };
        entry.bounds = bounds;
        if entry.cells != new_cells {
            for &c in &entry.cells {
                self.cells[c].remove(&key);
            }
            for &c in &new_cells {
                self.cells[c].insert(key);
            }
            trace!("{:?} moved to cells {:?}", key, new_cells);
            entry.cells = new_cells;
        }
        true
    }

    pub fn remove<T: SpatialId>(&mut self, id: T) -> Option<Rect> {
        let key = id.key();
        let entry = self.entries.remove(&key)?;
        for &c in &entry.cells {
            self.cells[c].remove(&key);
        }
        Some(entry.bounds)
    }

    pub fn contains<T: SpatialId>(&self, id: T) -> bool {
        self.entries.contains_key(&id.key())
    }

    pub fn bounds_of<T: SpatialId>(&self, id: T) -> Option<Rect> {
        self.entries.get(&id.key()).map(|e| e.bounds)
    }

    /// First entity of type `T` (lowest id) whose bounds contain `point`.
    pub fn get_entity<T: SpatialId>(&self, point: Vec2) -> Option<T> {
        self.cells
            .get(self.get_cell_index(point))?
            .iter()
            .filter(|k| k.kind == T::KIND)
            .filter(|k| self.entries.get(*k).map_or(false, |e| e.bounds.contains(point)))
            .map(|k| T::from_raw(k.id))
            .min()
    }

    /// Every entity of type `T` intersecting `rect`, sorted by id.
    pub fn get_entities<T: SpatialId>(&self, rect: &Rect) -> Vec<T> {
        let mut seen = AHashSet::new();
        let mut out = Vec::new();
        for c in self.cells_for_rect(rect) {
            for key in self.cells[c].iter().filter(|k| k.kind == T::KIND) {
                if !seen.insert(*key) {
                    continue;
                }
                if self.entries.get(key).map_or(false, |e| e.bounds.intersects(rect)) {
                    out.push(T::from_raw(key.id));
                }
            }
        }
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
        self.entries.clear();
    }

    pub fn get_stats(&self) -> SpatialIndexStats {
        let mut stats = SpatialIndexStats {
            entities: self.entries.len(),
            total_cells: self.cells.len(),
            occupied_cells: self.cells.iter().filter(|c| !c.is_empty()).count(),
            ..Default::default()
        };
        for key in self.entries.keys() {
            match key.kind {
                EntityKind::Character => stats.characters += 1,
                EntityKind::Item => stats.items += 1,
                EntityKind::Wall => stats.walls += 1,
                EntityKind::MapGrh => stats.grhs += 1,
            }
        }
        stats
    }
}
