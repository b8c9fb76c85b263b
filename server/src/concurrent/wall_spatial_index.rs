// gore_server/server/src/concurrent/wall_spatial_index.rs
use crate::core::types::{Rect, Wall};
use rstar::{RTree, RTreeObject, AABB};
use tracing::debug;

#[derive(Clone, Debug)]
struct SpatialWall {
    wall: Wall,
}

impl RTreeObject for SpatialWall {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        let min = self.wall.bounds.min();
        let max = self.wall.bounds.max();
        AABB::from_corners([min.x, min.y], [max.x, max.y])
    }
}

/// R-tree over a map's static walls, used for collision resolution.
pub struct WallSpatialIndex {
    rtree: RTree<SpatialWall>,
}

impl WallSpatialIndex {
    pub fn new() -> Self {
        WallSpatialIndex { rtree: RTree::new() }
    }

    /// Build or rebuild the index from a collection of walls
    pub fn rebuild(&mut self, walls: &[Wall]) {
        let spatial_walls: Vec<SpatialWall> = walls.iter().map(|w| SpatialWall { wall: *w }).collect();
        self.rtree = RTree::bulk_load(spatial_walls);
        debug!("Wall spatial index rebuilt with {} walls", self.rtree.size());
    }

    /// Walls whose bounds overlap `rect`. Touching edges count as overlap.
    pub fn query_rect(&self, rect: &Rect) -> Vec<Wall> {
        let min = rect.min();
        let max = rect.max();
        let query = AABB::from_corners([min.x, min.y], [max.x, max.y]);
        self.rtree
            .locate_in_envelope_intersecting(&query)
            .map(|sw| sw.wall)
            .collect()
    }

    pub fn size(&self) -> usize {
        self.rtree.size()
    }

    pub fn clear(&mut self) {
        self.rtree = RTree::new();
    }
}

impl Default for WallSpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}
