// gore_server/server/src/systems/physics/collision.rs
use crate::concurrent::wall_spatial_index::WallSpatialIndex;
use crate::core::types::Rect;
use crate::entities::character::Character;

/// Pushes the character out of solid walls along x.
pub fn resolve_x(ch: &mut Character, walls: &WallSpatialIndex) {
    let bounds = ch.bounds();
    for wall in walls.query_rect(&bounds) {
        if wall.platform || !wall.bounds.intersects(&ch.bounds()) {
            continue;
        }
        if ch.velocity.x > 0.0 {
            ch.position.x = wall.bounds.x - ch.size.x;
        } else if ch.velocity.x < 0.0 {
            ch.position.x = wall.bounds.x + wall.bounds.width;
        }
        ch.velocity.x = 0.0;
    }
}

/// Pushes the character out of walls along y. Platforms only catch a
/// character whose feet were above them before the move.
pub fn resolve_y(ch: &mut Character, walls: &WallSpatialIndex, prev_bottom: f32) {
    let bounds = ch.bounds();
    for wall in walls.query_rect(&bounds) {
        if !wall.bounds.intersects(&ch.bounds()) {
            continue;
        }
        if ch.velocity.y > 0.0 {
            if wall.platform && prev_bottom > wall.bounds.y {
                continue;
            }
            ch.position.y = wall.bounds.y - ch.size.y;
            ch.velocity.y = 0.0;
            ch.on_ground = true;
        } else if ch.velocity.y < 0.0 && !wall.platform {
            ch.position.y = wall.bounds.y + wall.bounds.height;
            ch.velocity.y = 0.0;
        }
    }
}

pub fn clamp_to_bounds(ch: &mut Character, map: &Rect) {
    let max_x = (map.x + map.width - ch.size.x).max(map.x);
    if ch.position.x < map.x || ch.position.x > max_x {
        ch.position.x = ch.position.x.clamp(map.x, max_x);
        ch.velocity.x = 0.0;
    }
    let max_y = (map.y + map.height - ch.size.y).max(map.y);
    if ch.position.y >= max_y {
        ch.position.y = max_y;
        ch.velocity.y = ch.velocity.y.min(0.0);
        ch.on_ground = true;
    } else if ch.position.y < map.y {
        ch.position.y = map.y;
        ch.velocity.y = ch.velocity.y.max(0.0);
    }
}
