// gore_server/server/src/systems/physics/mod.rs
pub mod collision;

use crate::concurrent::wall_spatial_index::WallSpatialIndex;
use crate::core::config::EngineSettings;
use crate::core::constants::CHARACTER_WALK_SPEED;
use crate::core::types::{Direction, Rect, Vec2};
use crate::entities::character::Character;
use collision::{clamp_to_bounds, resolve_x, resolve_y};

/// Longest slice of time integrated in one go, so fast movers cannot skip walls.
const MAX_STEP_MS: u64 = 16;

/// Advances one character by `delta_ms`. Returns `true` if it moved.
pub fn step_character(
    ch: &mut Character,
    engine: &EngineSettings,
    delta_ms: u64,
    walls: &WallSpatialIndex,
    map_bounds: &Rect,
) -> bool {
    if delta_ms == 0 {
        return false;
    }
    let start = ch.position;

    ch.velocity.x = match ch.moving() {
        Some(Direction::Left) => -CHARACTER_WALK_SPEED,
        Some(Direction::Right) => CHARACTER_WALK_SPEED,
        None => 0.0,
    };

    let mut remaining = delta_ms;
    while remaining > 0 {
        let dt = remaining.min(MAX_STEP_MS) as f32;
        remaining -= remaining.min(MAX_STEP_MS);

        ch.velocity = clamp_velocity(ch.velocity.add(engine.gravity.scale(dt)), engine.max_velocity);

        ch.position.x += ch.velocity.x * dt;
        resolve_x(ch, walls);

        let prev_bottom = ch.position.y + ch.size.y;
        ch.position.y += ch.velocity.y * dt;
        ch.on_ground = false;
        resolve_y(ch, walls, prev_bottom);

        clamp_to_bounds(ch, map_bounds);
    }

    ch.position != start
}

pub fn clamp_velocity(v: Vec2, max: Vec2) -> Vec2 {
    Vec2::new(v.x.clamp(-max.x, max.x), v.y.clamp(-max.y, max.y))
}
