// gore_server/server/src/core/constants.rs
use std::time::Duration;

pub const SERVER_TICK_RATE: u64 = 30;
pub const TICK_DURATION_MS: u64 = 1000 / SERVER_TICK_RATE;
pub const TICK_DURATION: Duration = Duration::from_millis(TICK_DURATION_MS);

// Transport
pub const MAX_DATAGRAM_SIZE: usize = 1024;
pub const UDP_RECV_BUFFER_SIZE: usize = 2048;
pub const MAX_TCP_FRAME_SIZE: usize = 8192;
pub const TCP_FRAME_HEADER_LEN: usize = 2;

// Spatial index
pub const SPATIAL_INDEX_CELL_SIZE: f32 = 128.0;

// Simulation
pub const MAX_TICK_DELTA_MS: u64 = 250;
pub const DEFAULT_GRAVITY_Y: f32 = 0.0009;
pub const DEFAULT_MAX_VELOCITY_X: f32 = 1.0;
pub const DEFAULT_MAX_VELOCITY_Y: f32 = 1.0;
pub const CHARACTER_WALK_SPEED: f32 = 0.18;
pub const CHARACTER_JUMP_VELOCITY: f32 = -0.48;
pub const MELEE_RANGE: f32 = 24.0;
pub const PICKUP_RANGE: f32 = 16.0;
pub const ATTACK_COOLDOWN_MS: u64 = 500;
pub const INVENTORY_SLOTS: usize = 36;
pub const MAP_ITEM_LIFETIME_MS: u64 = 180_000;

// Server cadence (ms)
pub const SYNC_EXTRA_USER_INFO_RATE_MS: u64 = 150;
pub const SLOW_TICK_LOG_MS: u64 = 12;

pub const MAX_USER_NAME_LEN: usize = 30;
pub const MAX_CHAT_LEN: usize = 250;
