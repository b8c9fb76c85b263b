// gore_server/server/src/core/config.rs
use super::constants::*;
use super::error::{ServerError, ServerResult};
use super::types::{MapId, Vec2};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

/// Physics constants shared by every map.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Acceleration applied per millisecond.
    pub gravity: Vec2,
    /// Absolute per-axis velocity cap.
    pub max_velocity: Vec2,
    /// How long a dropped item stays on the ground. Zero keeps it forever.
    pub item_lifetime_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            gravity: Vec2::new(0.0, DEFAULT_GRAVITY_Y),
            max_velocity: Vec2::new(DEFAULT_MAX_VELOCITY_X, DEFAULT_MAX_VELOCITY_Y),
            item_lifetime_ms: MAP_ITEM_LIFETIME_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub tick_rate: u64,
    pub tcp_bind: SocketAddr,
    pub udp_bind: SocketAddr,
    pub max_datagram_size: usize,
    pub max_frame_size: usize,
    pub content_dir: PathBuf,
    pub start_map: MapId,
    pub max_tick_delta_ms: u64,
    pub sync_extra_user_info_rate_ms: u64,
    pub metrics_listen: Option<SocketAddr>,
    pub engine: EngineSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            tick_rate: SERVER_TICK_RATE,
            tcp_bind: SocketAddr::from(([0, 0, 0, 0], 44445)),
            udp_bind: SocketAddr::from(([0, 0, 0, 0], 0)),
            max_datagram_size: MAX_DATAGRAM_SIZE,
            max_frame_size: MAX_TCP_FRAME_SIZE,
            content_dir: PathBuf::from("content"),
            start_map: MapId(1),
            max_tick_delta_ms: MAX_TICK_DELTA_MS,
            sync_extra_user_info_rate_ms: SYNC_EXTRA_USER_INFO_RATE_MS,
            metrics_listen: None,
            engine: EngineSettings::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&text)?;
        config.validate()?;
        info!("Loaded server configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.tick_rate == 0 || self.tick_rate > 1000 {
            return Err(ServerError::ConfigError(format!("tick_rate must be in 1..=1000, got {}", self.tick_rate)));
        }
        if self.max_datagram_size == 0 || self.max_datagram_size > u16::MAX as usize {
            return Err(ServerError::ConfigError(format!("invalid max_datagram_size {}", self.max_datagram_size)));
        }
        if self.max_frame_size == 0 || self.max_frame_size > u16::MAX as usize {
            return Err(ServerError::ConfigError(format!("invalid max_frame_size {}", self.max_frame_size)));
        }
        Ok(())
    }

    pub fn tick_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis((1000 / self.tick_rate.max(1)).max(1))
    }
}
