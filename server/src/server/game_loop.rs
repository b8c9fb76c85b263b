// gore_server/server/src/server/game_loop.rs
use super::instance::GameServer;
use crate::core::constants::SLOW_TICK_LOG_MS;
use crate::core::error::{ServerError, ServerResult};
use crate::world::UpdateOutcome;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

impl GameServer {
    /// Ticks the server at the configured rate until `shutdown` flips to
    /// `true` or a transport dies. Late ticks are skipped, not bunched up.
    pub async fn run_game_loop(&mut self, mut shutdown: watch::Receiver<bool>) -> ServerResult<()> {
        let tick_duration = self.config.tick_duration();
        let mut tick_timer = interval(tick_duration);
        tick_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let slow_frame = Duration::from_millis(SLOW_TICK_LOG_MS).max(tick_duration);

        info!("Game loop started. Tick rate: {}ms", tick_duration.as_millis());

        loop {
            tokio::select! {
                _ = tick_timer.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown requested");
                        break;
                    }
                    continue;
                }
            }

            let frame_start_time = Instant::now();
            match self.tick() {
                Ok(report) => {
                    if report.outcome == UpdateOutcome::ClockRegression {
                        warn!("Frame {} skipped: clock regression", report.frame);
                    }
                    // Log every 60 frames
                    if report.frame % 60 == 0 {
                        info!(
                            "Game loop running - Frame: {}, users: {}, in: {}, out: {}",
                            report.frame,
                            self.world().user_count(),
                            report.packets_in,
                            report.packets_out
                        );
                    }
                }
                Err(e @ ServerError::TransportFatal(_)) => {
                    error!("Stopping game loop: {}", e);
                    self.shutdown();
                    return Err(e);
                }
                Err(e) => {
                    error!("Game tick failed: {:?}", e);
                    continue;
                }
            }

            let frame_time = frame_start_time.elapsed();
            self.metrics.record_frame_time(frame_time);
            if frame_time > slow_frame {
                warn!("Frame {} took too long: {:?}", self.frame, frame_time);
            }
        }

        self.shutdown();
        Ok(())
    }
}
