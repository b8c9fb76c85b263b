// gore_server/server/src/operational/monitoring/metrics.rs
use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Names the server's metrics and records per-frame figures.
///
/// Without an installed exporter every call is a no-op.
pub struct MetricsSystem {
    start_time: Instant,
}

impl MetricsSystem {
    pub fn new() -> Self {
        describe_counter!("game_frames_total", "Total number of game frames processed");
        describe_histogram!("game_frame_time_seconds", "Frame processing time in seconds");
        describe_gauge!("game_users_connected", "Number of logged-in users");
        describe_gauge!("game_uptime_seconds", "Seconds since the server started");
        describe_counter!("world_clock_regressions_total", "Ticks skipped because the clock went backwards");
        describe_counter!("world_disposed_total", "Objects torn down by the dispose drain");
        describe_counter!("world_invariant_violations_total", "Broken world invariants that were skipped");
        describe_counter!("world_user_lookup_fallbacks_total", "Users found by linear search after a tag miss");
        describe_counter!("world_rejected_broadcasts_total", "Broadcasts refused for an empty payload");
        describe_counter!("net_packets_dropped_total", "Inbound packets dropped, by reason");
        describe_counter!("net_udp_send_dropped_total", "Datagrams dropped because the socket was full");

        MetricsSystem { start_time: Instant::now() }
    }

    /// Starts the Prometheus scrape endpoint.
    pub fn install_exporter(addr: SocketAddr) -> Result<()> {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        Ok(())
    }

    pub fn record_frame_time(&self, duration: Duration) {
        histogram!("game_frame_time_seconds").record(duration.as_secs_f64());
        counter!("game_frames_total").increment(1);
        gauge!("game_uptime_seconds").set(self.start_time.elapsed().as_secs_f64());
    }

    pub fn update_user_count(&self, count: usize) {
        gauge!("game_users_connected").set(count as f64);
    }
}

impl Default for MetricsSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging() -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "gore_server_core=info,warn".into()))
        .with(fmt::layer())
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
