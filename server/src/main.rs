// gore_server/server/src/main.rs
use gore_server_core::core::config::ServerConfig;
use gore_server_core::core::time::MonotonicClock;
use gore_server_core::entities::template::TemplateRegistry;
use gore_server_core::operational::monitoring::metrics::{init_logging, MetricsSystem};
use gore_server_core::persistence::MemoryCharacterStore;
use gore_server_core::systems::ai::AiRegistry;
use gore_server_core::world::map_loader::YamlMapLoader;
use gore_server_core::{GameServer, World};

use anyhow::Context;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);

        // Also log to file in case stderr is lost
        if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open("panic.log") {
            use std::io::Write;
            use std::time::SystemTime;

            let timestamp = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            writeln!(file, "PANIC at {}: {}", timestamp, panic_info).ok();
        }

        eprintln!("Backtrace:\n{:?}", std::backtrace::Backtrace::capture());
    }));

    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {:?}", e);
        return Err(e);
    }

    info!("Gore server starting up...");

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(&path).with_context(|| format!("Failed to load config from {}", path))?,
        None => ServerConfig::default(),
    };
    let config = Arc::new(config);
    info!("Server configuration loaded. Tick rate: {}", config.tick_rate);

    if let Some(addr) = config.metrics_listen {
        MetricsSystem::install_exporter(addr)?;
        info!("Prometheus metrics on http://{}/metrics", addr);
    }

    let templates = TemplateRegistry::load(config.content_dir.join("templates.yaml"))
        .context("Failed to load character templates")?;
    let loader = YamlMapLoader::new(&config.content_dir);
    let store = Arc::new(MemoryCharacterStore::new());
    let world = World::new(config.clone(), &loader, templates, AiRegistry::with_builtins(), store)
        .context("Failed to load world")?;

    let mut server = GameServer::start(config.clone(), world, Arc::new(MonotonicClock::new()))
        .await
        .context("Failed to start transports")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        shutdown_tx.send(true).ok();
    });

    server.run_game_loop(shutdown_rx).await?;

    info!("Gore server shut down.");
    Ok(())
}
