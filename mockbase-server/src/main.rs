use actix_web::{web, App, HttpServer};
use mockbase::{snapshot, Registry, SnapshotWorker};
use std::sync::Arc;
use std::time::Duration;

mod handlers;

/// Shared application state
pub struct AppState {
    pub registry: Arc<Registry>,
}

/// Server settings, read from `MOCKBASE_*` environment variables.
struct Config {
    data_dir: String,
    host: String,
    port: u16,
    mount_path: String,
    snapshot_interval: Duration,
}

impl Config {
    fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Config {
            data_dir: var("MOCKBASE_DATA_DIR").unwrap_or_else(|| "data".to_string()),
            host: var("MOCKBASE_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: var("MOCKBASE_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            mount_path: handlers::normalize_mount_path(
                &var("MOCKBASE_MOUNT_PATH").unwrap_or_default(),
            ),
            snapshot_interval: var("MOCKBASE_SNAPSHOT_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(snapshot::DEFAULT_INTERVAL),
        }
    }
}

/// How long the panic hook waits for each store's lock before skipping it.
const PANIC_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Save every dirty resource when any thread panics, then run the previous
/// hook. A store whose lock is held, possibly by the panicking thread, is
/// skipped after [`PANIC_FLUSH_TIMEOUT`].
fn install_panic_flush(registry: Arc<Registry>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("Panic, saving resources: {info}");
        match registry.save_all_within(PANIC_FLUSH_TIMEOUT) {
            Ok(n) => log::info!("Saved {n} resources after panic"),
            Err(e) => log::error!("Failed to save resources after panic: {e}"),
        }
        previous(info);
    }));
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();
    log::info!("Starting Mockbase server");

    let config = Config::from_env();

    log::info!("Loading resources from: {}", config.data_dir);
    let registry = Registry::load_dir(&config.data_dir).map_err(|e| {
        log::error!("Failed to load resources: {e}");
        std::io::Error::other(e.to_string())
    })?;
    let registry = Arc::new(registry);
    install_panic_flush(registry.clone());

    let worker = SnapshotWorker::start(registry.clone(), config.snapshot_interval);
    let state = web::Data::new(AppState {
        registry: registry.clone(),
    });

    let mount_path = config.mount_path.clone();
    log::info!(
        "Listening on {}:{} (mounted at '{}')",
        config.host,
        config.port,
        if mount_path.is_empty() { "/" } else { mount_path.as_str() }
    );
    let result = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(|cfg| handlers::configure(cfg, &mount_path))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await;

    // Final flush once the server has stopped taking requests
    log::info!("Server stopped, saving resources");
    worker.shutdown();
    result
}
