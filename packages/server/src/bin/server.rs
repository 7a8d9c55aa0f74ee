//! Kakehashi relay server.
//!
//! Bridges one automation host and any number of browser viewers over
//! WebSocket, and serves the access-code and settings endpoints.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kakehashi-server
//! cargo run --bin kakehashi-server -- --host 0.0.0.0 --port 3001 --access-code s3cret
//! RELAY_DATA_FILE=settings.json cargo run --bin kakehashi-server
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;

use kakehashi_server::{
    RelayConfig,
    domain::{SettingsStore, SharedState},
    infrastructure::repository::{InMemorySettingsStore, JsonFileSettingsStore},
    ui::Server,
    usecase::RelayDispatcher,
};
use kakehashi_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "kakehashi-server")]
#[command(about = "Relay between an automation host and browser viewers", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "3001")]
    port: u16,

    /// Shared secret every client must present (unset accepts everyone)
    #[arg(long, env = "RELAY_ACCESS_CODE")]
    access_code: Option<String>,

    /// JSON file holding the settings document (unset keeps it in memory)
    #[arg(long, env = "RELAY_DATA_FILE")]
    data_file: Option<PathBuf>,

    /// Commands buffered while no host is attached
    #[arg(long, default_value = "20")]
    queue_capacity: usize,

    /// Quiet period before shared-state changes are written, in milliseconds
    #[arg(long, default_value = "2000")]
    persist_debounce_ms: u64,

    /// Wait after a viewer leaves before re-counting viewers, in milliseconds
    #[arg(long, default_value = "1000")]
    viewer_settle_ms: u64,

    /// Screen frames buffered per connection before new ones are dropped
    #[arg(long, default_value = "8")]
    telemetry_buffer: usize,
}

impl Args {
    fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            // An empty variable means "not configured"
            access_code: self.access_code.clone().filter(|code| !code.is_empty()),
            queue_capacity: self.queue_capacity,
            persist_debounce: Duration::from_millis(self.persist_debounce_ms),
            viewer_settle_delay: Duration::from_millis(self.viewer_settle_ms),
            telemetry_buffer: self.telemetry_buffer,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let config = args.relay_config();
    if config.is_fail_open() {
        tracing::warn!("No access code configured: every connection will be accepted");
    }

    // Initialize dependencies in order:
    // 1. SettingsStore
    // 2. SharedState (hydrated from the store)
    // 3. Relay dispatcher
    // 4. Server

    // 1. Create SettingsStore
    let store: Arc<dyn SettingsStore> = match &args.data_file {
        Some(path) => {
            tracing::info!("Persisting settings to {}", path.display());
            Arc::new(JsonFileSettingsStore::new(path))
        }
        None => {
            tracing::info!("No data file configured, settings are kept in memory");
            Arc::new(InMemorySettingsStore::default())
        }
    };

    // 2. Hydrate SharedState
    let state = match store.load().await {
        Ok(document) => SharedState::hydrate(document.persisted_state()),
        Err(e) => {
            tracing::warn!("Failed to load settings, starting with defaults: {}", e);
            SharedState::default()
        }
    };

    // 3. Start the dispatcher
    let (relay, dispatcher) = RelayDispatcher::spawn(
        config.clone(),
        state,
        store.clone(),
        Arc::new(SystemClock),
    );

    // 4. Create and run the server
    let server = Server::new(
        relay.clone(),
        store,
        config.access_code,
        config.telemetry_buffer,
    );
    let result = server.run(args.host, args.port).await;

    relay.shutdown().await;
    if let Err(e) = dispatcher.await {
        tracing::error!("Relay dispatcher panicked: {}", e);
    }

    if let Err(e) = result {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
