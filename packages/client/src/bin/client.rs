//! Kakehashi relay CLI client with reconnection support.
//!
//! Connects to the relay as a viewer or as the host.
//! Automatically reconnects on disconnection (max 5 attempts with 5 second
//! interval), except when the relay rejected the handshake.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kakehashi-client -- --token s3cret
//! cargo run --bin kakehashi-client -- --role host --token s3cret
//! ```

use clap::Parser;

use kakehashi_client::{SessionConfig, run_client};
use kakehashi_server::domain::Role;
use kakehashi_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "kakehashi-client")]
#[command(about = "CLI client for the Kakehashi relay", long_about = None)]
struct Args {
    /// Relay WebSocket URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:3001/ws")]
    url: String,

    /// Role to join as (viewer or host)
    #[arg(short = 'r', long, default_value = "viewer")]
    role: Role,

    /// Access code shared with the relay
    #[arg(short = 't', long, env = "RELAY_ACCESS_CODE")]
    token: Option<String>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let config = SessionConfig {
        url: args.url,
        role: args.role,
        token: args.token.filter(|token| !token.is_empty()),
    };

    if let Err(e) = run_client(config).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
