//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{domain::SettingsStore, usecase::RelayHandle};

use super::{
    handler::{debug_state, get_data, health_check, post_data, verify, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Relay HTTP / WebSocket server
///
/// # Example
///
/// ```ignore
/// let (relay, _dispatcher) = RelayDispatcher::spawn(config.clone(), state, store.clone(), clock);
/// let server = Server::new(relay, store, config.access_code.clone(), config.telemetry_buffer);
/// server.run("127.0.0.1".to_string(), 3001).await?;
/// ```
pub struct Server {
    relay: RelayHandle,
    store: Arc<dyn SettingsStore>,
    access_code: Option<String>,
    telemetry_buffer: usize,
}

impl Server {
    /// Create a new Server instance
    ///
    /// # Arguments
    ///
    /// * `relay` - Handle of the running relay dispatcher
    /// * `store` - Settings storage served by `/data`
    /// * `access_code` - Shared secret; `None` accepts every client
    /// * `telemetry_buffer` - Frames buffered per connection before dropping
    pub fn new(
        relay: RelayHandle,
        store: Arc<dyn SettingsStore>,
        access_code: Option<String>,
        telemetry_buffer: usize,
    ) -> Self {
        Self {
            relay,
            store,
            access_code,
            telemetry_buffer,
        }
    }

    /// Build the router with every endpoint mounted.
    pub fn router(self) -> Router {
        let app_state = Arc::new(AppState {
            relay: self.relay,
            store: self.store,
            access_code: self.access_code,
            telemetry_buffer: self.telemetry_buffer,
        });

        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/verify", post(verify))
            .route("/data", get(get_data).post(post_data))
            .route("/api/health", get(health_check))
            .route("/debug/state", get(debug_state))
            .with_state(app_state)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Run the relay server until Ctrl+C / SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Relay server listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }
}
