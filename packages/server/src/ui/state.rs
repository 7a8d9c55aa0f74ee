//! State shared by the axum handlers.

use std::sync::Arc;

use crate::{domain::SettingsStore, usecase::RelayHandle};

pub struct AppState {
    /// Entry point into the relay dispatcher
    pub relay: RelayHandle,
    /// SettingsStore（`/data` エンドポイントが直接読み書きする）
    pub store: Arc<dyn SettingsStore>,
    pub access_code: Option<String>,
    /// Capacity of each connection's telemetry lane
    pub telemetry_buffer: usize,
}
