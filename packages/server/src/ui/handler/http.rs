//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde_json::Value;

use crate::{
    domain::SettingsDocument,
    infrastructure::dto::{
        http::{DataUpdateRequest, SuccessResponse, VerifyRequest},
        websocket::SharedStateDto,
    },
    ui::state::AppState,
    usecase::authenticate,
};

/// Header carrying the access code on `/data` requests
pub const ACCESS_CODE_HEADER: &str = "x-access-code";

type ApiError = (StatusCode, Json<SuccessResponse>);

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Debug endpoint returning the relay's current shared state
pub async fn debug_state(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SharedStateDto>, ApiError> {
    authorize(&state, &headers)?;

    match state.relay.snapshot().await {
        Some(shared) => Ok(Json((&shared).into())),
        None => Err(relay_unavailable()),
    }
}

/// `POST /verify {code}`
///
/// Same policy as the live channel: with no access code configured every code passes.
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyRequest>,
) -> Json<SuccessResponse> {
    match authenticate(state.access_code.as_deref(), Some(&request.code)) {
        Ok(()) => Json(SuccessResponse::ok()),
        Err(_) => {
            tracing::info!("Rejected access code verification");
            Json(SuccessResponse::failed("Invalid access code"))
        }
    }
}

/// `GET /data` returns the whole stored settings document
pub async fn get_data(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    authorize(&state, &headers)?;

    let document = state.store.load().await.map_err(|e| {
        tracing::error!("Failed to load settings document: {}", e);
        internal_error("Failed to load settings")
    })?;
    Ok(Json(document.into_value()))
}

/// `POST /data {data}` merges `data` into the stored settings document.
///
/// The write goes through the relay so that `text`, `enabled` and
/// `dialogCoords` also reach the live state.
pub async fn post_data(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<DataUpdateRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    authorize(&state, &headers)?;

    let update = SettingsDocument::try_from(request.data).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(SuccessResponse::failed(e.to_string())),
        )
    })?;

    match state.relay.update_settings(update).await {
        Some(Ok(())) => {
            tracing::debug!("Settings document updated through /data");
            Ok(Json(SuccessResponse::ok()))
        }
        Some(Err(_)) => Err(internal_error("Failed to save settings")),
        None => Err(relay_unavailable()),
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let presented = headers
        .get(ACCESS_CODE_HEADER)
        .and_then(|value| value.to_str().ok());
    authenticate(state.access_code.as_deref(), presented).map_err(|e| {
        (
            StatusCode::UNAUTHORIZED,
            Json(SuccessResponse::failed(e.to_string())),
        )
    })
}

fn relay_unavailable() -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(SuccessResponse::failed("Relay is shutting down")),
    )
}

fn internal_error(message: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(SuccessResponse::failed(message)),
    )
}
