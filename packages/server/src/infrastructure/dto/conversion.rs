//! Conversion logic between DTOs and domain values.

use crate::domain::{DialogCoords, SharedState, TimerState};
use crate::infrastructure::dto::websocket as dto;

// ========================================
// DTO → Domain
// ========================================

impl From<dto::DialogCoordsDto> for DialogCoords {
    fn from(dto: dto::DialogCoordsDto) -> Self {
        Self { x: dto.x, y: dto.y }
    }
}

// ========================================
// Domain → DTO
// ========================================

impl From<DialogCoords> for dto::DialogCoordsDto {
    fn from(model: DialogCoords) -> Self {
        Self {
            x: model.x,
            y: model.y,
        }
    }
}

impl From<&TimerState> for dto::TimerStateDto {
    fn from(model: &TimerState) -> Self {
        Self {
            running: model.running(),
            end_time: model.end_time(),
            original_duration_seconds: model.original_duration_seconds(),
        }
    }
}

impl From<&SharedState> for dto::SharedStateDto {
    fn from(model: &SharedState) -> Self {
        Self {
            text: model.text.clone(),
            enabled: model.enabled,
            dialog_coords: model.dialog_coords.map(Into::into),
            host_allowed: model.host_allowed,
            host_connected: model.host_connected,
            timer: (&model.timer).into(),
        }
    }
}
