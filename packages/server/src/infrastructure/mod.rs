//! Infrastructure layer: wire DTOs, the WebSocket pusher and settings storage.

pub mod dto;
pub mod message_pusher;
pub mod repository;
