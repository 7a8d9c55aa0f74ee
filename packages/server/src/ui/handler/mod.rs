//! Request handlers.

mod http;
mod websocket;

pub use http::{debug_state, get_data, health_check, post_data, verify};
pub use websocket::websocket_handler;
