//! Data Transfer Objects (DTOs) for the relay.
//!
//! DTOs are organized by protocol:
//! - `websocket`: live channel event envelopes
//! - `http`: REST request/response bodies

pub mod conversion;
pub mod http;
pub mod websocket;
