//! Kakehashi relay CLI client.
//!
//! Joins the relay as a viewer (slash commands drive the shared state and
//! submit commands) or as the host (prints delivered commands and sends log
//! lines).

pub mod domain;
pub mod error;
pub mod formatter;
mod runner;
pub mod session;
mod ui;

pub use error::ClientError;
pub use runner::run_client;
pub use session::SessionConfig;
