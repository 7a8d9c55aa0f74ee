//! Kakehashi relay server library.
//!
//! The relay sits between one automation host and any number of browser
//! viewers. It authenticates connections, keeps at most one host
//! authoritative, buffers commands while the host is away and keeps a small
//! shared document in sync across every party.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;

pub use config::RelayConfig;
