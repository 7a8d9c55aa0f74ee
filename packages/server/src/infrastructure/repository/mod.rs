//! SettingsStore implementations.
//!
//! - `inmemory`: process-local document, lost on restart
//! - `json_file`: document kept in a JSON file on disk

pub mod inmemory;
pub mod json_file;

pub use inmemory::InMemorySettingsStore;
pub use json_file::JsonFileSettingsStore;
