//! Port for the external settings document.
//!
//! Storage is a single free-form JSON object. The relay owns three keys of it
//! (`text`, `enabled`, `dialogCoords`); everything else belongs to the
//! dashboards and is written through `POST /data`. Writes are last-writer-wins.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use thiserror::Error;

use super::{DialogCoords, PersistedState};

const TEXT_KEY: &str = "text";
const ENABLED_KEY: &str = "enabled";
const DIALOG_COORDS_KEY: &str = "dialogCoords";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings document could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("settings document must be a JSON object")]
    NotAnObject,
}

/// The persisted settings document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SettingsDocument(Map<String, Value>);

impl SettingsDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Overwrite top-level keys with those of `other`.
    pub fn merge(&mut self, other: SettingsDocument) {
        self.0.extend(other.0);
    }

    /// Read the relay-owned keys, falling back to defaults for missing or mistyped ones.
    pub fn persisted_state(&self) -> PersistedState {
        let text = self
            .0
            .get(TEXT_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let enabled = self
            .0
            .get(ENABLED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or_default();
        let dialog_coords = self.0.get(DIALOG_COORDS_KEY).and_then(parse_coords);
        PersistedState {
            text,
            enabled,
            dialog_coords,
        }
    }

    /// The relay-owned keys this document actually carries.
    ///
    /// Mistyped values are skipped; an explicit `null` for `dialogCoords`
    /// clears the coordinates.
    pub fn persisted_update(&self) -> PersistedUpdate {
        let dialog_coords = match self.0.get(DIALOG_COORDS_KEY) {
            Some(Value::Null) => Some(None),
            Some(coords) => parse_coords(coords).map(Some),
            None => None,
        };
        PersistedUpdate {
            text: self
                .0
                .get(TEXT_KEY)
                .and_then(Value::as_str)
                .map(str::to_string),
            enabled: self.0.get(ENABLED_KEY).and_then(Value::as_bool),
            dialog_coords,
        }
    }

    /// Write the relay-owned keys, leaving every other key untouched.
    pub fn apply_persisted_state(&mut self, state: &PersistedState) {
        self.0
            .insert(TEXT_KEY.to_string(), Value::String(state.text.clone()));
        self.0
            .insert(ENABLED_KEY.to_string(), Value::Bool(state.enabled));
        let coords = match state.dialog_coords {
            Some(DialogCoords { x, y }) => json!({ "x": x, "y": y }),
            None => Value::Null,
        };
        self.0.insert(DIALOG_COORDS_KEY.to_string(), coords);
    }
}

/// Partial change to the relay-owned keys; `None` leaves a field as is.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PersistedUpdate {
    pub text: Option<String>,
    pub enabled: Option<bool>,
    pub dialog_coords: Option<Option<DialogCoords>>,
}

fn parse_coords(coords: &Value) -> Option<DialogCoords> {
    Some(DialogCoords {
        x: coords.get("x")?.as_f64()?,
        y: coords.get("y")?.as_f64()?,
    })
}

impl TryFrom<Value> for SettingsDocument {
    type Error = StorageError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            _ => Err(StorageError::NotAnObject),
        }
    }
}

/// External key-value storage of the settings document.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<SettingsDocument, StorageError>;

    async fn save(&self, document: SettingsDocument) -> Result<(), StorageError>;
}
