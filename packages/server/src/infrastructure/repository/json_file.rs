//! JSON file backed SettingsStore 実装
//!
//! ドキュメント全体を 1 つの JSON ファイルとして保存します。
//! 書き込みは一時ファイルへ書いてから rename するため、途中で落ちても
//! 既存のファイルが壊れることはありません。

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::domain::{SettingsDocument, SettingsStore, StorageError};

/// JSON ファイル SettingsStore 実装
pub struct JsonFileSettingsStore {
    path: PathBuf,
    /// 同時書き込みで一時ファイルを取り合わないための直列化
    write_lock: Mutex<()>,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "settings.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettingsStore {
    async fn load(&self) -> Result<SettingsDocument, StorageError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(
                    "Settings file {} does not exist yet, using an empty document",
                    self.path.display()
                );
                return Ok(SettingsDocument::new());
            }
            Err(e) => return Err(e.into()),
        };
        let value: Value = serde_json::from_slice(&bytes)?;
        SettingsDocument::try_from(value)
    }

    async fn save(&self, document: SettingsDocument) -> Result<(), StorageError> {
        let body = serde_json::to_vec_pretty(&document.into_value())?;

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, body).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        tracing::debug!("Settings written to {}", self.path.display());
        Ok(())
    }
}
