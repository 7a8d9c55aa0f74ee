//! InMemory SettingsStore 実装
//!
//! ドメイン層が定義する SettingsStore trait の具体的な実装。
//! 外部ストレージを用意しない構成（`--data-file` 未指定）で使われます。

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{SettingsDocument, SettingsStore, StorageError};

/// インメモリ SettingsStore 実装
#[derive(Default)]
pub struct InMemorySettingsStore {
    document: Mutex<SettingsDocument>,
}

impl InMemorySettingsStore {
    pub fn new(document: SettingsDocument) -> Self {
        Self {
            document: Mutex::new(document),
        }
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn load(&self) -> Result<SettingsDocument, StorageError> {
        Ok(self.document.lock().await.clone())
    }

    async fn save(&self, document: SettingsDocument) -> Result<(), StorageError> {
        *self.document.lock().await = document;
        Ok(())
    }
}
