//! UseCase: 共有状態の永続化（debounce 付き）
//!
//! 短時間に連続した更新は 1 回の書き込みにまとめます（最後の値が勝つ）。
//! 新しい更新が来ると待機中の書き込みはキャンセルされ、タイマーが張り直されます。
//! 書き込みに失敗した場合は警告ログを出し、dispatcher に `PersistFailed` を送って
//! 次の debounce サイクルで再試行させます。更新した接続にエラーは返しません。
//!
//! `POST /data` からの書き込みも同じ書き込みロックを取るため、ストアに対する
//! load → merge → save が互いに割り込むことはありません。

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, mpsc, oneshot},
    task::JoinHandle,
};

use crate::domain::{PersistedState, SettingsDocument, SettingsStore, StorageError};

use super::dispatcher::RelayEvent;

/// Cancel-and-reschedule writer with a single pending task.
pub struct PersistScheduler {
    store: Arc<dyn SettingsStore>,
    /// Held for the whole load-merge-save of every write
    write_lock: Arc<Mutex<()>>,
    delay: Duration,
    pending: Option<JoinHandle<()>>,
    events: mpsc::UnboundedSender<RelayEvent>,
}

impl PersistScheduler {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        delay: Duration,
        events: mpsc::UnboundedSender<RelayEvent>,
    ) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
            delay,
            pending: None,
            events,
        }
    }

    /// Write `snapshot` once the debounce window passes without a newer call.
    pub fn schedule(&mut self, snapshot: PersistedState) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }

        let store = self.store.clone();
        let lock = self.write_lock.clone();
        let delay = self.delay;
        let events = self.events.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match persist(store.as_ref(), &lock, &snapshot).await {
                Ok(()) => tracing::debug!("Shared state persisted"),
                Err(e) => {
                    tracing::warn!("Failed to persist shared state, will retry: {}", e);
                    let _ = events.send(RelayEvent::PersistFailed);
                }
            }
        }));
    }

    /// Cancel any pending write and persist `snapshot` right away.
    pub async fn flush(&mut self, snapshot: PersistedState) -> Result<(), StorageError> {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        persist(self.store.as_ref(), &self.write_lock, &snapshot).await
    }

    /// Merge `update` into the stored document and report the outcome on `reply`.
    ///
    /// Not debounced and never cancelled by a later [`Self::schedule`].
    pub fn write_document(
        &self,
        update: SettingsDocument,
        reply: oneshot::Sender<Result<(), StorageError>>,
    ) {
        let store = self.store.clone();
        let lock = self.write_lock.clone();
        tokio::spawn(async move {
            let _guard = lock.lock().await;
            let result = merge_document(store.as_ref(), update).await;
            if let Err(e) = &result {
                tracing::error!("Failed to write settings document: {}", e);
            }
            let _ = reply.send(result);
        });
    }

    pub fn has_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.is_finished())
    }
}

/// Load-merge-save so keys owned by the dashboards survive.
async fn persist(
    store: &dyn SettingsStore,
    lock: &Mutex<()>,
    snapshot: &PersistedState,
) -> Result<(), StorageError> {
    let _guard = lock.lock().await;
    let mut document = store.load().await?;
    document.apply_persisted_state(snapshot);
    store.save(document).await
}

async fn merge_document(
    store: &dyn SettingsStore,
    update: SettingsDocument,
) -> Result<(), StorageError> {
    let mut document = store.load().await?;
    document.merge(update);
    store.save(document).await
}
