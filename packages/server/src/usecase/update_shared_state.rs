//! UseCase: 共有状態（text / enabled / dialogCoords）の更新
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - apply_text_update() / apply_enabled_update() / apply_dialog_coords_update()
//! - apply_settings_document(): `POST /data` 経由の更新
//!
//! ### なぜこのテストが必要か
//! - 更新元以外の全接続に変更が届くこと（更新元へのエコーはしない）
//! - 更新後に接続した peer の state_sync に最新値が含まれること
//! - 永続化の予約が行われること
//! - `/data` で書かれたリレー管理のキーがライブの状態にも反映されること
//!
//! ### どのような状況を想定しているか
//! - 正常系：viewer 同士の同期
//! - エッジケース：dialogCoords を null に戻す

use tokio::sync::oneshot;

use crate::{
    domain::{ConnectionId, DialogCoords, SettingsDocument, StorageError},
    infrastructure::dto::websocket::ServerEvent,
};

use super::context::RelayContext;

pub fn apply_text_update(ctx: &mut RelayContext, origin: &ConnectionId, text: String) {
    ctx.state.text = text.clone();
    ctx.broadcast_except(origin, &ServerEvent::TextUpdated { text });
    ctx.schedule_persist();
}

pub fn apply_enabled_update(ctx: &mut RelayContext, origin: &ConnectionId, enabled: bool) {
    ctx.state.enabled = enabled;
    tracing::info!("Agent {}", if enabled { "enabled" } else { "disabled" });
    ctx.broadcast_except(origin, &ServerEvent::EnabledUpdated { enabled });
    ctx.schedule_persist();
}

/// `None` clears the stored position.
pub fn apply_dialog_coords_update(
    ctx: &mut RelayContext,
    origin: &ConnectionId,
    coords: Option<DialogCoords>,
) {
    ctx.state.dialog_coords = coords;
    ctx.broadcast_except(
        origin,
        &ServerEvent::DialogCoordsUpdated {
            dialog_coords: coords.map(Into::into),
        },
    );
    ctx.schedule_persist();
}

/// Apply a document posted to `/data`.
///
/// Relay-owned keys that change the live state are broadcast to every
/// connection. The whole document is then merged into storage and the outcome
/// is reported on `reply`.
pub fn apply_settings_document(
    ctx: &mut RelayContext,
    update: SettingsDocument,
    reply: oneshot::Sender<Result<(), StorageError>>,
) {
    let changes = update.persisted_update();
    let mut changed = false;

    if let Some(text) = changes.text
        && text != ctx.state.text
    {
        ctx.state.text = text.clone();
        ctx.broadcast_all(&ServerEvent::TextUpdated { text });
        changed = true;
    }
    if let Some(enabled) = changes.enabled
        && enabled != ctx.state.enabled
    {
        ctx.state.enabled = enabled;
        ctx.broadcast_all(&ServerEvent::EnabledUpdated { enabled });
        changed = true;
    }
    if let Some(coords) = changes.dialog_coords
        && coords != ctx.state.dialog_coords
    {
        ctx.state.dialog_coords = coords;
        ctx.broadcast_all(&ServerEvent::DialogCoordsUpdated {
            dialog_coords: coords.map(Into::into),
        });
        changed = true;
    }

    if changed {
        tracing::info!("Shared state updated through /data");
        ctx.schedule_persist();
    }
    ctx.persister.write_document(update, reply);
}
