//! UseCase: host ゲート（hostAllowed）の切り替えと host の強制切断
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - toggle_host_gate(): viewer による hostAllowed の変更
//! - evict_active_host(): host の強制切断パス
//!
//! ### なぜこのテストが必要か
//! - ゲートを閉じたら接続中の host を必ず切断する（失敗通知はちょうど 1 回）
//! - ゲートを開いても過去に拒否された host には影響しない
//!
//! ### どのような状況を想定しているか
//! - 正常系：ゲートの開閉と全員への通知
//! - エッジケース：host 不在時にゲートを閉じる、同じ値を再設定する

use crate::infrastructure::dto::websocket::ServerEvent;

use super::{context::RelayContext, error::HOST_DISABLED_MESSAGE};

/// Viewer sets `hostAllowed`.
///
/// Closing the gate evicts the attached host. Opening it only affects hosts
/// that connect afterwards.
pub fn toggle_host_gate(ctx: &mut RelayContext, allowed: bool) {
    ctx.state.host_allowed = allowed;
    tracing::info!("Host gate {}", if allowed { "opened" } else { "closed" });
    ctx.broadcast_all(&ServerEvent::HostAllowedStatus { allowed });

    if !allowed {
        evict_active_host(ctx, HOST_DISABLED_MESSAGE);
    }
}

/// Forcibly disconnect the active host, if any.
///
/// The host gets exactly one failure notification; everybody else learns that
/// the host is gone. Returns whether a host was evicted.
pub fn evict_active_host(ctx: &mut RelayContext, reason: &str) -> bool {
    let Some(host) = ctx.registry.active_host() else {
        return false;
    };
    ctx.registry.remove(&host);
    ctx.terminate(&host, reason);
    mark_host_detached(ctx);
    true
}

/// Clear `hostConnected` and tell every remaining connection.
pub(crate) fn mark_host_detached(ctx: &mut RelayContext) {
    ctx.state.host_connected = false;
    ctx.broadcast_all(&ServerEvent::HostStatus { connected: false });
}
