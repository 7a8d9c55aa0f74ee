//! UseCase: 切断処理とライフサイクル監視
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - disconnect_peer(): ロールごとの切断後処理
//! - on_viewers_settled(): 最後の viewer が去った後の host ゲート閉鎖
//!
//! ### なぜこのテストが必要か
//! - 誰も見ていない状態で host が操作を続けないことを保証する
//! - 置き換えられた古い host の切断が新しい host の状態を壊さないこと
//!
//! ### どのような状況を想定しているか
//! - 正常系：host の切断、viewer の切断
//! - エッジケース：settle 期間中に viewer が再接続する、古い host の切断

use crate::{
    domain::{ConnectionId, Departure},
    infrastructure::dto::websocket::ServerEvent,
};

use super::{
    context::RelayContext,
    dispatcher::RelayEvent,
    error::NO_VIEWERS_MESSAGE,
    host_gate::{evict_active_host, mark_host_detached},
};

/// Forget a closed connection and run the follow-up its role requires.
pub fn disconnect_peer(ctx: &mut RelayContext, id: &ConnectionId) -> Departure {
    let departure = ctx.registry.remove(id);
    ctx.pusher.unregister_client(id);

    match departure {
        Departure::ActiveHost => {
            tracing::info!("Host '{}' disconnected", id);
            mark_host_detached(ctx);
            ctx.broadcast_viewers(&ServerEvent::log("Host disconnected"));
        }
        Departure::Viewer => {
            tracing::info!(
                "Viewer '{}' disconnected ({} remaining)",
                id,
                ctx.registry.viewer_count()
            );
            schedule_settle_check(ctx);
        }
        Departure::Unknown => {
            tracing::debug!("Unregistered connection '{}' closed", id);
        }
    }
    departure
}

/// Re-examine the viewer count once the settle delay has passed.
///
/// The delay restarts on every departure, so it always counts from the most
/// recent viewer leaving.
fn schedule_settle_check(ctx: &mut RelayContext) {
    if let Some(pending) = ctx.settle_check.take() {
        pending.abort();
    }

    let delay = ctx.config.viewer_settle_delay;
    let events = ctx.events.clone();
    ctx.settle_check = Some(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = events.send(RelayEvent::ViewersSettled);
    }));
}

/// Close the host gate and evict the host when nobody is watching.
///
/// A viewer that reconnected during the settle delay keeps everything as is.
pub fn on_viewers_settled(ctx: &mut RelayContext) {
    if ctx.registry.viewer_count() > 0 {
        return;
    }

    if ctx.state.host_allowed {
        tracing::info!("No viewers left, closing host gate");
        ctx.state.host_allowed = false;
        ctx.broadcast_all(&ServerEvent::HostAllowedStatus { allowed: false });
    }
    if evict_active_host(ctx, NO_VIEWERS_MESSAGE) {
        tracing::info!("Host evicted: no viewers remain");
    }
}
