//! UseCase: サーバー権威のカウントダウンタイマー
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - start_timer(): 絶対終了時刻の計算と全員へのブロードキャスト
//! - stop_timer(): 停止と冪等性
//!
//! ### なぜこのテストが必要か
//! - 各クライアントは endTime と自分の時計から残り時間を計算するため、
//!   サーバーは残り秒数ではなく絶対時刻を配る必要がある
//!
//! ### どのような状況を想定しているか
//! - 正常系：開始、停止
//! - エッジケース：停止中の停止、実行中の再開始（上書き）

use crate::infrastructure::dto::websocket::ServerEvent;

use super::context::RelayContext;

/// Start (or restart) the countdown from the relay's clock.
pub fn start_timer(ctx: &mut RelayContext, duration_seconds: u64) {
    let now = ctx.clock.now_millis();
    ctx.state.timer.start(now, duration_seconds);
    tracing::info!(
        "Timer started for {}s, ends at {}",
        duration_seconds,
        ctx.state.timer.end_time()
    );
    broadcast_timer(ctx);
}

pub fn stop_timer(ctx: &mut RelayContext) {
    ctx.state.timer.stop();
    tracing::info!("Timer stopped");
    broadcast_timer(ctx);
}

fn broadcast_timer(ctx: &RelayContext) {
    ctx.broadcast_all(&ServerEvent::TimerUpdated((&ctx.state.timer).into()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        RelayConfig,
        usecase::context::testing::{NOW, connect, harness, viewer_and_host},
    };
    use kakehashi_shared::time::remaining_seconds;
    use serde_json::json;

    #[tokio::test]
    async fn test_start_broadcasts_absolute_end_time_to_everyone() {
        // テスト項目: 開始すると endTime = now + duration の状態が全員（host 含む）に届く
        // given (前提条件):
        let mut h = harness(RelayConfig::default());
        let (mut viewer, mut host) = viewer_and_host(&mut h.ctx);
        host.drain();

        // when (操作):
        start_timer(&mut h.ctx, 10);

        // then (期待する結果):
        let expected = json!({
            "event": "timer_updated",
            "data": {"running": true, "endTime": NOW + 10_000, "originalDurationSeconds": 10}
        });
        assert_eq!(viewer.drain(), vec![expected.clone()]);
        assert_eq!(host.drain(), vec![expected]);
    }

    #[tokio::test]
    async fn test_remaining_time_derived_from_end_time() {
        // テスト項目: 10 秒タイマーの残り時間は開始直後 10、5 秒後 5、終了後 0
        // given (前提条件):
        let mut h = harness(RelayConfig::default());
        let _viewer = connect(&mut h.ctx, "viewer");

        // when (操作):
        start_timer(&mut h.ctx, 10);
        let end = h.ctx.state().timer.end_time();

        // then (期待する結果):
        assert_eq!(remaining_seconds(end, NOW + 1), 10);
        assert_eq!(remaining_seconds(end, NOW + 5_000), 5);
        assert_eq!(remaining_seconds(end, NOW + 10_000), 0);
        assert_eq!(remaining_seconds(end, NOW + 60_000), 0);
    }

    #[tokio::test]
    async fn test_stop_clears_and_is_idempotent() {
        // テスト項目: 停止で running=false, endTime=0 となり、二度目の停止でも状態は同じ
        // given (前提条件):
        let mut h = harness(RelayConfig::default());
        let mut viewer = connect(&mut h.ctx, "viewer");
        start_timer(&mut h.ctx, 30);
        viewer.drain();

        // when (操作):
        stop_timer(&mut h.ctx);
        stop_timer(&mut h.ctx);

        // then (期待する結果):
        let stopped = json!({
            "event": "timer_updated",
            "data": {"running": false, "endTime": 0, "originalDurationSeconds": 0}
        });
        assert_eq!(viewer.drain(), vec![stopped.clone(), stopped]);
        assert!(!h.ctx.state().timer.running());
    }

    #[tokio::test]
    async fn test_restart_overwrites_running_timer() {
        // テスト項目: 実行中に再開始すると終了時刻が上書きされる
        // given (前提条件):
        let mut h = harness(RelayConfig::default());
        start_timer(&mut h.ctx, 300);

        // when (操作):
        start_timer(&mut h.ctx, 60);

        // then (期待する結果):
        assert_eq!(h.ctx.state().timer.end_time(), NOW + 60_000);
        assert_eq!(h.ctx.state().timer.original_duration_seconds(), 60);
    }
}
