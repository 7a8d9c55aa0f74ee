//! UseCase: コマンド中継（Command Relay）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - submit_command(): host 接続中は即配送、不在時はキューに積んで送信者に通知
//! - flush_queue(): 新しい host にキューを挿入順で配送して空にする
//! - relay_host_event(): host のイベントを viewer にだけ転送する
//!
//! ### なぜこのテストが必要か
//! - コマンドは drop-oldest の方針以外で黙って失われてはならない
//! - 配送順序（提出順）を保証する
//! - 画面フレームは遅い viewer に対して捨ててよい（best-effort）
//!
//! ### どのような状況を想定しているか
//! - 正常系：host 接続中の即配送
//! - エッジケース：host 不在時のキュー溢れ、2 回目の flush

use serde_json::Value;

use crate::{
    domain::{Command, ConnectionId, MessagePushError},
    infrastructure::dto::websocket::{RelayedEvent, ServerEvent},
};

use super::context::RelayContext;

/// Where a submitted command ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Delivered,
    Queued,
}

/// Host-originated events forwarded to viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// A captured frame; best-effort, dropped under backpressure.
    ScreenUpdate,
    /// An agent log line; best-effort like frames.
    Log,
    TimerUpdated,
}

impl HostEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostEvent::ScreenUpdate => "screen_update",
            HostEvent::Log => "log",
            HostEvent::TimerUpdated => "timer_updated",
        }
    }

    fn is_best_effort(&self) -> bool {
        matches!(self, HostEvent::ScreenUpdate | HostEvent::Log)
    }
}

/// Route a viewer's command to the host, or buffer it while the host is away.
pub fn submit_command(
    ctx: &mut RelayContext,
    from: &ConnectionId,
    command: Command,
) -> SubmitOutcome {
    if let Some(host) = ctx.registry.active_host() {
        tracing::debug!(
            "Delivering command '{}' from '{}' to host",
            command.kind(),
            from
        );
        deliver(ctx, &host, command);
        return SubmitOutcome::Delivered;
    }

    let kind = command.kind().to_string();
    if let Some(evicted) = ctx.queue.push(command) {
        tracing::warn!(
            "Command queue full, dropped oldest command '{}'",
            evicted.kind()
        );
    }
    tracing::info!(
        "No host attached, queued command '{}' ({} pending)",
        kind,
        ctx.queue.len()
    );
    ctx.send(
        from,
        &ServerEvent::log(format!("Host offline, queued command: {}", kind)),
    );
    SubmitOutcome::Queued
}

/// Deliver every buffered command to `host` in submission order and empty the queue.
///
/// Returns the number of delivered commands.
pub fn flush_queue(ctx: &mut RelayContext, host: &ConnectionId) -> usize {
    let pending = ctx.queue.drain();
    let count = pending.len();
    if count == 0 {
        return 0;
    }
    for command in pending {
        deliver(ctx, host, command);
    }
    tracing::info!("Flushed {} queued command(s) to host '{}'", count, host);
    ctx.broadcast_viewers(&ServerEvent::log(format!(
        "Host connected, delivered {} queued command(s)",
        count
    )));
    count
}

/// Forward a host event verbatim to the viewer group.
pub fn relay_host_event(ctx: &RelayContext, event: HostEvent, payload: &Value) {
    let encoded = match (RelayedEvent {
        event: event.as_str(),
        data: payload,
    })
    .encode()
    {
        Ok(encoded) => encoded,
        Err(e) => {
            tracing::error!("Failed to encode host event '{}': {}", event.as_str(), e);
            return;
        }
    };

    let viewers = ctx.registry.viewer_ids();
    if !event.is_best_effort() {
        ctx.pusher.broadcast(&viewers, &encoded);
        return;
    }
    for viewer in &viewers {
        match ctx.pusher.push_telemetry(viewer, &encoded) {
            Ok(()) => {}
            Err(MessagePushError::Backpressure(_)) => {
                tracing::debug!("Viewer '{}' is behind, '{}' dropped", viewer, event.as_str());
            }
            Err(e) => tracing::warn!("Failed to push telemetry to '{}': {}", viewer, e),
        }
    }
}

fn deliver(ctx: &RelayContext, host: &ConnectionId, command: Command) {
    ctx.send(host, &ServerEvent::Command(command.into_payload()));
}
