//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - 接続ごとの `PusherChannel`（control / telemetry の 2 レーン）を管理
//! - クライアントへのメッセージ送信（push_to, push_telemetry, broadcast）
//!
//! ## 設計ノート
//!
//! WebSocket の生成は UI 層（`ui/handler/websocket.rs`）で行われます。
//! この実装は生成されたチャンネルを受け取り、メッセージ送信に使用します。
//! 所有者は relay dispatcher のタスクだけなので、内部にロックは持ちません。

use std::collections::HashMap;

use tokio::sync::mpsc::error::TrySendError;

use crate::domain::{ConnectionId, MessagePushError, MessagePusher, Outbound, PusherChannel};

/// WebSocket を使った MessagePusher 実装
#[derive(Default)]
pub struct WebSocketMessagePusher {
    /// 接続中のクライアントの送信チャンネル
    clients: HashMap<ConnectionId, PusherChannel>,
}

impl WebSocketMessagePusher {
    /// 新しい WebSocketMessagePusher を作成
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, id: &ConnectionId) -> Result<&PusherChannel, MessagePushError> {
        self.clients
            .get(id)
            .ok_or_else(|| MessagePushError::ClientNotFound(id.to_string()))
    }
}

impl MessagePusher for WebSocketMessagePusher {
    fn register_client(&mut self, id: ConnectionId, channel: PusherChannel) {
        self.clients.insert(id, channel);
        tracing::debug!("Client '{}' registered to MessagePusher", id);
    }

    fn unregister_client(&mut self, id: &ConnectionId) {
        self.clients.remove(id);
        tracing::debug!("Client '{}' unregistered from MessagePusher", id);
    }

    fn push_to(&self, id: &ConnectionId, content: &str) -> Result<(), MessagePushError> {
        self.channel(id)?
            .control
            .send(Outbound::Text(content.to_string()))
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
        tracing::debug!("Pushed message to client '{}'", id);
        Ok(())
    }

    fn push_telemetry(&self, id: &ConnectionId, content: &str) -> Result<(), MessagePushError> {
        match self.channel(id)?.telemetry.try_send(content.to_string()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(MessagePushError::Backpressure(id.to_string())),
            Err(TrySendError::Closed(_)) => Err(MessagePushError::PushFailed(format!(
                "telemetry lane of '{}' is closed",
                id
            ))),
        }
    }

    fn close(&self, id: &ConnectionId) -> Result<(), MessagePushError> {
        self.channel(id)?
            .control
            .send(Outbound::Close)
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))
    }

    fn broadcast(&self, targets: &[ConnectionId], content: &str) {
        for target in targets {
            // ブロードキャストでは一部の送信失敗を許容
            if let Err(e) = self.push_to(target, content) {
                tracing::warn!("Failed to push message to client '{}': {}", target, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PusherReceivers;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - push_to: 特定のクライアントへの control レーン送信
    // - push_telemetry: 溢れた telemetry は捨てられること
    // - close: Close が control レーンの末尾に積まれること
    // - broadcast: 一部のクライアントが存在しなくても他には届くこと
    // ========================================

    fn register(
        pusher: &mut WebSocketMessagePusher,
        buffer: usize,
    ) -> (ConnectionId, PusherReceivers) {
        let id = ConnectionId::generate();
        let (channel, receivers) = PusherChannel::new(buffer);
        pusher.register_client(id, channel);
        (id, receivers)
    }

    #[tokio::test]
    async fn test_push_to_success() {
        // テスト項目: 特定のクライアントにメッセージを送信できる
        // given (前提条件):
        let mut pusher = WebSocketMessagePusher::new();
        let (id, mut rx) = register(&mut pusher, 4);

        // when (操作):
        let result = pusher.push_to(&id, "Hello");

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(rx.control.recv().await, Some(Outbound::Text("Hello".to_string())));
    }

    #[tokio::test]
    async fn test_push_to_client_not_found() {
        // テスト項目: 存在しないクライアントへの送信はエラーを返す
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();

        // when (操作):
        let result = pusher.push_to(&ConnectionId::generate(), "Hello");

        // then (期待する結果):
        assert!(matches!(result, Err(MessagePushError::ClientNotFound(_))));
    }

    #[tokio::test]
    async fn test_push_telemetry_drops_when_lane_is_full() {
        // テスト項目: telemetry レーンが一杯のときはフレームが捨てられる
        // given (前提条件):
        let mut pusher = WebSocketMessagePusher::new();
        let (id, mut rx) = register(&mut pusher, 2);

        // when (操作):
        let first = pusher.push_telemetry(&id, "frame-1");
        let second = pusher.push_telemetry(&id, "frame-2");
        let third = pusher.push_telemetry(&id, "frame-3");

        // then (期待する結果):
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert!(matches!(third, Err(MessagePushError::Backpressure(_))));
        assert_eq!(rx.telemetry.recv().await, Some("frame-1".to_string()));
        assert_eq!(rx.telemetry.recv().await, Some("frame-2".to_string()));
        assert!(rx.telemetry.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_is_queued_after_pending_messages() {
        // テスト項目: close は送信済みメッセージの後ろに積まれる
        // given (前提条件):
        let mut pusher = WebSocketMessagePusher::new();
        let (id, mut rx) = register(&mut pusher, 1);
        pusher.push_to(&id, "bye").unwrap();

        // when (操作):
        let result = pusher.close(&id);
        pusher.unregister_client(&id);

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(rx.control.recv().await, Some(Outbound::Text("bye".to_string())));
        assert_eq!(rx.control.recv().await, Some(Outbound::Close));
        assert_eq!(rx.control.recv().await, None);
    }

    #[tokio::test]
    async fn test_broadcast_partial_failure() {
        // テスト項目: ブロードキャスト時、一部のクライアントが存在しなくても他には届く
        // given (前提条件):
        let mut pusher = WebSocketMessagePusher::new();
        let (alice, mut alice_rx) = register(&mut pusher, 1);
        let (bob, mut bob_rx) = register(&mut pusher, 1);
        let ghost = ConnectionId::generate();

        // when (操作):
        pusher.broadcast(&[alice, ghost, bob], "Broadcast message");

        // then (期待する結果):
        let expected = Some(Outbound::Text("Broadcast message".to_string()));
        assert_eq!(alice_rx.control.recv().await, expected);
        assert_eq!(bob_rx.control.recv().await, expected);
    }
}
