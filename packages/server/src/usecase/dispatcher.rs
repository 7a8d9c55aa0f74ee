//! The relay's single event loop.
//!
//! Socket tasks never touch relay state. They translate what happens on their
//! connection into [`RelayEvent`]s and hand them to the dispatcher through a
//! [`RelayHandle`]. The dispatcher owns the [`RelayContext`] and applies one
//! event at a time, so every usecase runs to completion without locks.
//! Delayed work (debounced persist, viewer settle checks) runs in spawned tasks
//! that report back through the same channel.

use std::sync::Arc;

use kakehashi_shared::time::Clock;
use serde_json::Value;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    RelayConfig,
    domain::{
        Command, CommandError, ConnectionId, DialogCoords, PusherChannel, Role, SettingsDocument,
        SettingsStore, SharedState, StorageError,
    },
    infrastructure::{
        dto::websocket::{ClientEvent, ServerEvent, TimerAction},
        message_pusher::WebSocketMessagePusher,
    },
};

use super::{
    connect_peer::{Handshake, connect_peer},
    context::RelayContext,
    control_timer::{start_timer, stop_timer},
    disconnect_peer::{disconnect_peer, on_viewers_settled},
    host_gate::toggle_host_gate,
    relay_command::{HostEvent, relay_host_event, submit_command},
    update_shared_state::{
        apply_dialog_coords_update, apply_enabled_update, apply_settings_document,
        apply_text_update,
    },
};

/// Everything the dispatcher reacts to.
#[derive(Debug)]
pub enum RelayEvent {
    Connect {
        id: ConnectionId,
        handshake: Handshake,
        channel: PusherChannel,
    },
    Inbound {
        id: ConnectionId,
        event: ClientEvent,
    },
    /// A frame from `id` that could not be decoded.
    Malformed {
        id: ConnectionId,
        reason: String,
    },
    Disconnect {
        id: ConnectionId,
    },
    /// The settle delay after a viewer departure has elapsed.
    ViewersSettled,
    /// A debounced write failed and must be retried.
    PersistFailed,
    /// Settings document posted to `/data`.
    UpdateSettings {
        update: SettingsDocument,
        reply: oneshot::Sender<Result<(), StorageError>>,
    },
    Snapshot {
        reply: oneshot::Sender<SharedState>,
    },
    /// Flush pending persistence and stop the loop.
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Inbound events after validation, in domain terms.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    UpdateText(String),
    UpdateEnabled(bool),
    UpdateDialogCoords(Option<DialogCoords>),
    StartTimer(u64),
    StopTimer,
    ToggleHostConnection(bool),
    Command(Command),
    Host(HostEvent, Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InboundError {
    #[error("timer start requires a duration")]
    MissingDuration,

    #[error(transparent)]
    InvalidCommand(#[from] CommandError),
}

impl TryFrom<ClientEvent> for InboundEvent {
    type Error = InboundError;

    fn try_from(event: ClientEvent) -> Result<Self, Self::Error> {
        Ok(match event {
            ClientEvent::UpdateText(text) => InboundEvent::UpdateText(text),
            ClientEvent::UpdateEnabled(enabled) => InboundEvent::UpdateEnabled(enabled),
            ClientEvent::UpdateDialogCoords(coords) => {
                InboundEvent::UpdateDialogCoords(coords.map(Into::into))
            }
            ClientEvent::TimerAction(action) => match action.action {
                TimerAction::Start => {
                    InboundEvent::StartTimer(action.duration.ok_or(InboundError::MissingDuration)?)
                }
                TimerAction::Stop => InboundEvent::StopTimer,
            },
            ClientEvent::ToggleHostConnection(allowed) => {
                InboundEvent::ToggleHostConnection(allowed)
            }
            ClientEvent::Command(payload) => InboundEvent::Command(Command::try_from(payload)?),
            ClientEvent::ScreenUpdate(payload) => {
                InboundEvent::Host(HostEvent::ScreenUpdate, payload)
            }
            ClientEvent::Log(payload) => InboundEvent::Host(HostEvent::Log, payload),
            ClientEvent::TimerUpdated(payload) => {
                InboundEvent::Host(HostEvent::TimerUpdated, payload)
            }
        })
    }
}

/// Cloneable sender side of the dispatcher.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    events: mpsc::UnboundedSender<RelayEvent>,
}

impl RelayHandle {
    pub fn connect(&self, id: ConnectionId, handshake: Handshake, channel: PusherChannel) {
        self.send(RelayEvent::Connect {
            id,
            handshake,
            channel,
        });
    }

    pub fn inbound(&self, id: ConnectionId, event: ClientEvent) {
        self.send(RelayEvent::Inbound { id, event });
    }

    pub fn malformed(&self, id: ConnectionId, reason: impl Into<String>) {
        self.send(RelayEvent::Malformed {
            id,
            reason: reason.into(),
        });
    }

    pub fn disconnect(&self, id: ConnectionId) {
        self.send(RelayEvent::Disconnect { id });
    }

    /// Current shared state, or `None` once the dispatcher has stopped.
    pub async fn snapshot(&self) -> Option<SharedState> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayEvent::Snapshot { reply });
        rx.await.ok()
    }

    /// Apply a `/data` write. `None` once the dispatcher has stopped.
    pub async fn update_settings(
        &self,
        update: SettingsDocument,
    ) -> Option<Result<(), StorageError>> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayEvent::UpdateSettings { update, reply });
        rx.await.ok()
    }

    /// Stop the dispatcher after flushing pending persistence.
    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        self.send(RelayEvent::Shutdown { done });
        let _ = rx.await;
    }

    fn send(&self, event: RelayEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Relay dispatcher has stopped; event dropped");
        }
    }
}

pub struct RelayDispatcher {
    ctx: RelayContext,
    events: mpsc::UnboundedReceiver<RelayEvent>,
}

impl RelayDispatcher {
    /// Build the context around `state` and start the loop on the runtime.
    pub fn spawn(
        config: RelayConfig,
        state: SharedState,
        store: Arc<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
    ) -> (RelayHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = RelayContext::new(
            config,
            state,
            Box::new(WebSocketMessagePusher::new()),
            clock,
            store,
            tx.clone(),
        );
        let dispatcher = Self { ctx, events: rx };
        let task = tokio::spawn(dispatcher.run());
        (RelayHandle { events: tx }, task)
    }

    async fn run(mut self) {
        tracing::info!("Relay dispatcher started");
        while let Some(event) = self.events.recv().await {
            if let RelayEvent::Shutdown { done } = event {
                let snapshot = self.ctx.state.persisted();
                if let Err(e) = self.ctx.persister.flush(snapshot).await {
                    tracing::warn!("Failed to persist shared state on shutdown: {}", e);
                }
                let _ = done.send(());
                break;
            }
            handle_event(&mut self.ctx, event);
        }
        tracing::info!("Relay dispatcher stopped");
    }
}

/// Apply one event to the relay state.
pub fn handle_event(ctx: &mut RelayContext, event: RelayEvent) {
    match event {
        RelayEvent::Connect {
            id,
            handshake,
            channel,
        } => {
            if let Err(e) = connect_peer(ctx, id, handshake, channel) {
                tracing::info!("Connection '{}' refused: {}", id, e);
            }
        }
        RelayEvent::Inbound { id, event } => handle_inbound(ctx, id, event),
        RelayEvent::Malformed { id, reason } => {
            tracing::debug!("Malformed frame from '{}': {}", id, reason);
            if ctx.registry.contains(&id) {
                ctx.send(&id, &ServerEvent::error(format!("Malformed event: {}", reason)));
            }
        }
        RelayEvent::Disconnect { id } => {
            disconnect_peer(ctx, &id);
        }
        RelayEvent::ViewersSettled => on_viewers_settled(ctx),
        RelayEvent::PersistFailed => ctx.schedule_persist(),
        RelayEvent::UpdateSettings { update, reply } => {
            apply_settings_document(ctx, update, reply);
        }
        RelayEvent::Snapshot { reply } => {
            let _ = reply.send(ctx.state.clone());
        }
        RelayEvent::Shutdown { done } => {
            let _ = done.send(());
        }
    }
}

fn handle_inbound(ctx: &mut RelayContext, id: ConnectionId, event: ClientEvent) {
    let Some(role) = ctx.registry.role_of(&id) else {
        tracing::debug!("Ignoring event from unregistered connection '{}'", id);
        return;
    };
    if role == Role::Host && !ctx.registry.is_active_host(&id) {
        tracing::debug!("Ignoring event from non-authoritative host '{}'", id);
        return;
    }

    let event = match InboundEvent::try_from(event) {
        Ok(event) => event,
        Err(e) => {
            ctx.send(&id, &ServerEvent::error(e.to_string()));
            return;
        }
    };

    match event {
        InboundEvent::UpdateText(text) => apply_text_update(ctx, &id, text),
        InboundEvent::UpdateEnabled(enabled) => apply_enabled_update(ctx, &id, enabled),
        InboundEvent::UpdateDialogCoords(coords) => apply_dialog_coords_update(ctx, &id, coords),
        InboundEvent::StartTimer(duration) => start_timer(ctx, duration),
        InboundEvent::StopTimer => stop_timer(ctx),
        InboundEvent::ToggleHostConnection(allowed) => {
            if require_role(ctx, &id, role, Role::Viewer, "toggle_host_connection") {
                toggle_host_gate(ctx, allowed);
            }
        }
        InboundEvent::Command(command) => {
            if require_role(ctx, &id, role, Role::Viewer, "command") {
                submit_command(ctx, &id, command);
            }
        }
        InboundEvent::Host(kind, payload) => {
            if require_role(ctx, &id, role, Role::Host, kind.as_str()) {
                relay_host_event(ctx, kind, &payload);
            }
        }
    }
}

fn require_role(
    ctx: &RelayContext,
    id: &ConnectionId,
    actual: Role,
    required: Role,
    event: &str,
) -> bool {
    if actual == required {
        return true;
    }
    tracing::debug!("Rejecting '{}' from {} '{}'", event, actual, id);
    ctx.send(
        id,
        &ServerEvent::error(format!("'{}' is only accepted from a {}", event, required)),
    );
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{SettingsDocument, StorageError, settings_store::MockSettingsStore},
        infrastructure::{
            dto::websocket::{DialogCoordsDto, TimerActionDto},
            repository::InMemorySettingsStore,
        },
        usecase::context::testing::{NOW, connect, find, harness, names, viewer_and_host},
    };
    use kakehashi_shared::time::FixedClock;
    use serde_json::json;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    #[test]
    fn test_inbound_event_conversion() {
        // テスト項目: ClientEvent から InboundEvent への変換と検証
        // given (前提条件):
        let start = ClientEvent::TimerAction(TimerActionDto {
            action: TimerAction::Start,
            duration: Some(60),
        });
        let start_without_duration = ClientEvent::TimerAction(TimerActionDto {
            action: TimerAction::Start,
            duration: None,
        });
        let coords = ClientEvent::UpdateDialogCoords(Some(DialogCoordsDto { x: 1.0, y: 2.0 }));

        // when (操作) / then (期待する結果):
        assert_eq!(
            InboundEvent::try_from(start),
            Ok(InboundEvent::StartTimer(60))
        );
        assert_eq!(
            InboundEvent::try_from(start_without_duration),
            Err(InboundError::MissingDuration)
        );
        assert_eq!(
            InboundEvent::try_from(coords),
            Ok(InboundEvent::UpdateDialogCoords(Some(DialogCoords {
                x: 1.0,
                y: 2.0
            })))
        );
        assert!(matches!(
            InboundEvent::try_from(ClientEvent::Command(json!({"x": 1}))),
            Err(InboundError::InvalidCommand(_))
        ));
    }

    #[tokio::test]
    async fn test_host_cannot_submit_commands() {
        // テスト項目: host からの command は error で拒否される
        // given (前提条件):
        let mut h = harness(RelayConfig::default());
        let (_viewer, mut host) = viewer_and_host(&mut h.ctx);
        host.drain();

        // when (操作):
        handle_event(
            &mut h.ctx,
            RelayEvent::Inbound {
                id: host.id,
                event: ClientEvent::Command(json!({"type": "START_AGENT"})),
            },
        );

        // then (期待する結果):
        assert_eq!(names(&host.drain()), vec!["error"]);
        assert!(h.ctx.queue().is_empty());
    }

    #[tokio::test]
    async fn test_viewer_cannot_emit_host_events() {
        // テスト項目: viewer からの screen_update は error で拒否され、転送されない
        // given (前提条件):
        let mut h = harness(RelayConfig::default());
        let mut alice = connect(&mut h.ctx, "viewer");
        let mut bob = connect(&mut h.ctx, "viewer");

        // when (操作):
        handle_event(
            &mut h.ctx,
            RelayEvent::Inbound {
                id: alice.id,
                event: ClientEvent::ScreenUpdate(json!({"image": "..."})),
            },
        );

        // then (期待する結果):
        assert_eq!(names(&alice.drain()), vec!["error"]);
        assert!(bob.drain().is_empty());
        assert!(bob.drain_telemetry().is_empty());
    }

    #[tokio::test]
    async fn test_host_timer_action_starts_timer() {
        // テスト項目: timer_action はロールに関係なく受け付けられる
        // given (前提条件):
        let mut h = harness(RelayConfig::default());
        let (mut viewer, host) = viewer_and_host(&mut h.ctx);

        // when (操作):
        handle_event(
            &mut h.ctx,
            RelayEvent::Inbound {
                id: host.id,
                event: ClientEvent::TimerAction(TimerActionDto {
                    action: TimerAction::Start,
                    duration: Some(5),
                }),
            },
        );

        // then (期待する結果):
        let received = viewer.drain();
        let timer = find(&received, "timer_updated");
        assert_eq!(timer.len(), 1);
        assert_eq!(timer[0]["data"]["endTime"], NOW + 5_000);
    }

    #[tokio::test]
    async fn test_malformed_frame_answers_error() {
        // テスト項目: 解釈できないフレームには error を返し、状態は変わらない
        // given (前提条件):
        let mut h = harness(RelayConfig::default());
        let mut viewer = connect(&mut h.ctx, "viewer");
        let before = h.ctx.state().clone();

        // when (操作):
        handle_event(
            &mut h.ctx,
            RelayEvent::Malformed {
                id: viewer.id,
                reason: "expected value".to_string(),
            },
        );

        // then (期待する結果):
        let received = viewer.drain();
        assert_eq!(names(&received), vec!["error"]);
        assert_eq!(h.ctx.state(), &before);
    }

    #[tokio::test]
    async fn test_replaced_host_cannot_mutate_state_after_gate_closes() {
        // テスト項目: 置き換えられた host は登録から外れ、ゲートが閉じた後も状態を変更できない
        // given (前提条件):
        let mut h = harness(RelayConfig::default());
        let (mut viewer, mut old_host) = viewer_and_host(&mut h.ctx);
        let new_host = connect(&mut h.ctx, "host");
        handle_event(
            &mut h.ctx,
            RelayEvent::Inbound {
                id: viewer.id,
                event: ClientEvent::ToggleHostConnection(false),
            },
        );
        viewer.drain();
        old_host.drain();

        // when (操作):
        for event in [
            ClientEvent::UpdateText("from replaced host".to_string()),
            ClientEvent::UpdateEnabled(true),
            ClientEvent::TimerAction(TimerActionDto {
                action: TimerAction::Start,
                duration: Some(30),
            }),
        ] {
            handle_event(
                &mut h.ctx,
                RelayEvent::Inbound {
                    id: old_host.id,
                    event,
                },
            );
        }

        // then (期待する結果):
        assert_eq!(h.ctx.registry().role_of(&old_host.id), None);
        assert_eq!(h.ctx.registry().role_of(&new_host.id), None);
        assert_eq!(h.ctx.registry().active_host(), None);
        assert_eq!(h.ctx.state().text, "");
        assert!(!h.ctx.state().enabled);
        assert!(!h.ctx.state().timer.running());
        assert!(viewer.drain().is_empty());
        assert!(old_host.drain().is_empty());
    }

    #[tokio::test]
    async fn test_replaced_host_telemetry_is_ignored() {
        // テスト項目: 置き換えられた host のテレメトリは viewer に転送されない
        // given (前提条件):
        let mut h = harness(RelayConfig::default());
        let (mut viewer, old_host) = viewer_and_host(&mut h.ctx);
        let _new_host = connect(&mut h.ctx, "host");
        viewer.drain();

        // when (操作):
        handle_event(
            &mut h.ctx,
            RelayEvent::Inbound {
                id: old_host.id,
                event: ClientEvent::Log(json!({"message": "stale"})),
            },
        );

        // then (期待する結果):
        assert!(viewer.drain().is_empty());
        assert!(viewer.drain_telemetry().is_empty());
    }

    #[tokio::test]
    async fn test_dispatcher_snapshot_and_shutdown_flush() {
        // テスト項目: dispatcher 経由で状態を更新し、shutdown 時に保存される
        // given (前提条件):
        let store = Arc::new(InMemorySettingsStore::default());
        let (relay, task) = RelayDispatcher::spawn(
            RelayConfig::default(),
            SharedState::default(),
            store.clone(),
            Arc::new(FixedClock::new(NOW)),
        );
        let id = ConnectionId::generate();
        let (channel, _rx) = PusherChannel::new(8);
        relay.connect(id, Handshake::default(), channel);

        // when (操作):
        relay.inbound(id, ClientEvent::UpdateText("persist me".to_string()));
        let snapshot = relay.snapshot().await.unwrap();
        relay.shutdown().await;
        task.await.unwrap();

        // then (期待する結果):
        assert_eq!(snapshot.text, "persist me");
        let saved = store.load().await.unwrap().persisted_state();
        assert_eq!(saved.text, "persist me");
        assert!(relay.snapshot().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_persist_is_retried_next_cycle() {
        // テスト項目: 保存に失敗しても次の debounce サイクルで再試行される
        // given (前提条件):
        let attempts = Arc::new(AtomicUsize::new(0));
        let mut store = MockSettingsStore::new();
        let counter = attempts.clone();
        store.expect_load().returning(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StorageError::Io(std::io::Error::other("storage offline")))
            } else {
                Ok(SettingsDocument::new())
            }
        });
        store
            .expect_save()
            .times(1)
            .withf(|document| document.persisted_state().text == "retry")
            .returning(|_| Ok(()));
        let (relay, _task) = RelayDispatcher::spawn(
            RelayConfig::default(),
            SharedState::default(),
            Arc::new(store),
            Arc::new(FixedClock::new(NOW)),
        );
        let id = ConnectionId::generate();
        let (channel, _rx) = PusherChannel::new(8);
        relay.connect(id, Handshake::default(), channel);

        // when (操作):
        relay.inbound(id, ClientEvent::UpdateText("retry".to_string()));
        tokio::time::sleep(Duration::from_secs(5)).await;

        // then (期待する結果):
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
