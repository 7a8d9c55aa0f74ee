//! State owned by the relay dispatcher and the delivery helpers every usecase shares.

use std::sync::Arc;

use kakehashi_shared::time::Clock;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    RelayConfig,
    domain::{
        CommandQueue, ConnectionId, MessagePusher, SessionRegistry, SettingsStore, SharedState,
    },
    infrastructure::dto::websocket::ServerEvent,
};

use super::{dispatcher::RelayEvent, persist_settings::PersistScheduler};

/// Everything the relay knows, owned by a single dispatcher task.
///
/// Usecases receive `&mut RelayContext`; no other component keeps a copy of
/// the registry, the shared state or the queue.
pub struct RelayContext {
    pub(crate) config: RelayConfig,
    pub(crate) registry: SessionRegistry,
    pub(crate) state: SharedState,
    pub(crate) queue: CommandQueue,
    pub(crate) pusher: Box<dyn MessagePusher>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) persister: PersistScheduler,
    /// Pending viewer-count recheck; a newer departure replaces it
    pub(crate) settle_check: Option<JoinHandle<()>>,
    /// Loop-back into the dispatcher for delayed follow-up events
    pub(crate) events: mpsc::UnboundedSender<RelayEvent>,
}

impl RelayContext {
    pub fn new(
        config: RelayConfig,
        state: SharedState,
        pusher: Box<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
        store: Arc<dyn SettingsStore>,
        events: mpsc::UnboundedSender<RelayEvent>,
    ) -> Self {
        let persister = PersistScheduler::new(store, config.persist_debounce, events.clone());
        Self {
            queue: CommandQueue::new(config.queue_capacity),
            config,
            registry: SessionRegistry::new(),
            state,
            pusher,
            clock,
            persister,
            settle_check: None,
            events,
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Push `event` to one connection. Returns whether it was handed off.
    pub(crate) fn send(&self, id: &ConnectionId, event: &ServerEvent) -> bool {
        let Some(payload) = encode(event) else {
            return false;
        };
        match self.pusher.push_to(id, &payload) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to push event to '{}': {}", id, e);
                false
            }
        }
    }

    pub(crate) fn broadcast(&self, targets: &[ConnectionId], event: &ServerEvent) {
        if targets.is_empty() {
            return;
        }
        if let Some(payload) = encode(event) {
            self.pusher.broadcast(targets, &payload);
        }
    }

    /// Broadcast to every registered connection.
    pub(crate) fn broadcast_all(&self, event: &ServerEvent) {
        self.broadcast(&self.registry.connection_ids(), event);
    }

    /// Broadcast to every registered connection except `origin`.
    pub(crate) fn broadcast_except(&self, origin: &ConnectionId, event: &ServerEvent) {
        let targets: Vec<ConnectionId> = self
            .registry
            .connection_ids()
            .into_iter()
            .filter(|id| id != origin)
            .collect();
        self.broadcast(&targets, event);
    }

    pub(crate) fn broadcast_viewers(&self, event: &ServerEvent) {
        self.broadcast(&self.registry.viewer_ids(), event);
    }

    /// Send a failure notification, close the socket and forget the connection.
    ///
    /// The caller is responsible for removing `id` from the registry first.
    pub(crate) fn terminate(&mut self, id: &ConnectionId, reason: &str) {
        self.send(id, &ServerEvent::auth_failure(reason));
        if let Err(e) = self.pusher.close(id) {
            tracing::debug!("Close request for '{}' not delivered: {}", id, e);
        }
        self.pusher.unregister_client(id);
        tracing::info!("Connection '{}' terminated: {}", id, reason);
    }

    /// Queue a debounced write of the persisted fields.
    pub(crate) fn schedule_persist(&mut self) {
        let snapshot = self.state.persisted();
        self.persister.schedule(snapshot);
    }
}

fn encode(event: &ServerEvent) -> Option<String> {
    match event.encode() {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::error!("Failed to encode outbound event: {}", e);
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process harness for usecase tests.

    use std::sync::Arc;

    use kakehashi_shared::time::FixedClock;
    use serde_json::{Value, json};
    use tokio::{sync::mpsc, task::JoinHandle};

    use super::RelayContext;
    use crate::{
        RelayConfig,
        domain::{ConnectionId, Outbound, PusherChannel, PusherReceivers, Role, SharedState},
        infrastructure::{
            message_pusher::WebSocketMessagePusher, repository::InMemorySettingsStore,
        },
        usecase::{
            connect_peer::{Handshake, connect_peer},
            dispatcher::RelayEvent,
            error::GateError,
        },
    };

    pub const NOW: i64 = 1_700_000_000_000;

    pub struct Harness {
        pub ctx: RelayContext,
        pub events: mpsc::UnboundedReceiver<RelayEvent>,
        pub store: Arc<InMemorySettingsStore>,
    }

    pub struct Peer {
        pub id: ConnectionId,
        rx: PusherReceivers,
    }

    impl Peer {
        /// Everything queued on the control lane; a close request shows up as `{"event":"close"}`.
        pub fn drain(&mut self) -> Vec<Value> {
            let mut received = Vec::new();
            while let Ok(item) = self.rx.control.try_recv() {
                match item {
                    Outbound::Text(text) => received.push(serde_json::from_str(&text).unwrap()),
                    Outbound::Close => received.push(json!({"event": "close"})),
                }
            }
            received
        }

        pub fn drain_telemetry(&mut self) -> Vec<Value> {
            let mut received = Vec::new();
            while let Ok(text) = self.rx.telemetry.try_recv() {
                received.push(serde_json::from_str(&text).unwrap());
            }
            received
        }
    }

    pub fn harness(config: RelayConfig) -> Harness {
        harness_with_state(config, SharedState::default())
    }

    pub fn harness_with_state(config: RelayConfig, state: SharedState) -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Arc::new(InMemorySettingsStore::default());
        let ctx = RelayContext::new(
            config,
            state,
            Box::new(WebSocketMessagePusher::new()),
            Arc::new(FixedClock::new(NOW)),
            store.clone(),
            tx,
        );
        Harness {
            ctx,
            events: rx,
            store,
        }
    }

    pub fn try_connect(
        ctx: &mut RelayContext,
        token: Option<&str>,
        role: Option<&str>,
    ) -> (Peer, Result<Role, GateError>) {
        let id = ConnectionId::generate();
        let (channel, rx) = PusherChannel::new(ctx.config.telemetry_buffer);
        let handshake = Handshake {
            token: token.map(str::to_string),
            role: role.map(str::to_string),
        };
        let result = connect_peer(ctx, id, handshake, channel);
        (Peer { id, rx }, result)
    }

    /// Connect successfully and discard the greeting.
    pub fn connect(ctx: &mut RelayContext, role: &str) -> Peer {
        let token = ctx.config.access_code.clone();
        let (mut peer, result) = try_connect(ctx, token.as_deref(), Some(role));
        result.unwrap();
        peer.drain();
        peer
    }

    /// Open the host gate through a throwaway viewer, then attach a host.
    pub fn viewer_and_host(ctx: &mut RelayContext) -> (Peer, Peer) {
        let mut viewer = connect(ctx, "viewer");
        crate::usecase::host_gate::toggle_host_gate(ctx, true);
        viewer.drain();
        let host = connect(ctx, "host");
        viewer.drain();
        (viewer, host)
    }

    pub fn names(messages: &[Value]) -> Vec<&str> {
        messages
            .iter()
            .map(|m| m["event"].as_str().unwrap_or_default())
            .collect()
    }

    pub fn find<'a>(messages: &'a [Value], event: &str) -> Vec<&'a Value> {
        messages.iter().filter(|m| m["event"] == event).collect()
    }
}
