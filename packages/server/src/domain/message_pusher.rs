//! Port for pushing encoded events to connected peers.
//!
//! Each connection owns two outbound lanes:
//! - a control lane (unbounded) for commands, state changes and notifications,
//!   which are never dropped
//! - a telemetry lane (bounded) for screen frames and host log lines, which are
//!   dropped when the peer falls behind

use thiserror::Error;
use tokio::sync::mpsc;

use super::ConnectionId;

/// Item travelling on a connection's control lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// An encoded event envelope.
    Text(String),
    /// Close the socket once everything queued before it has been written.
    Close,
}

/// Sending halves of one connection's outbound lanes.
#[derive(Debug, Clone)]
pub struct PusherChannel {
    pub control: mpsc::UnboundedSender<Outbound>,
    pub telemetry: mpsc::Sender<String>,
}

/// Receiving halves matching a [`PusherChannel`].
#[derive(Debug)]
pub struct PusherReceivers {
    pub control: mpsc::UnboundedReceiver<Outbound>,
    pub telemetry: mpsc::Receiver<String>,
}

impl PusherChannel {
    /// Create both lanes; `telemetry_buffer` bounds the telemetry lane.
    pub fn new(telemetry_buffer: usize) -> (Self, PusherReceivers) {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (telemetry_tx, telemetry_rx) = mpsc::channel(telemetry_buffer.max(1));
        (
            Self {
                control: control_tx,
                telemetry: telemetry_tx,
            },
            PusherReceivers {
                control: control_rx,
                telemetry: telemetry_rx,
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("client '{0}' is not registered")]
    ClientNotFound(String),

    #[error("push failed: {0}")]
    PushFailed(String),

    /// The telemetry lane is full; the payload was dropped.
    #[error("telemetry dropped for client '{0}'")]
    Backpressure(String),
}

/// Delivery of encoded events to connections.
///
/// Implementations never block: every method returns as soon as the payload
/// has been handed to the connection's writer task.
pub trait MessagePusher: Send {
    fn register_client(&mut self, id: ConnectionId, channel: PusherChannel);

    fn unregister_client(&mut self, id: &ConnectionId);

    /// Queue `content` on the control lane of `id`.
    fn push_to(&self, id: &ConnectionId, content: &str) -> Result<(), MessagePushError>;

    /// Offer `content` on the telemetry lane of `id`, dropping it under backpressure.
    fn push_telemetry(&self, id: &ConnectionId, content: &str) -> Result<(), MessagePushError>;

    /// Ask the writer task of `id` to close the socket after pending control items.
    fn close(&self, id: &ConnectionId) -> Result<(), MessagePushError>;

    /// Push `content` on the control lane of every target, tolerating partial failure.
    fn broadcast(&self, targets: &[ConnectionId], content: &str);
}
