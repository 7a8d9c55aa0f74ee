//! Bounded drop-oldest buffer for commands submitted while no host is attached.

use std::collections::VecDeque;

use serde_json::Value;

use super::CommandError;

/// Number of commands buffered while the host is offline.
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

/// An opaque control command addressed to the host.
///
/// The relay only looks at the `type` discriminator; the rest of the payload
/// is delivered to the host verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    kind: String,
    payload: Value,
}

impl Command {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }
}

impl TryFrom<Value> for Command {
    type Error = CommandError;

    fn try_from(payload: Value) -> Result<Self, Self::Error> {
        let object = payload.as_object().ok_or(CommandError::NotAnObject)?;
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(CommandError::MissingType)?
            .to_string();
        Ok(Self { kind, payload })
    }
}

/// FIFO of pending commands with a fixed capacity.
///
/// Pushing onto a full queue evicts the oldest entry; the newest command is
/// never rejected.
#[derive(Debug)]
pub struct CommandQueue {
    entries: VecDeque<Command>,
    capacity: usize,
}

impl CommandQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `command`, returning the evicted entry when the queue was full.
    pub fn push(&mut self, command: Command) -> Option<Command> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(command);
        evicted
    }

    /// Take every entry in insertion order, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<Command> {
        self.entries.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.entries.iter()
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
