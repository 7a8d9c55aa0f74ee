//! Relay configuration.

use std::time::Duration;

use crate::domain::DEFAULT_QUEUE_CAPACITY;

/// Tunables of the relay dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Shared secret every connection must present. `None` accepts everyone.
    pub access_code: Option<String>,
    /// Commands buffered while no host is attached.
    pub queue_capacity: usize,
    /// Quiet period before shared-state changes are written to storage.
    pub persist_debounce: Duration,
    /// Wait after a viewer leaves before checking whether any viewer remains.
    pub viewer_settle_delay: Duration,
    /// Telemetry frames buffered per connection before new ones are dropped.
    pub telemetry_buffer: usize,
}

impl RelayConfig {
    /// Fail-open means no secret is configured and every handshake is accepted.
    pub fn is_fail_open(&self) -> bool {
        self.access_code.is_none()
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            access_code: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            persist_debounce: Duration::from_secs(2),
            viewer_settle_delay: Duration::from_secs(1),
            telemetry_buffer: 8,
        }
    }
}
