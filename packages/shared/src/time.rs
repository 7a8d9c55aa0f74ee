//! Time-related utilities with clock abstraction for testability.
//!
//! The relay only ever hands out absolute end times (Unix milliseconds).
//! Every party derives the remaining countdown from its own clock with
//! [`remaining_seconds`], so missed broadcasts never skew the display.

use chrono::{DateTime, Local, TimeZone, Utc};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Get current Unix timestamp (milliseconds)
    fn now_millis(&self) -> i64;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        get_unix_millis()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    /// Create a new fixed clock with the given timestamp
    pub fn new(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: fixed_time_millis,
        }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.fixed_time
    }
}

/// Get current Unix timestamp (milliseconds)
pub fn get_unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Whole seconds left until `end_time_millis`, rounded up.
///
/// Returns 0 once the end time has passed.
pub fn remaining_seconds(end_time_millis: i64, now_millis: i64) -> u64 {
    let diff = end_time_millis - now_millis;
    if diff <= 0 {
        return 0;
    }
    (diff as u64).div_ceil(1000)
}

/// Convert Unix timestamp (milliseconds) to UTC RFC 3339 format
pub fn timestamp_to_rfc3339(timestamp_millis: i64) -> String {
    match Utc.timestamp_millis_opt(timestamp_millis).single() {
        Some(dt) => dt.to_rfc3339(),
        None => timestamp_millis.to_string(),
    }
}

/// Convert Unix timestamp (milliseconds) to a local `HH:MM:SS` wall-clock label
pub fn timestamp_to_local_clock(timestamp_millis: i64) -> String {
    match Utc.timestamp_millis_opt(timestamp_millis).single() {
        Some(dt) => {
            let local: DateTime<Local> = dt.with_timezone(&Local);
            local.format("%H:%M:%S").to_string()
        }
        None => "--:--:--".to_string(),
    }
}
