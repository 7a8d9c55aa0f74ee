//! The small document every party of the relay sees the same copy of.

/// Screen position of the agent's input dialog, in stream pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialogCoords {
    pub x: f64,
    pub y: f64,
}

/// Server-authoritative countdown.
///
/// Invariant: `running == false` implies `end_time == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerState {
    running: bool,
    end_time: i64,
    original_duration_seconds: u64,
}

impl TimerState {
    /// Start a countdown of `duration_seconds` from `now_millis`.
    pub fn start(&mut self, now_millis: i64, duration_seconds: u64) {
        let duration_millis =
            i64::try_from(duration_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
        self.running = true;
        self.end_time = now_millis.saturating_add(duration_millis);
        self.original_duration_seconds = duration_seconds;
    }

    /// Stop the countdown. Stopping a stopped timer changes nothing.
    pub fn stop(&mut self) {
        *self = Self::default();
    }

    pub fn running(&self) -> bool {
        self.running
    }

    /// Absolute end time in Unix milliseconds, 0 while stopped.
    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    pub fn original_duration_seconds(&self) -> u64 {
        self.original_duration_seconds
    }
}

/// The fields of [`SharedState`] that survive a restart.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PersistedState {
    pub text: String,
    pub enabled: bool,
    pub dialog_coords: Option<DialogCoords>,
}

/// Singleton state shared by the host and every viewer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SharedState {
    pub text: String,
    pub enabled: bool,
    pub dialog_coords: Option<DialogCoords>,
    pub host_allowed: bool,
    pub host_connected: bool,
    pub timer: TimerState,
}

impl SharedState {
    /// Build the start-of-process state from what storage remembered.
    ///
    /// Connection-related flags and the timer always start cleared.
    pub fn hydrate(persisted: PersistedState) -> Self {
        Self {
            text: persisted.text,
            enabled: persisted.enabled,
            dialog_coords: persisted.dialog_coords,
            ..Self::default()
        }
    }

    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            text: self.text.clone(),
            enabled: self.enabled,
            dialog_coords: self.dialog_coords,
        }
    }
}
