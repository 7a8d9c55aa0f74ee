//! Event formatting utilities for client display.

use kakehashi_server::infrastructure::dto::websocket::{ServerEvent, TimerStateDto};
use kakehashi_shared::time::{remaining_seconds, timestamp_to_local_clock};
use serde_json::Value;

/// Event formatter for client display
pub struct EventFormatter;

impl EventFormatter {
    /// Format a relay event for the terminal
    ///
    /// # Arguments
    ///
    /// * `event` - The decoded relay event
    /// * `now_millis` - Local wall clock, used to derive the countdown
    pub fn format_event(event: &ServerEvent, now_millis: i64) -> String {
        match event {
            ServerEvent::AuthResult(result) if result.success => {
                "\n* Authenticated with relay\n".to_string()
            }
            ServerEvent::AuthResult(result) => format!(
                "\n! Rejected: {}\n",
                result.message.as_deref().unwrap_or("no reason given")
            ),
            ServerEvent::StateSync(state) => {
                let mut output = String::new();
                output.push_str("\n============================================================\n");
                output.push_str(&format!("text          : {}\n", state.text));
                output.push_str(&format!("enabled       : {}\n", state.enabled));
                output.push_str(&format!(
                    "dialog coords : {}\n",
                    state
                        .dialog_coords
                        .map(|c| format!("({}, {})", c.x, c.y))
                        .unwrap_or_else(|| "-".to_string())
                ));
                output.push_str(&format!("host allowed  : {}\n", state.host_allowed));
                output.push_str(&format!("host connected: {}\n", state.host_connected));
                output.push_str(&format!(
                    "timer         : {}\n",
                    Self::format_timer(&state.timer, now_millis)
                ));
                output.push_str("============================================================\n");
                output
            }
            ServerEvent::TextUpdated { text } => format!("\n* text -> {}\n", text),
            ServerEvent::EnabledUpdated { enabled } => format!("\n* enabled -> {}\n", enabled),
            ServerEvent::DialogCoordsUpdated { dialog_coords } => match dialog_coords {
                Some(c) => format!("\n* dialog coords -> ({}, {})\n", c.x, c.y),
                None => "\n* dialog coords cleared\n".to_string(),
            },
            ServerEvent::TimerUpdated(timer) => {
                format!("\n* timer: {}\n", Self::format_timer(timer, now_millis))
            }
            ServerEvent::HostStatus { connected } => {
                if *connected {
                    "\n+ host connected\n".to_string()
                } else {
                    "\n- host disconnected\n".to_string()
                }
            }
            ServerEvent::HostAllowedStatus { allowed } => format!(
                "\n* host connection {}\n",
                if *allowed { "allowed" } else { "not allowed" }
            ),
            ServerEvent::Command(payload) => format!("\n> command: {}\n", payload),
            ServerEvent::Log { message } => format!("\n[log] {}\n", message),
            ServerEvent::Error { message } => format!("\n! error: {}\n", message),
            ServerEvent::ScreenUpdate(payload) => Self::format_frame(payload),
        }
    }

    /// Countdown derived from the absolute end time and the local clock
    pub fn format_timer(timer: &TimerStateDto, now_millis: i64) -> String {
        if !timer.running {
            return "stopped".to_string();
        }
        format!(
            "{}s left of {}s (ends at {})",
            remaining_seconds(timer.end_time, now_millis),
            timer.original_duration_seconds,
            timestamp_to_local_clock(timer.end_time)
        )
    }

    fn format_frame(payload: &Value) -> String {
        let size = payload
            .get("image")
            .and_then(Value::as_str)
            .map(str::len)
            .unwrap_or_else(|| payload.to_string().len());
        format!("\n[frame] {} bytes\n", size)
    }

    /// Format a frame the client could not decode
    pub fn format_raw_message(text: &str) -> String {
        format!("\n? {}\n", text)
    }
}
