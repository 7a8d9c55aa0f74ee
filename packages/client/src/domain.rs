//! Domain logic for client-side operations.
//!
//! This module contains pure functions that implement business logic
//! without side effects, making them easy to test.

use kakehashi_server::{
    domain::Role,
    infrastructure::dto::websocket::{ClientEvent, DialogCoordsDto, TimerAction, TimerActionDto},
};
use serde_json::{Map, Value, json};

use crate::error::ClientError;

pub const HELP_TEXT: &str = "\
Viewer commands:
  /text <message>      set the shared text
  /enable on|off       enable or disable the agent
  /timer start <secs>  start the countdown
  /timer stop          stop the countdown
  /host on|off         allow or refuse the host connection
  /coords <x> <y>      set the dialog position (/coords clear to reset)
  /cmd <TYPE> [json]   send a command to the host
Host mode: plain lines are sent as log messages; /timer is also available.";

/// What a line typed at the prompt turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    Send(ClientEvent),
    Help,
    /// The line could not be understood; the string says why.
    Invalid(String),
}

/// Check if the client should exit immediately based on the error type.
///
/// # Returns
///
/// `true` if the relay refused us or the URL is unusable (retrying would
/// fail the same way), `false` otherwise
pub fn should_exit_immediately(error: &ClientError) -> bool {
    matches!(
        error,
        ClientError::AuthRejected(_) | ClientError::InvalidUrl(_)
    )
}

/// Check if the client should attempt to reconnect.
///
/// # Arguments
///
/// * `error` - The client error that occurred
/// * `current_attempt` - The current reconnection attempt count (0-indexed)
/// * `max_attempts` - The maximum number of reconnection attempts allowed
pub fn should_attempt_reconnect(
    error: &ClientError,
    current_attempt: u32,
    max_attempts: u32,
) -> bool {
    // Don't reconnect if the error requires immediate exit
    if should_exit_immediately(error) {
        return false;
    }

    current_attempt < max_attempts
}

/// Translate a prompt line into the event to send.
pub fn parse_input_line(role: Role, line: &str) -> InputAction {
    let line = line.trim();
    if line == "/help" {
        return InputAction::Help;
    }

    let Some(command) = line.strip_prefix('/') else {
        return match role {
            Role::Host => InputAction::Send(ClientEvent::Log(json!({ "message": line }))),
            Role::Viewer => InputAction::Invalid("Unknown input, type /help".to_string()),
        };
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    match (role, name) {
        (_, "timer") => parse_timer(rest),
        (Role::Viewer, "text") => InputAction::Send(ClientEvent::UpdateText(rest.to_string())),
        (Role::Viewer, "enable") => parse_switch(rest).map_or_else(
            || InputAction::Invalid("Usage: /enable on|off".to_string()),
            |on| InputAction::Send(ClientEvent::UpdateEnabled(on)),
        ),
        (Role::Viewer, "host") => parse_switch(rest).map_or_else(
            || InputAction::Invalid("Usage: /host on|off".to_string()),
            |on| InputAction::Send(ClientEvent::ToggleHostConnection(on)),
        ),
        (Role::Viewer, "coords") => parse_coords(rest),
        (Role::Viewer, "cmd") => parse_command(rest),
        (Role::Host, _) => InputAction::Invalid(format!("/{} is not available as host", name)),
        (Role::Viewer, _) => InputAction::Invalid(format!("Unknown command /{}", name)),
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value {
        "on" | "true" => Some(true),
        "off" | "false" => Some(false),
        _ => None,
    }
}

fn parse_timer(rest: &str) -> InputAction {
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("start"), Some(seconds)) => match seconds.parse::<u64>() {
            Ok(duration) => InputAction::Send(ClientEvent::TimerAction(TimerActionDto {
                action: TimerAction::Start,
                duration: Some(duration),
            })),
            Err(_) => InputAction::Invalid(format!("Invalid duration '{}'", seconds)),
        },
        (Some("stop"), None) => InputAction::Send(ClientEvent::TimerAction(TimerActionDto {
            action: TimerAction::Stop,
            duration: None,
        })),
        _ => InputAction::Invalid("Usage: /timer start <secs> | /timer stop".to_string()),
    }
}

fn parse_coords(rest: &str) -> InputAction {
    if rest == "clear" {
        return InputAction::Send(ClientEvent::UpdateDialogCoords(None));
    }
    let mut parts = rest.split_whitespace().map(str::parse::<f64>);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(x)), Some(Ok(y)), None) => {
            InputAction::Send(ClientEvent::UpdateDialogCoords(Some(DialogCoordsDto { x, y })))
        }
        _ => InputAction::Invalid("Usage: /coords <x> <y> | /coords clear".to_string()),
    }
}

/// `/cmd TYPE [json object]`; the object's fields are sent alongside `type`.
fn parse_command(rest: &str) -> InputAction {
    let (kind, extra) = match rest.split_once(char::is_whitespace) {
        Some((kind, extra)) => (kind, extra.trim()),
        None => (rest, ""),
    };
    if kind.is_empty() {
        return InputAction::Invalid("Usage: /cmd <TYPE> [json]".to_string());
    }

    let mut payload = if extra.is_empty() {
        Map::new()
    } else {
        match serde_json::from_str::<Value>(extra) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return InputAction::Invalid("Command fields must be a JSON object".to_string());
            }
            Err(e) => return InputAction::Invalid(format!("Invalid JSON: {}", e)),
        }
    };
    payload.insert("type".to_string(), Value::String(kind.to_string()));
    InputAction::Send(ClientEvent::Command(Value::Object(payload)))
}
