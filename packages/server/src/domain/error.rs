//! Domain-level error types.

use thiserror::Error;

use super::{ConnectionId, Role};

/// Errors raised by the session registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A connection may occupy only one role for its lifetime
    #[error("connection {id} already holds the {role} role")]
    RoleAlreadyAssigned { id: ConnectionId, role: Role },
}

/// Errors raised while turning a raw payload into a [`super::Command`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("command payload must be a JSON object")]
    NotAnObject,

    #[error("command payload is missing a string 'type' field")]
    MissingType,
}
