//! UseCase 層のエラー型定義

use thiserror::Error;

use crate::domain::RegistryError;

/// Reason sent to a peer whose token does not match the shared secret
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid access token";
/// Reason sent to a host connecting while the host gate is closed
pub const HOST_NOT_ENABLED_MESSAGE: &str = "Host connection not enabled by a viewer";
/// Reason sent to a host evicted because a viewer closed the gate
pub const HOST_DISABLED_MESSAGE: &str = "Host connection disabled by a viewer";
/// Reason sent to a host evicted because every viewer left
pub const NO_VIEWERS_MESSAGE: &str = "No viewers remain; host connection disabled";

/// 接続受付（Connection Gate / Role Arbiter）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// トークンが共有シークレットと一致しない
    #[error("{}", INVALID_TOKEN_MESSAGE)]
    AuthFailure,

    /// 要求されたロールを取得できない
    #[error("{0}")]
    RoleRejected(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
