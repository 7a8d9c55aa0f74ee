//! HTTP API request and response bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `POST /verify` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub code: String,
}

/// `POST /data` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataUpdateRequest {
    pub data: Value,
}

/// Generic `{success, message?}` response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}
