use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session signature rejected by the server. Evicts the cached tag association.
pub const CODE_SESSION_SIGNATURE_FAILURE: i32 = 4102;
/// Session token invalid or expired. Evicts the token and retries the open.
pub const CODE_SESSION_TOKEN_FAILURE: i32 = 4112;

/// The structured failure delivered to whoever issued an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum OperationError {
    /// The transport dropped while the operation was in flight.
    #[error("connection lost")]
    ConnectionLost,
    #[error("server error: code={code}, app_code={app_code}, reason='{reason}'")]
    Server {
        code: i32,
        app_code: i32,
        reason: String,
    },
    #[error("signature error: {0}")]
    Signature(String),
}

impl OperationError {
    pub fn server(code: i32, app_code: Option<i32>, reason: Option<&str>) -> Self {
        Self::Server {
            code,
            app_code: app_code.unwrap_or(0),
            reason: reason.unwrap_or_default().to_string(),
        }
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Server { code, .. } => Some(*code),
            _ => None,
        }
    }
}
