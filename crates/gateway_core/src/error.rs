//! Error types and handling for the gateway.
//!
//! [`GatewayError`] is the taxonomy every client-facing hook answers with. Each
//! variant maps to a distinct wire code so clients can tell an authorization
//! failure apart from a malformed request, an unknown RPC method, a server
//! fault, or a business-logic error raised by a game operation.

use serde::{Deserialize, Serialize};

/// Outcome of a rejected subscribe, publish or RPC.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Well-formed request, but the caller is not allowed to perform it
    #[error("permission denied")]
    PermissionDenied,

    /// Malformed channel identifier or request parameters
    #[error("bad request")]
    BadRequest,

    /// RPC method name is not present in the dispatch table
    #[error("method not found")]
    MethodNotFound,

    /// Collaborator or serialization failure. The detail is for server-side
    /// diagnostics only and never reaches the client.
    #[error("internal server error: {0}")]
    Internal(String),

    /// Domain error returned by a game operation, passed through unchanged
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl GatewayError {
    pub const CODE_INTERNAL: u32 = 100;
    pub const CODE_PERMISSION_DENIED: u32 = 103;
    pub const CODE_METHOD_NOT_FOUND: u32 = 104;
    pub const CODE_BAD_REQUEST: u32 = 107;

    /// Wire code reported to the client.
    pub fn code(&self) -> u32 {
        match self {
            GatewayError::Internal(_) => Self::CODE_INTERNAL,
            GatewayError::PermissionDenied => Self::CODE_PERMISSION_DENIED,
            GatewayError::MethodNotFound => Self::CODE_METHOD_NOT_FOUND,
            GatewayError::BadRequest => Self::CODE_BAD_REQUEST,
            GatewayError::Handler(err) => err.code,
        }
    }

    /// Message reported to the client. Internal details are masked.
    pub fn client_message(&self) -> String {
        match self {
            GatewayError::Internal(_) => "internal server error".to_string(),
            GatewayError::Handler(err) => err.message.clone(),
            other => other.to_string(),
        }
    }

    /// Convenience check used by the transport and tests.
    pub fn is_internal(&self) -> bool {
        matches!(self, GatewayError::Internal(_))
    }
}

/// Error raised by an RPC handler.
///
/// The dispatch layer never reinterprets these; code and message travel to the
/// client verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct HandlerError {
    pub code: u32,
    pub message: String,
}

impl HandlerError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Enumeration of possible server errors.
///
/// Covers transport and startup failures that never travel back to a client
/// as a reply.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Network-related errors such as binding failures or handshake issues
    #[error("Network error: {0}")]
    Network(String),

    /// Internal server errors such as exhausted connection slots
    #[error("Internal error: {0}")]
    Internal(String),
}
