//! The JSON-RPC error taxonomy: EIP-1474 plus the Engine API extensions.

use serde::{Deserialize, Serialize};

/// The numeric error codes this server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received.
    ParseError,
    /// The payload is not a valid request object.
    InvalidRequest,
    /// The method does not exist.
    MethodNotFound,
    /// Parameter validation failed.
    InvalidParams,
    /// The server faulted while handling the request.
    InternalError,
    /// A generic client-reported error.
    ServerError,
    /// Engine: the payload is not buffered.
    UnknownPayload,
    /// Engine: the forkchoice state is inconsistent.
    InvalidForkchoiceState,
    /// Engine: the payload attributes are invalid.
    InvalidPayloadAttributes,
    /// Engine: the request names too many entities.
    TooLargeRequest,
    /// Engine: the request targets the wrong fork.
    UnsupportedFork,
}

impl ErrorCode {
    /// The numeric code.
    pub const fn code(&self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError => -32000,
            Self::UnknownPayload => -38001,
            Self::InvalidForkchoiceState => -38002,
            Self::InvalidPayloadAttributes => -38003,
            Self::TooLargeRequest => -38004,
            Self::UnsupportedFork => -38005,
        }
    }

    /// The default message for the code.
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::ServerError => "Server error",
            Self::UnknownPayload => "Unknown payload",
            Self::InvalidForkchoiceState => "Invalid forkchoice state",
            Self::InvalidPayloadAttributes => "Invalid payload attributes",
            Self::TooLargeRequest => "Too large request",
            Self::UnsupportedFork => "Unsupported fork",
        }
    }
}

/// The error member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// The numeric error code.
    pub code: i64,
    /// A short description of the error.
    pub message: String,
    /// Optional structured details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ErrorObject {
    /// Builds an error from a taxonomy code with its default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self { code: code.code(), message: code.message().to_string(), data: None }
    }

    /// Builds an error from a taxonomy code with a custom message.
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code: code.code(), message: message.into(), data: None }
    }
}

impl core::fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}
