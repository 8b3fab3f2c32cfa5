//! Weld error type and wire-stable error codes.

use serde::{Deserialize, Serialize};

/// Error codes carried in `error` frames. The integer values are part of the
/// wire protocol and must not be reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeldErrorCode {
    // Registration / binding
    InvalidArgument,
    BindingFailure,

    // Dispatch
    UnknownResource,
    MethodNotFound,
    NotJoined,
    ParseError,

    // Session bridge
    SessionTimeout,
    SessionUnavailable,

    // Catch-all
    ServerError,

    // Custom code
    Custom(i32),
}

impl WeldErrorCode {
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidArgument => 1000,
            Self::BindingFailure => 1001,
            Self::UnknownResource => 1002,
            Self::MethodNotFound => 1003,
            Self::NotJoined => 1004,
            Self::ParseError => 1005,
            Self::SessionTimeout => 1100,
            Self::SessionUnavailable => 1101,
            Self::ServerError => 1500,
            Self::Custom(c) => *c,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1000 => Self::InvalidArgument,
            1001 => Self::BindingFailure,
            1002 => Self::UnknownResource,
            1003 => Self::MethodNotFound,
            1004 => Self::NotJoined,
            1005 => Self::ParseError,
            1100 => Self::SessionTimeout,
            1101 => Self::SessionUnavailable,
            1500 => Self::ServerError,
            c => Self::Custom(c),
        }
    }
}

/// Error object as serialized into `error` frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeldError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl WeldError {
    pub fn new(code: WeldErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(WeldErrorCode::InvalidArgument, message)
    }

    pub fn binding_failure(message: impl Into<String>) -> Self {
        Self::new(WeldErrorCode::BindingFailure, message)
    }

    pub fn unknown_resource(name: &str) -> Self {
        Self::new(WeldErrorCode::UnknownResource, format!("Unknown resource: {name}"))
    }

    pub fn method_not_found(resource: &str, method: &str) -> Self {
        Self::new(
            WeldErrorCode::MethodNotFound,
            format!("Method not found on resource {resource}: {method}"),
        )
    }

    pub fn not_joined(resource: &str) -> Self {
        Self::new(
            WeldErrorCode::NotJoined,
            format!("Connection has not joined resource: {resource}"),
        )
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(WeldErrorCode::ParseError, message)
    }

    pub fn session_timeout(message: impl Into<String>) -> Self {
        Self::new(WeldErrorCode::SessionTimeout, message)
    }

    pub fn session_unavailable(message: impl Into<String>) -> Self {
        Self::new(WeldErrorCode::SessionUnavailable, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(WeldErrorCode::ServerError, message)
    }

    pub fn error_code(&self) -> WeldErrorCode {
        WeldErrorCode::from_code(self.code)
    }
}

impl std::fmt::Display for WeldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Weld Error [{}]: {}", self.code, self.message)
    }
}

impl std::error::Error for WeldError {}
