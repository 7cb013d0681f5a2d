//! Error types for Kino Bridge

use crate::types::PlayerHandle;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Bridge error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("video player plugin requires a foreground rendering context")]
    NoRenderingContext,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Lookup errors
    #[error("No video player associated with handle {handle}")]
    UnknownHandle { handle: PlayerHandle },

    #[error("Handle {handle} is already tracked by another player")]
    HandleInUse { handle: PlayerHandle },

    // Protocol errors
    #[error("Method not implemented: {0}")]
    NotImplemented(String),

    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument { name: String, reason: String },

    // Setup errors
    #[error("Invalid data source: {0}")]
    InvalidDataSource(String),

    #[error("Native player error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid-argument error
    pub fn invalid_argument(name: impl Into<String>, reason: impl ToString) -> Self {
        Error::InvalidArgument {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true for handle lookup failures
    pub fn is_lookup(&self) -> bool {
        matches!(self, Error::UnknownHandle { .. } | Error::HandleInUse { .. })
    }

    /// Returns the error code reported on the method channel
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::NoRenderingContext => "no_activity",
            Error::InvalidConfig(_) => "invalid_config",
            Error::UnknownHandle { .. } => "unknown_handle",
            Error::HandleInUse { .. } => "handle_in_use",
            Error::NotImplemented(_) => "not_implemented",
            Error::InvalidArgument { .. } => "invalid_argument",
            Error::InvalidDataSource(_) => "invalid_data_source",
            Error::Engine(_) => "engine",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
        }
    }
}

/// Error record as it travels over a channel: either as a method reply or as
/// an error message on a player's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ChannelError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<&Error> for ChannelError {
    fn from(err: &Error) -> Self {
        let details = match err {
            Error::UnknownHandle { handle } | Error::HandleInUse { handle } => {
                Some(serde_json::json!({ "handle": handle }))
            }
            _ => None,
        };
        Self {
            code: err.error_code().to_string(),
            message: err.to_string(),
            details,
        }
    }
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
