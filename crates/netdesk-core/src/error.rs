//! Error types for the netdesk console

use std::{error::Error as StdError, fmt};

/// Main error type for the netdesk console
#[derive(Debug)]
pub enum Error {
    /// No session token is stored, or the backend rejected it
    AuthRequired,

    /// Transport failure or non-2xx response
    Network {
        /// HTTP status when the server answered
        status: Option<u16>,
        /// Error message
        message: String,
    },

    /// Client-side form validation failed; the request was never sent
    Validation {
        /// Field that failed validation
        field: String,
        /// Validation error message
        message: String,
    },

    /// A message template references variables it does not declare
    UndefinedTemplateVariables {
        /// Undefined variable names, sorted and deduplicated
        variables: Vec<String>,
    },

    /// A realtime event or user intent is not allowed in the current state
    InvalidTransition {
        /// State name at the time of the event
        from: String,
        /// Rejected event or intent
        event: String,
    },

    /// Configuration error
    Configuration {
        /// Error message
        message: String,
    },

    /// Realtime wire protocol error
    Protocol(String),

    /// Not found error
    NotFound {
        /// Resource that was not found
        resource: String,
    },

    /// I/O error
    Io(std::io::Error),

    /// Serialization error
    Serialization(serde_json::Error),

    /// Other error
    Other(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a transport-level network error (no HTTP status)
    #[must_use]
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            status: None,
            message: message.into(),
        }
    }

    /// Create a network error for a non-2xx response
    #[must_use]
    pub fn http_status<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Network {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether the user has to log in again before retrying
    #[must_use]
    pub const fn is_auth_required(&self) -> bool {
        matches!(self, Self::AuthRequired)
    }

    /// Whether this failure happened before any request left the client
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::UndefinedTemplateVariables { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthRequired => write!(f, "Authentication required"),
            Self::Network {
                status: Some(status),
                message,
            } => write!(f, "Request failed with status {status}: {message}"),
            Self::Network {
                status: None,
                message,
            } => write!(f, "Network error: {message}"),
            Self::Validation { field, message } => {
                write!(f, "Validation error: {field} - {message}")
            }
            Self::UndefinedTemplateVariables { variables } => {
                write!(f, "Undefined template variables: {}", variables.join(", "))
            }
            Self::InvalidTransition { from, event } => {
                write!(f, "Invalid transition: {event} not allowed while {from}")
            }
            Self::Configuration { message } => write!(f, "Configuration error: {message}"),
            Self::Protocol(msg) => write!(f, "Protocol error: {msg}"),
            Self::NotFound { resource } => write!(f, "Resource not found: {resource}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Serialization(err) => write!(f, "Serialization error: {err}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration {
            message: err.to_string(),
        }
    }
}
