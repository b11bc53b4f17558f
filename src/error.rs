//! Error types for peerqueue
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - Suggestions for the operator
//! - Retryable / fatal classification for callers

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for queue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoPermission = 202,
    IoNotFound = 203,

    // Connection errors (3xx)
    SendTimeout = 301,
    ChannelClosed = 303,
    BindFailed = 305,
    InvalidAddress = 306,

    // Protocol errors (4xx)
    ProtocolMalformed = 401,
    ProtocolUnexpected = 402,
    FrameTooLarge = 403,

    // Lifecycle errors (5xx)
    NotStarted = 500,
    AlreadyStarted = 501,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an inbound frame could not be decoded into an envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// Not JSON, or JSON without the envelope fields
    InvalidJson(String),

    /// Parseable envelope carrying a `messageType` this node does not know
    UnknownMessageType(String),

    /// Known `messageType` but `content` has the wrong shape
    InvalidContent(String),
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::InvalidJson(msg) => write!(f, "invalid envelope: {}", msg),
            MalformedReason::UnknownMessageType(tag) => {
                write!(f, "unknown message type '{}'", tag)
            }
            MalformedReason::InvalidContent(msg) => write!(f, "invalid content: {}", msg),
        }
    }
}

/// Main error type for the queue provider
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Transport Errors
    // ─────────────────────────────────────────────────────────────

    /// The outbound channel could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// A peer endpoint is not a usable `host:port`
    #[error("Invalid peer address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// No connected peer accepted an outbound message in time
    #[error("No peer accepted the message within {timeout_ms}ms")]
    SendTimeout { timeout_ms: u64 },

    /// The channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// Malformed message
    #[error("Malformed message: {reason}")]
    MalformedMessage { reason: MalformedReason },

    /// Frame length above the configured limit
    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: u32, max: u32 },

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Lifecycle Errors
    // ─────────────────────────────────────────────────────────────

    /// Enqueue attempted before start
    #[error("Queue provider not started")]
    NotStarted,

    /// Start called while already running
    #[error("Queue provider already started")]
    AlreadyStarted,
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },

            Error::Bind { .. } => ErrorCode::BindFailed,
            Error::InvalidAddress { .. } => ErrorCode::InvalidAddress,
            Error::SendTimeout { .. } => ErrorCode::SendTimeout,
            Error::ChannelClosed => ErrorCode::ChannelClosed,

            Error::MalformedMessage { reason } => match reason {
                MalformedReason::UnknownMessageType(_) => ErrorCode::ProtocolUnexpected,
                _ => ErrorCode::ProtocolMalformed,
            },
            Error::FrameTooLarge { .. } => ErrorCode::FrameTooLarge,
            Error::Serialization(_) => ErrorCode::ProtocolMalformed,

            Error::NotStarted => ErrorCode::NotStarted,
            Error::AlreadyStarted => ErrorCode::AlreadyStarted,
        }
    }

    /// Check if the caller may reasonably retry the operation
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::SendTimeout { .. } | Error::NotStarted | Error::Io(_)
        )
    }

    /// Check if the error prevents the provider from running at all
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::Config(_)
                | Error::Bind { .. }
                | Error::InvalidAddress { .. }
        )
    }

    /// True for any inbound frame that failed to decode
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Error::MalformedMessage { .. } | Error::FrameTooLarge { .. }
        )
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Write a configuration from ProviderConfig::default_toml() or pass the correct path.",
            ),
            Error::ConfigParse { .. } => Some(
                "Check the configuration file syntax against ProviderConfig::default_toml().",
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values.",
            ),
            Error::Bind { .. } => Some(
                "Another process may already be using local_port. Pick a free port or stop the other node.",
            ),
            Error::InvalidAddress { .. } => Some(
                "Peers must be written as host:port, for example \"10.0.0.2:5556\".",
            ),
            Error::SendTimeout { .. } => Some(
                "No node is connected to this node's port. Check that peers list this node and are running.",
            ),
            Error::NotStarted => Some("Call start() before queueing work."),
            _ => None,
        }
    }

    /// Format the error for logging
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors (for ergonomic error creation)
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an invalid address error
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed message error
    pub fn malformed(reason: MalformedReason) -> Self {
        Error::MalformedMessage { reason }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigNotFound.as_str(), "E100");
        assert_eq!(ErrorCode::SendTimeout.as_str(), "E301");
        assert_eq!(ErrorCode::NotStarted.as_str(), "E500");
        assert_eq!(ErrorCode::FrameTooLarge.to_string(), "E403");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::NotStarted.code(), ErrorCode::NotStarted);
        assert_eq!(
            Error::SendTimeout { timeout_ms: 3000 }.code(),
            ErrorCode::SendTimeout
        );
        assert_eq!(
            Error::invalid_address("nope", "missing port").code(),
            ErrorCode::InvalidAddress
        );
    }

    #[test]
    fn test_unknown_type_is_distinguishable() {
        let unknown = Error::malformed(MalformedReason::UnknownMessageType("Ping".into()));
        let garbage = Error::malformed(MalformedReason::InvalidJson("eof".into()));

        assert!(unknown.is_malformed());
        assert!(garbage.is_malformed());
        assert_eq!(unknown.code(), ErrorCode::ProtocolUnexpected);
        assert_eq!(garbage.code(), ErrorCode::ProtocolMalformed);
        assert!(unknown.to_string().contains("Ping"));
    }

    #[test]
    fn test_error_retryable() {
        assert!(Error::SendTimeout { timeout_ms: 10 }.is_retryable());
        assert!(Error::NotStarted.is_retryable());
        assert!(!Error::AlreadyStarted.is_retryable());
        assert!(!Error::config_not_found("/test").is_retryable());
    }

    #[test]
    fn test_error_fatal() {
        let bind = Error::Bind {
            addr: "0.0.0.0:5555".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(bind.is_fatal());
        assert!(Error::config_field_invalid("node.peers", "bad").is_fatal());
        assert!(!Error::NotStarted.is_fatal());
    }

    #[test]
    fn test_error_suggestions() {
        let err = Error::SendTimeout { timeout_ms: 3000 };
        assert!(err.suggestion().unwrap().contains("peers"));
        assert!(Error::ChannelClosed.suggestion().is_none());
    }

    #[test]
    fn test_format_for_log() {
        let formatted = Error::NotStarted.format_for_log();
        assert_eq!(formatted, "[E500] Queue provider not started");
    }

    /// One of every variant; the exhaustive match fails to compile when a
    /// variant is added without being listed here
    fn every_variant() -> Vec<Error> {
        let samples = vec![
            Error::config_not_found("/etc/peerqueue.toml"),
            Error::ConfigParse {
                message: "expected `]`".into(),
                source: None,
            },
            Error::config_field_invalid("transport.send_timeout_ms", "must be greater than 0"),
            Error::Config("Failed to initialize logging".into()),
            Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "reset")),
            Error::Bind {
                addr: "0.0.0.0:5555".into(),
                source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
            },
            Error::invalid_address("[::1]:7000", "IPv6"),
            Error::SendTimeout { timeout_ms: 3000 },
            Error::ChannelClosed,
            Error::malformed(MalformedReason::InvalidJson("eof".into())),
            Error::FrameTooLarge { len: 10, max: 5 },
            Error::Serialization(serde_json::from_str::<u8>("x").unwrap_err()),
            Error::NotStarted,
            Error::AlreadyStarted,
        ];

        for err in &samples {
            match err {
                Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::Config(_)
                | Error::Io(_)
                | Error::Bind { .. }
                | Error::InvalidAddress { .. }
                | Error::SendTimeout { .. }
                | Error::ChannelClosed
                | Error::MalformedMessage { .. }
                | Error::FrameTooLarge { .. }
                | Error::Serialization(_)
                | Error::NotStarted
                | Error::AlreadyStarted => {}
            }
        }
        samples
    }

    #[test]
    fn test_every_variant_has_a_code_in_range() {
        for err in every_variant() {
            let code = err.code() as u16;
            assert!((100..600).contains(&code), "{:?} has code {}", err, code);
            assert!(
                !(err.is_fatal() && err.is_retryable()),
                "{:?} cannot be both fatal and retryable",
                err
            );
        }
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        assert_eq!(err.code(), ErrorCode::IoNotFound);
    }
}
