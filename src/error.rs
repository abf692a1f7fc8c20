//! Error types for setu-link

use std::time::Duration;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error returned by an application message handler.
///
/// Handler errors never leave the dispatcher; they are logged and counted.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// setu-link error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No message spec is registered for this tag
    #[error("Unknown message tag: {0}")]
    UnknownTag(u16),

    /// Payload length does not match the fixed size of the tag's layout
    #[error("Layout mismatch for tag {tag}: expected {expected} bytes, got {actual}")]
    LayoutMismatch {
        /// Message tag
        tag: u16,
        /// Fixed size declared by the layout table
        expected: usize,
        /// Length actually received
        actual: usize,
    },

    /// A field value does not fit the wire width of the active layout
    #[error("Value {value} out of range for field '{field}'")]
    FieldOutOfRange {
        /// Field name from the layout table
        field: &'static str,
        /// Offending value
        value: i64,
    },

    /// Integer value supplied for a float field or the reverse
    #[error("Type mismatch for field '{field}'")]
    FieldTypeMismatch {
        /// Field name from the layout table
        field: &'static str,
    },

    /// The active layout declares a field the message does not carry
    #[error("Message with tag {tag} is missing field '{field}' required by the active layout")]
    MissingField {
        /// Message tag
        tag: u16,
        /// Field name from the layout table
        field: &'static str,
    },

    /// The message carries a field the active layout does not declare
    #[error("Field '{field}' is not part of the active layout for tag {tag}")]
    UnexpectedField {
        /// Message tag
        tag: u16,
        /// Field name carried by the message
        field: &'static str,
    },

    /// Two specs in one catalog share a tag
    #[error("Duplicate message tag in catalog: {0}")]
    DuplicateTag(u16),

    /// A handler is already registered for this tag
    #[error("Handler already registered for tag {0}")]
    AlreadyRegistered(u16),

    /// Malformed transport frame
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Malformed device URI
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// URI scheme other than `serial`
    #[error("Unsupported URI scheme: {0}")]
    UnsupportedScheme(String),

    /// No inbound message arrived before the configured handshake timeout
    #[error("No message from controller within {0:?}")]
    HandshakeTimeout(Duration),

    /// A pending acknowledgement was replaced by a newer request with the same id
    #[error("Acknowledgement for frame {0} superseded")]
    AckSuperseded(u32),

    /// The link has been shut down
    #[error("Link disconnected")]
    Disconnected,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("Config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// A worker thread panicked
    #[error("Thread panic")]
    ThreadPanic,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
