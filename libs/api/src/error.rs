/// Category of an event error. Lets the event loop decide between
/// skipping a message, failing a call, or stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Absence value or wrongly typed value where a record is required.
    InvalidArgument,
    /// Field position outside the record's field table.
    OutOfRange,
    /// Broker or network error, transient: the loop keeps going.
    Transport,
    /// Payload could not be decoded: bad input, skip the message.
    Format,
    /// Publish rejected by the broker or by the schema.
    Delivery,
    /// Invalid configuration: permanent, fail at startup.
    Config,
    /// Logical error (not found, invalid state, generic).
    Logic,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidArgument => f.write_str("invalid_argument"),
            ErrorKind::OutOfRange => f.write_str("out_of_range"),
            ErrorKind::Transport => f.write_str("transport"),
            ErrorKind::Format => f.write_str("format"),
            ErrorKind::Delivery => f.write_str("delivery"),
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Logic => f.write_str("logic"),
        }
    }
}

/// Unified error type for producer, handler, codec and transport calls.
///
/// Carries an `ErrorKind` for categorization and a human-readable message.
/// `From` impls assign the appropriate kind automatically so `?` works
/// across the crates.
#[derive(Clone, PartialEq, Eq)]
pub struct EventError {
    kind: ErrorKind,
    message: String,
}

impl EventError {
    /// Generic logic error (default kind).
    pub fn new(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Logic, message: msg.into() }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::InvalidArgument, message: msg.into() }
    }

    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::OutOfRange, message: msg.into() }
    }

    /// Transport error, transient.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Transport, message: msg.into() }
    }

    /// Format/parse error: bad input, skip the message.
    pub fn format_err(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Format, message: msg.into() }
    }

    pub fn delivery(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Delivery, message: msg.into() }
    }

    /// Configuration error: permanent, fail at startup.
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Debug for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EventError {}

impl From<String> for EventError {
    fn from(s: String) -> Self { Self { kind: ErrorKind::Logic, message: s } }
}

impl From<&str> for EventError {
    fn from(s: &str) -> Self { Self { kind: ErrorKind::Logic, message: s.to_string() } }
}

impl From<std::io::Error> for EventError {
    fn from(e: std::io::Error) -> Self { Self { kind: ErrorKind::Transport, message: e.to_string() } }
}

impl From<serde_json::Error> for EventError {
    fn from(e: serde_json::Error) -> Self { Self { kind: ErrorKind::Format, message: e.to_string() } }
}

impl From<std::string::FromUtf8Error> for EventError {
    fn from(e: std::string::FromUtf8Error) -> Self { Self { kind: ErrorKind::Format, message: e.to_string() } }
}
