//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when building, encoding or decoding HCI frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Leading byte does not match the requested frame kind.
    #[error("frame kind mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    TypeKindMismatch {
        /// Frame kind the caller asked for.
        expected: u8,
        /// Frame kind found in the header.
        actual: u8,
    },

    /// Leading byte is not a known frame kind.
    #[error("malformed header: unknown frame kind 0x{0:02X}")]
    MalformedHeader(u8),

    /// Frame is too short to be valid.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Declared parameter length disagrees with the bytes present.
    #[error("parameter length mismatch: header declares {declared} bytes, frame carries {actual}")]
    LengthMismatch {
        /// Length from the header.
        declared: usize,
        /// Parameter bytes actually present.
        actual: usize,
    },

    /// Parameters do not fit in the one-byte length field.
    #[error("parameters too long: maximum {max} bytes, got {actual}")]
    ParamsTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length.
        actual: usize,
    },

    /// Values do not line up with the field layout.
    #[error("layout mismatch at field {index}: {reason}")]
    LayoutMismatch {
        /// Index of the offending field.
        index: usize,
        /// What went wrong.
        reason: String,
    },

    /// Format string could not be parsed into a layout.
    #[error("invalid layout format {format:?}: {reason}")]
    InvalidFormat {
        /// The format string.
        format: String,
        /// What went wrong.
        reason: String,
    },

    /// Event code is not in the core table.
    #[error("unknown event code: 0x{0:02X}")]
    UnknownEventCode(u8),

    /// LE meta event with an unregistered (or missing) sub-event code.
    #[error("unknown LE sub-event: {}", .0.map(|c| format!("0x{:02X}", c)).unwrap_or_else(|| "<missing>".to_string()))]
    UnknownSubEvent(Option<u8>),
}
