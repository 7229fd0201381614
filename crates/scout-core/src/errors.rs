//! Codec error types.
//!
//! Decoding is strict: every malformed input maps to a [`DecodeError`]
//! variant, never a panic. Callers on the read path log the error and drop
//! the frame. An [`EncodeError`] on the write path means an outgoing value
//! does not fit the wire format.

use thiserror::Error;

use crate::messages::MessageKind;

/// Failure to decode an envelope or payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The input ended before a field was complete.
    #[error("truncated {field}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Field being read.
        field: &'static str,
        /// Bytes the field requires.
        needed: usize,
        /// Bytes left in the input.
        remaining: usize,
    },
    /// A length prefix exceeds the maximum payload size.
    #[error("{field} length {len} exceeds maximum {max}")]
    TooLarge {
        /// Field whose length prefix is too large.
        field: &'static str,
        /// Declared length.
        len: u64,
        /// Maximum accepted length.
        max: usize,
    },
    /// Bytes remain after a complete value was read.
    #[error("{count} trailing bytes after {context}")]
    TrailingBytes {
        /// What was being decoded.
        context: &'static str,
        /// Number of unread bytes.
        count: usize,
    },
    /// A string field is not valid UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 {
        /// Field holding the invalid string.
        field: &'static str,
    },
    /// A task status code outside the closed enumeration.
    #[error("unknown task status code {0}")]
    UnknownStatus(i64),
    /// The envelope kind does not match the requested payload type.
    #[error("expected {expected} payload, envelope carries {actual}")]
    KindMismatch {
        /// Kind the caller asked for.
        expected: MessageKind,
        /// Kind on the envelope.
        actual: MessageKind,
    },
}

/// Failure to encode an outgoing value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// A variable-length field does not fit the wire length prefix.
    #[error("{field} length {len} exceeds maximum {max}")]
    TooLarge {
        /// Field that is too large.
        field: &'static str,
        /// Actual length.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
