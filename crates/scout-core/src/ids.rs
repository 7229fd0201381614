//! Correlation identifier newtype.
//!
//! The dispatcher assigns a 64-bit correlation id to every request; the
//! worker copies it verbatim onto the matching result. Wrapping it keeps a
//! correlation id from being confused with a status code or a length.

use std::fmt;

/// Identifier linking a `TaskResult` to its originating `TaskRequest`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CorrelationId(i64);

impl CorrelationId {
    /// Correlation id used for messages that answer nothing (registration, leave).
    pub const NONE: Self = Self(0);

    /// Wrap a raw wire value.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw wire value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CorrelationId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<CorrelationId> for i64 {
    fn from(id: CorrelationId) -> Self {
        id.0
    }
}
