//! Session lifecycle state.

use std::fmt;

/// Lifecycle of one connection. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    /// Connected, waiting for the registration outcome.
    Connecting,
    /// Registered and accepting tasks.
    Active,
    /// Reads disabled, waiting for in-flight tasks.
    Draining,
    /// Writer finished and exit signal fired.
    Closed,
}

impl SessionState {
    /// Whether moving from `self` to `next` is allowed.
    pub fn can_advance_to(self, next: Self) -> bool {
        next > self
    }

    /// Lowercase label for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Draining => "draining",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
