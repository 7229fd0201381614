//! Runtime session configuration.

use std::time::Duration;

use scout_settings::SessionSettings;

/// Timing and capacity knobs for one [`Session`](crate::Session).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Pause between sending the close frame and closing the transport.
    pub close_grace: Duration,
    /// Upper bound on waiting for in-flight tasks during shutdown.
    pub drain_timeout: Duration,
    /// Concurrent task limit. `0` disables admission control.
    pub max_concurrent_tasks: usize,
    /// Output queue capacity (at least 1).
    pub output_queue_capacity: usize,
    /// Upper bound on enqueueing the close sentinel behind a full queue.
    pub close_enqueue_timeout: Duration,
    /// Send a `LeaveRequest` before closing.
    pub announce_leave: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_settings(&SessionSettings::default())
    }
}

impl SessionConfig {
    /// Build from loaded settings.
    ///
    /// A queue capacity of 0 is raised to 1 since a rendezvous queue cannot
    /// hold the close sentinel.
    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self {
            close_grace: Duration::from_millis(settings.close_grace_ms),
            drain_timeout: Duration::from_millis(settings.drain_timeout_ms),
            max_concurrent_tasks: settings.max_concurrent_tasks,
            output_queue_capacity: settings.output_queue_capacity.max(1),
            close_enqueue_timeout: Duration::from_millis(settings.close_enqueue_timeout_ms),
            announce_leave: settings.announce_leave,
        }
    }
}
