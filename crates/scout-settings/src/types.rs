//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a
//! settings file may be partial: missing fields keep their compiled default.

use serde::{Deserialize, Serialize};

/// Root settings type for the scout worker.
///
/// ```json
/// {
///   "session": { "maxConcurrentTasks": 16 },
///   "fetch": { "timeoutMs": 30000 }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoutSettings {
    /// Settings schema version.
    pub version: String,
    /// Dispatcher connection settings.
    pub dispatcher: DispatcherSettings,
    /// Connection session settings.
    pub session: SessionSettings,
    /// Task fetch settings.
    pub fetch: FetchSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl Default for ScoutSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            dispatcher: DispatcherSettings::default(),
            session: SessionSettings::default(),
            fetch: FetchSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Dispatcher connection settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatcherSettings {
    /// Fixed delay between connection attempts, in milliseconds.
    pub reconnect_interval_ms: u64,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: 5_000,
        }
    }
}

/// Connection session settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Delay between sending the close frame and closing the transport.
    pub close_grace_ms: u64,
    /// How long shutdown waits for in-flight tasks.
    pub drain_timeout_ms: u64,
    /// Upper bound on concurrently running tasks (0 = unbounded).
    pub max_concurrent_tasks: usize,
    /// Capacity of the outbound frame queue.
    pub output_queue_capacity: usize,
    /// Bound on enqueueing the close sentinel when the queue is full.
    pub close_enqueue_timeout_ms: u64,
    /// Send a `LeaveRequest` to the dispatcher before the close handshake.
    pub announce_leave: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            close_grace_ms: 1_000,
            drain_timeout_ms: 10_000,
            max_concurrent_tasks: 64,
            output_queue_capacity: 16,
            close_enqueue_timeout_ms: 5_000,
            announce_leave: false,
        }
    }
}

/// Task fetch settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchSettings {
    /// Skip TLS certificate verification of task targets.
    pub accept_invalid_certs: bool,
    /// Per-fetch timeout in milliseconds. `None` imposes no timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// `User-Agent` header sent with each fetch.
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            accept_invalid_certs: true,
            timeout_ms: None,
            user_agent: "scout-worker/0.1".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
