//! Graceful shutdown coordination via `CancellationToken`.
//!
//! A session has two one-shot signals:
//!
//! - **disable reads**: the reader stops pulling frames (a pending read is
//!   interrupted)
//! - **exit**: every loop of the session stops immediately
//!
//! Tasks are never cancelled. Shutdown waits for them up to a bound and then
//! proceeds.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::queue::OutputQueue;
use crate::state::SessionState;

/// Coordinates shutdown of one session. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ShutdownCoordinator {
    exit: CancellationToken,
    reads: CancellationToken,
    tracker: TaskTracker,
    queue: OutputQueue,
    state: Arc<watch::Sender<SessionState>>,
}

impl ShutdownCoordinator {
    /// Create a coordinator over the session's queue and task tracker.
    pub fn new(queue: OutputQueue, tracker: TaskTracker) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            exit: CancellationToken::new(),
            reads: CancellationToken::new(),
            tracker,
            queue,
            state: Arc::new(state),
        }
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Stop the reader. Idempotent.
    pub fn disable_reads(&self) {
        if !self.reads.is_cancelled() {
            debug!("disabling reads");
        }
        self.reads.cancel();
    }

    /// Whether reads have been disabled.
    pub fn is_reads_disabled(&self) -> bool {
        self.reads.is_cancelled()
    }

    /// Token cancelled when reads are disabled.
    pub fn reads_signal(&self) -> CancellationToken {
        self.reads.clone()
    }

    // ── Close / drain ───────────────────────────────────────────────

    /// Ask the writer to perform the close handshake. Never blocks.
    pub fn close(&self) {
        self.queue.close();
    }

    /// Wait for in-flight tasks to finish.
    ///
    /// Returns `true` if none remain before `timeout` elapses. Tasks still
    /// running after the timeout keep running.
    pub async fn wait_tasks_done(&self, timeout: Duration) -> bool {
        let _ = self.tracker.close();
        let in_flight = self.tracker.len();
        if in_flight > 0 {
            info!(in_flight, ?timeout, "waiting for in-flight tasks");
        }
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok() {
            true
        } else {
            warn!(
                in_flight = self.tracker.len(),
                "drain timed out after {timeout:?}, tasks still running"
            );
            false
        }
    }

    // ── Exit ────────────────────────────────────────────────────────

    /// Fire the exit signal. Idempotent.
    pub fn fire_exit(&self) {
        self.exit.cancel();
    }

    /// Whether the exit signal has fired.
    pub fn is_exiting(&self) -> bool {
        self.exit.is_cancelled()
    }

    /// Token cancelled when the exit signal fires.
    pub fn exit_signal(&self) -> CancellationToken {
        self.exit.clone()
    }

    // ── External requests ───────────────────────────────────────────

    /// Begin an orderly shutdown from outside the session.
    ///
    /// Moves the session to `Draining` and disables reads; the session then
    /// drains tasks and closes the connection.
    pub fn request_shutdown(&self) {
        if self.advance(SessionState::Draining) {
            info!("shutdown requested");
        }
        self.disable_reads();
    }

    // ── State ───────────────────────────────────────────────────────

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Move forward to `next`. Returns `false` if `next` is not ahead of the
    /// current state.
    pub(crate) fn advance(&self, next: SessionState) -> bool {
        let advanced = self.state.send_if_modified(|current| {
            if current.can_advance_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });
        if advanced {
            debug!(state = %next, "session state changed");
        }
        advanced
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
