//! One connection session with the dispatcher.
//!
//! [`Session::run`] splits the transport, spawns the writer, runs the reader
//! on the calling task and, once the reader stops for any reason, drains:
//!
//! 1. state `Draining`, disable reads
//! 2. wait (bounded) for in-flight tasks so their results precede the close
//! 3. optionally announce the leave to the dispatcher
//! 4. enqueue the close request
//! 5. wait (bounded) for the writer, fire exit, state `Closed`

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, Stream, StreamExt};
use scout_core::{CorrelationId, LeaveRequest};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use crate::config::SessionConfig;
use crate::executor::{TaskExecutor, encode_or_abort};
use crate::fetch::Fetcher;
use crate::gate::AdmissionGate;
use crate::queue::{Outbound, OutputQueue};
use crate::reader::{ReaderContext, ReaderExit, run_reader};
use crate::shutdown::ShutdownCoordinator;
use crate::state::SessionState;
use crate::writer::{WriterExit, run_writer};

/// Extra time allowed for the writer beyond the close grace period.
pub const WRITER_SETTLE: Duration = Duration::from_secs(2);

/// How a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Orderly shutdown was requested.
    Shutdown,
    /// The dispatcher refused registration.
    Rejected,
    /// The transport failed; reconnecting may help.
    TransportLost,
}

/// Summary returned by [`Session::run`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionReport {
    /// How the session ended.
    pub outcome: SessionOutcome,
    /// Whether every task finished before the drain timeout.
    pub tasks_drained: bool,
    /// How the writer stopped.
    pub writer: WriterExit,
}

/// A session over one established connection.
pub struct Session {
    config: SessionConfig,
    shutdown: ShutdownCoordinator,
    queue: OutputQueue,
    outbound: mpsc::Receiver<Outbound>,
    reader: ReaderContext,
}

impl Session {
    /// Create a session. Nothing runs until [`run`](Self::run).
    pub fn new(config: SessionConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let (queue, outbound) =
            OutputQueue::new(config.output_queue_capacity, config.close_enqueue_timeout);
        let tracker = TaskTracker::new();
        let shutdown = ShutdownCoordinator::new(queue.clone(), tracker.clone());
        let reader = ReaderContext {
            executor: TaskExecutor::new(fetcher, queue.clone(), tracker),
            gate: AdmissionGate::new(config.max_concurrent_tasks),
            shutdown: shutdown.clone(),
        };
        Self {
            config,
            shutdown,
            queue,
            outbound,
            reader,
        }
    }

    /// Handle for requesting shutdown from outside the session.
    pub fn shutdown_handle(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shutdown.subscribe_state()
    }

    /// Run the session over `transport` until it is closed.
    #[instrument(skip_all)]
    pub async fn run<T, E>(self, transport: T) -> SessionReport
    where
        T: Stream<Item = Result<Message, E>> + Sink<Message, Error = E> + Send + 'static,
        E: Display + Send + 'static,
    {
        let Self {
            config,
            shutdown,
            queue,
            outbound,
            reader,
        } = self;

        let (sink, stream) = transport.split();
        let mut writer = tokio::spawn(run_writer(
            sink,
            outbound,
            shutdown.exit_signal(),
            config.close_grace,
        ));

        let mut writer_exit = None;
        let reader_exit = tokio::select! {
            exit = run_reader(stream, &reader) => exit,
            joined = &mut writer => {
                let exit = writer_result(joined);
                writer_exit = Some(exit);
                match exit {
                    WriterExit::Closed => ReaderExit::Disabled,
                    WriterExit::Exited => ReaderExit::Exit,
                    WriterExit::TransportLost | WriterExit::QueueClosed => {
                        warn!(?exit, "writer stopped before reader");
                        ReaderExit::TransportLost
                    }
                }
            }
        };
        debug!(?reader_exit, "reader stopped");

        let outcome = match reader_exit {
            ReaderExit::Rejected => SessionOutcome::Rejected,
            ReaderExit::TransportLost => SessionOutcome::TransportLost,
            ReaderExit::Disabled | ReaderExit::Exit => SessionOutcome::Shutdown,
        };

        // ── Drain ───────────────────────────────────────────────────
        let _ = shutdown.advance(SessionState::Draining);
        shutdown.disable_reads();
        reader.gate.close();

        let tasks_drained = shutdown.wait_tasks_done(config.drain_timeout).await;

        if config.announce_leave && !shutdown.is_exiting() && writer_exit.is_none() {
            announce_leave(&queue, config.close_enqueue_timeout).await;
        }

        shutdown.close();

        let writer = match writer_exit {
            Some(exit) => exit,
            None => await_writer(&mut writer, config.close_grace + WRITER_SETTLE).await,
        };

        shutdown.fire_exit();
        let _ = shutdown.advance(SessionState::Closed);
        info!(?outcome, tasks_drained, ?writer, "session closed");

        SessionReport {
            outcome,
            tasks_drained,
            writer,
        }
    }
}

async fn announce_leave(queue: &OutputQueue, timeout: Duration) {
    let frame = encode_or_abort(CorrelationId::NONE, &LeaveRequest);
    match tokio::time::timeout(timeout, queue.submit(frame)).await {
        Ok(Ok(())) => debug!("leave request enqueued"),
        Ok(Err(e)) => debug!(error = %e, "leave request not sent"),
        Err(_) => warn!(?timeout, "timed out enqueueing leave request"),
    }
}

async fn await_writer(writer: &mut JoinHandle<WriterExit>, bound: Duration) -> WriterExit {
    match tokio::time::timeout(bound, &mut *writer).await {
        Ok(joined) => writer_result(joined),
        Err(_) => {
            warn!(?bound, "writer did not finish in time, aborting it");
            writer.abort();
            WriterExit::Exited
        }
    }
}

fn writer_result(joined: Result<WriterExit, JoinError>) -> WriterExit {
    joined.unwrap_or_else(|e| {
        error!(error = %e, "writer task failed");
        WriterExit::TransportLost
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
