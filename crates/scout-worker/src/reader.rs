//! Session reader loop.

use std::fmt::Display;

use futures::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, warn};

use crate::dispatch::{Flow, route_frame};
use crate::executor::TaskExecutor;
use crate::gate::AdmissionGate;
use crate::shutdown::ShutdownCoordinator;
use crate::state::SessionState;

/// Why the reader loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderExit {
    /// The transport failed or the dispatcher ended the stream.
    TransportLost,
    /// Reads were disabled.
    Disabled,
    /// The exit signal fired.
    Exit,
    /// The dispatcher refused registration.
    Rejected,
}

/// Everything the reader needs besides the inbound stream.
#[derive(Clone)]
pub struct ReaderContext {
    /// Runs accepted task requests.
    pub executor: TaskExecutor,
    /// Bounds concurrent tasks.
    pub gate: AdmissionGate,
    /// Signals and session state.
    pub shutdown: ShutdownCoordinator,
}

/// Read frames until the transport ends or the session stops reading.
///
/// Each read races the disable-reads and exit signals, and the disable flag
/// is checked again after a frame arrives, so no frame is dispatched after
/// reads were disabled.
#[instrument(skip_all)]
pub async fn run_reader<S, E>(mut stream: S, ctx: &ReaderContext) -> ReaderExit
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let reads = ctx.shutdown.reads_signal();
    let exit = ctx.shutdown.exit_signal();

    loop {
        let next = tokio::select! {
            biased;
            () = reads.cancelled() => return ReaderExit::Disabled,
            () = exit.cancelled() => return ReaderExit::Exit,
            next = stream.next() => next,
        };

        if reads.is_cancelled() {
            debug!("reads disabled, discarding frame");
            return ReaderExit::Disabled;
        }

        let data = match next {
            None => {
                info!("dispatcher closed the connection");
                return ReaderExit::TransportLost;
            }
            Some(Err(e)) => {
                warn!(error = %e, "read failed");
                return ReaderExit::TransportLost;
            }
            Some(Ok(Message::Binary(data))) => data,
            Some(Ok(Message::Close(frame))) => {
                info!(?frame, "dispatcher sent close frame");
                continue;
            }
            Some(Ok(other)) => {
                debug!(len = other.len(), "ignoring non-binary frame");
                continue;
            }
        };

        match route_frame(&data) {
            Flow::Continue => {}
            Flow::Registered => {
                let _ = ctx.shutdown.advance(SessionState::Active);
            }
            Flow::Rejected(_) => {
                ctx.shutdown.fire_exit();
                return ReaderExit::Rejected;
            }
            Flow::Task {
                correlation_id,
                request,
            } => {
                let admission = tokio::select! {
                    biased;
                    () = reads.cancelled() => {
                        warn!(
                            %correlation_id,
                            "reads disabled while waiting for a task slot, request dropped"
                        );
                        return ReaderExit::Disabled;
                    }
                    () = exit.cancelled() => return ReaderExit::Exit,
                    admission = ctx.gate.admit() => admission,
                };
                let Some(admission) = admission else {
                    warn!(%correlation_id, "admission closed, request dropped");
                    return ReaderExit::Disabled;
                };
                drop(ctx.executor.spawn(correlation_id, request, admission));
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
