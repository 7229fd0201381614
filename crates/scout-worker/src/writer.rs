//! Session writer loop.
//!
//! The writer is the only task that touches the outbound half of the
//! transport. It drains the output queue until told to close.

use std::fmt::Display;
use std::time::Duration;

use futures::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::queue::Outbound;

/// Why the writer loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriterExit {
    /// Close handshake sent and transport closed.
    Closed,
    /// Writing to the transport failed.
    TransportLost,
    /// The exit signal fired.
    Exited,
    /// Every queue handle was dropped.
    QueueClosed,
}

/// Send queued frames until a close request, a write failure or exit.
#[instrument(skip_all)]
pub async fn run_writer<S>(
    mut sink: S,
    mut queue: mpsc::Receiver<Outbound>,
    exit: CancellationToken,
    close_grace: Duration,
) -> WriterExit
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    loop {
        let entry = tokio::select! {
            () = exit.cancelled() => {
                debug!("exit signal, writer stopping");
                return WriterExit::Exited;
            }
            entry = queue.recv() => entry,
        };

        match entry {
            Some(Outbound::Frame(frame)) => {
                let len = frame.len();
                if let Err(e) = sink.send(Message::Binary(frame)).await {
                    warn!(len, error = %e, "write failed");
                    return WriterExit::TransportLost;
                }
            }
            Some(Outbound::Shutdown) => {
                info!("sending close frame");
                let close = Message::Close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "worker shutting down".into(),
                }));
                if let Err(e) = sink.send(close).await {
                    warn!(error = %e, "failed to send close frame");
                    return WriterExit::TransportLost;
                }
                tokio::time::sleep(close_grace).await;
                if let Err(e) = sink.close().await {
                    debug!(error = %e, "transport close failed");
                }
                return WriterExit::Closed;
            }
            None => {
                debug!("all queue handles dropped, writer stopping");
                return WriterExit::QueueClosed;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
