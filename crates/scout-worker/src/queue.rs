//! Outbound frame queue between producers and the session writer.
//!
//! Producers (task units, the drain sequence) hold cloned [`OutputQueue`]
//! handles; the writer owns the single receiver. Entries are tagged: a close
//! request is [`Outbound::Shutdown`], never an empty frame.

use std::time::{Duration, Instant};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tracing::{debug, warn};

/// One entry consumed by the writer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// An encoded envelope to send as a binary frame.
    Frame(Bytes),
    /// Perform the close handshake and stop.
    Shutdown,
}

/// The writer has stopped and no longer consumes the queue.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("output queue closed")]
pub struct QueueClosed;

/// Multi-producer handle onto the writer's queue.
#[derive(Clone, Debug)]
pub struct OutputQueue {
    tx: mpsc::Sender<Outbound>,
    close_timeout: Duration,
}

impl OutputQueue {
    /// Create a bounded queue and its receiving end.
    ///
    /// `close_timeout` bounds how long [`close`](Self::close) keeps retrying
    /// behind a full queue.
    pub fn new(capacity: usize, close_timeout: Duration) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, close_timeout }, rx)
    }

    /// Enqueue an encoded frame, waiting while the queue is full.
    pub async fn submit(&self, frame: Bytes) -> Result<(), QueueClosed> {
        self.tx
            .send(Outbound::Frame(frame))
            .await
            .map_err(|_| QueueClosed)
    }

    /// Ask the writer to close the connection. Never blocks the caller.
    ///
    /// If the queue is full, the request is retried in the background for
    /// up to the close timeout: on a detached task when called inside a
    /// Tokio runtime, on a short-lived thread otherwise. If the writer is
    /// already gone this is a no-op.
    pub fn close(&self) {
        match self.tx.try_send(Outbound::Shutdown) {
            Ok(()) => debug!("close requested"),
            Err(TrySendError::Full(_)) => {
                debug!("output queue full, deferring close request");
                let tx = self.tx.clone();
                let timeout = self.close_timeout;
                match Handle::try_current() {
                    Ok(handle) => drop(handle.spawn(defer_close(tx, timeout))),
                    Err(_) => drop(std::thread::spawn(move || retry_close_blocking(&tx, timeout))),
                }
            }
            Err(TrySendError::Closed(_)) => debug!("writer already stopped, close is a no-op"),
        }
    }

    /// Whether the writer has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

async fn defer_close(tx: mpsc::Sender<Outbound>, timeout: Duration) {
    match tx.send_timeout(Outbound::Shutdown, timeout).await {
        Ok(()) => debug!("deferred close request enqueued"),
        Err(SendTimeoutError::Timeout(_)) => {
            warn!(?timeout, "timed out enqueueing close request");
        }
        Err(SendTimeoutError::Closed(_)) => {
            debug!("writer stopped before deferred close request");
        }
    }
}

const CLOSE_RETRY_INTERVAL: Duration = Duration::from_millis(10);

fn retry_close_blocking(tx: &mpsc::Sender<Outbound>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    loop {
        match tx.try_send(Outbound::Shutdown) {
            Ok(()) => {
                debug!("deferred close request enqueued");
                return;
            }
            Err(TrySendError::Closed(_)) => {
                debug!("writer stopped before deferred close request");
                return;
            }
            Err(TrySendError::Full(_)) if Instant::now() >= deadline => {
                warn!(?timeout, "timed out enqueueing close request");
                return;
            }
            Err(TrySendError::Full(_)) => std::thread::sleep(CLOSE_RETRY_INTERVAL),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
