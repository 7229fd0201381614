//! Routing of inbound frames.
//!
//! Routing is pure apart from logging: it decides what the reader does next
//! and leaves the side effects (spawning, firing exit) to the reader loop.

use scout_core::{
    CorrelationId, Envelope, LeaveResponse, MessageKind, RegistrationOutcome, TaskRequest,
    decode_envelope,
};
use tracing::{debug, error, info, warn};

/// What the reader does with one inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Nothing to do; keep reading.
    Continue,
    /// The dispatcher accepted this worker.
    Registered,
    /// The dispatcher refused this worker.
    Rejected(RegistrationOutcome),
    /// Run a task and answer under `correlation_id`.
    Task {
        /// Id to echo on the result.
        correlation_id: CorrelationId,
        /// What to fetch.
        request: TaskRequest,
    },
}

/// Decode and route one binary frame.
pub fn route_frame(frame: &[u8]) -> Flow {
    match decode_envelope(frame) {
        Ok(envelope) => route(&envelope),
        Err(e) => {
            warn!(len = frame.len(), error = %e, "dropping undecodable frame");
            Flow::Continue
        }
    }
}

/// Route a decoded envelope by kind.
pub fn route(envelope: &Envelope) -> Flow {
    let correlation_id = envelope.correlation_id;
    match envelope.kind {
        MessageKind::RegistrationOutcome => match envelope.open::<RegistrationOutcome>() {
            Ok(outcome) if outcome.is_accepted() => {
                info!("registered with dispatcher");
                Flow::Registered
            }
            Ok(outcome) => {
                error!(
                    code = outcome.code,
                    description = %outcome.description,
                    "dispatcher rejected registration"
                );
                Flow::Rejected(outcome)
            }
            Err(e) => {
                warn!(error = %e, "dropping undecodable registration outcome");
                Flow::Continue
            }
        },
        MessageKind::TaskRequest => match envelope.open::<TaskRequest>() {
            Ok(request) => Flow::Task {
                correlation_id,
                request,
            },
            Err(e) => {
                warn!(%correlation_id, error = %e, "dropping undecodable task request");
                Flow::Continue
            }
        },
        MessageKind::LeaveResponse => {
            match envelope.open::<LeaveResponse>() {
                Ok(LeaveResponse) => info!("dispatcher acknowledged leave"),
                Err(e) => warn!(error = %e, "dropping undecodable leave response"),
            }
            Flow::Continue
        }
        kind @ (MessageKind::TaskResult | MessageKind::LeaveRequest) => {
            debug!(%kind, %correlation_id, "ignoring message not meant for a worker");
            Flow::Continue
        }
        MessageKind::Unknown(raw) => {
            warn!(kind = raw, %correlation_id, "ignoring message of unknown kind");
            Flow::Continue
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
