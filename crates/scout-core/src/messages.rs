//! Wire message types.
//!
//! An [`Envelope`] is the unit carried by one binary frame: a
//! [`MessageKind`] tag, a [`CorrelationId`] and an opaque payload. The
//! payload schema depends on the kind and is interpreted only once the
//! receiver knows what it is looking at (see [`Envelope::open`]).

use std::fmt;

use bytes::Bytes;

use crate::codec::{Payload, WireReader, WireWriter, decode_payload, encode_payload};
use crate::errors::{DecodeError, EncodeError};
use crate::ids::CorrelationId;

// ─────────────────────────────────────────────────────────────────────────────
// Kinds
// ─────────────────────────────────────────────────────────────────────────────

/// Envelope discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Dispatcher → worker, once after connect.
    RegistrationOutcome,
    /// Dispatcher → worker, any number of times.
    TaskRequest,
    /// Worker → dispatcher, one per accepted request.
    TaskResult,
    /// Worker → dispatcher, the worker intends to leave.
    LeaveRequest,
    /// Dispatcher → worker, acknowledges a leave.
    LeaveResponse,
    /// A kind this build does not know. Carries the raw wire value.
    Unknown(u32),
}

impl MessageKind {
    /// Map a raw wire value to a kind. Never fails.
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::RegistrationOutcome,
            1 => Self::TaskRequest,
            2 => Self::TaskResult,
            3 => Self::LeaveRequest,
            4 => Self::LeaveResponse,
            other => Self::Unknown(other),
        }
    }

    /// The raw wire value.
    pub const fn raw(self) -> u32 {
        match self {
            Self::RegistrationOutcome => 0,
            Self::TaskRequest => 1,
            Self::TaskResult => 2,
            Self::LeaveRequest => 3,
            Self::LeaveResponse => 4,
            Self::Unknown(raw) => raw,
        }
    }

    /// Static name for known kinds, `"Unknown"` otherwise.
    pub const fn name(self) -> &'static str {
        match self {
            Self::RegistrationOutcome => "RegistrationOutcome",
            Self::TaskRequest => "TaskRequest",
            Self::TaskResult => "TaskResult",
            Self::LeaveRequest => "LeaveRequest",
            Self::LeaveResponse => "LeaveResponse",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(raw) => write!(f, "Unknown({raw})"),
            known => f.write_str(known.name()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelope
// ─────────────────────────────────────────────────────────────────────────────

/// The outer tagged union carried by every frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Payload discriminant.
    pub kind: MessageKind,
    /// Request/response pairing id.
    pub correlation_id: CorrelationId,
    /// Encoded payload; schema depends on `kind`.
    pub payload: Bytes,
}

impl Envelope {
    /// Build an envelope from already-encoded payload bytes.
    pub fn new(kind: MessageKind, correlation_id: CorrelationId, payload: Bytes) -> Self {
        Self {
            kind,
            correlation_id,
            payload,
        }
    }

    /// Encode `payload` and wrap it under its own kind.
    pub fn wrap<T: Payload>(
        correlation_id: CorrelationId,
        payload: &T,
    ) -> Result<Self, EncodeError> {
        Ok(Self::new(T::KIND, correlation_id, encode_payload(payload)?))
    }

    /// Decode the payload as `T`, checking that the kind matches.
    pub fn open<T: Payload>(&self) -> Result<T, DecodeError> {
        if self.kind != T::KIND {
            return Err(DecodeError::KindMismatch {
                expected: T::KIND,
                actual: self.kind,
            });
        }
        decode_payload(&self.payload)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Sent once by the dispatcher after connect. Code 0 accepts the worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationOutcome {
    /// 0 = accepted, anything else = rejected.
    pub code: i64,
    /// Human-readable reason.
    pub description: String,
}

impl RegistrationOutcome {
    /// Whether the dispatcher accepted this worker.
    pub fn is_accepted(&self) -> bool {
        self.code == 0
    }
}

impl Payload for RegistrationOutcome {
    const KIND: MessageKind = MessageKind::RegistrationOutcome;

    fn write(&self, out: &mut WireWriter) -> Result<(), EncodeError> {
        out.put_i64(self.code);
        out.put_str("description", &self.description)
    }

    fn read(input: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            code: input.i64("code")?,
            description: input.string("description")?,
        })
    }
}

/// A unit of work: fetch the resource at `target_url`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskRequest {
    /// Resource locator to fetch.
    pub target_url: String,
}

impl TaskRequest {
    /// Build a request for `target_url`.
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
        }
    }
}

impl Payload for TaskRequest {
    const KIND: MessageKind = MessageKind::TaskRequest;

    fn write(&self, out: &mut WireWriter) -> Result<(), EncodeError> {
        out.put_str("target url", &self.target_url)
    }

    fn read(input: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            target_url: input.string("target url")?,
        })
    }
}

/// Outcome of a task, from a closed set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Fetched and read the full body.
    Success,
    /// Could not reach the target.
    FailedToAccessTarget,
    /// Reached the target but could not read the body.
    FailedToReadResponse,
}

impl TaskStatus {
    /// Wire code.
    pub const fn code(self) -> i64 {
        match self {
            Self::Success => 0,
            Self::FailedToAccessTarget => 1,
            Self::FailedToReadResponse => 2,
        }
    }

    /// Parse a wire code.
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::FailedToAccessTarget),
            2 => Some(Self::FailedToReadResponse),
            _ => None,
        }
    }
}

/// Longest target URL quoted in a failure description, in bytes.
pub const MAX_DESCRIBED_URL: usize = 2048;

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Result of one task. The correlation id travels on the envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskResult {
    /// Raw fetched body (empty on failure).
    pub result: Bytes,
    /// Outcome code.
    pub status: TaskStatus,
    /// Human-readable outcome.
    pub description: String,
}

impl TaskResult {
    /// A successful fetch carrying `body`.
    pub fn success(body: Bytes) -> Self {
        Self {
            result: body,
            status: TaskStatus::Success,
            description: "OK".into(),
        }
    }

    /// The target could not be reached. URLs longer than
    /// [`MAX_DESCRIBED_URL`] bytes are cut short and marked with `...`.
    pub fn failed_to_access(target_url: &str) -> Self {
        let described = truncate_at_char_boundary(target_url, MAX_DESCRIBED_URL);
        let ellipsis = if described.len() < target_url.len() { "..." } else { "" };
        Self {
            result: Bytes::new(),
            status: TaskStatus::FailedToAccessTarget,
            description: format!("Failed to access url: {described}{ellipsis}"),
        }
    }

    /// The response body could not be read.
    pub fn failed_to_read() -> Self {
        Self {
            result: Bytes::new(),
            status: TaskStatus::FailedToReadResponse,
            description: "Failed to read from http response".into(),
        }
    }
}

impl Payload for TaskResult {
    const KIND: MessageKind = MessageKind::TaskResult;

    fn write(&self, out: &mut WireWriter) -> Result<(), EncodeError> {
        out.put_bytes("result", &self.result)?;
        out.put_i64(self.status.code());
        out.put_str("description", &self.description)
    }

    fn read(input: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        let result = Bytes::copy_from_slice(input.bytes("result")?);
        let code = input.i64("status code")?;
        let status = TaskStatus::from_code(code).ok_or(DecodeError::UnknownStatus(code))?;
        let description = input.string("description")?;
        Ok(Self {
            result,
            status,
            description,
        })
    }
}

/// The worker wants to leave. Empty payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LeaveRequest;

impl Payload for LeaveRequest {
    const KIND: MessageKind = MessageKind::LeaveRequest;

    fn write(&self, _out: &mut WireWriter) -> Result<(), EncodeError> {
        Ok(())
    }

    fn read(_input: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self)
    }
}

/// The dispatcher acknowledged a leave. Empty payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LeaveResponse;

impl Payload for LeaveResponse {
    const KIND: MessageKind = MessageKind::LeaveResponse;

    fn write(&self, _out: &mut WireWriter) -> Result<(), EncodeError> {
        Ok(())
    }

    fn read(_input: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
