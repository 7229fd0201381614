//! # scout-core
//!
//! Foundation types for the scout worker agent.
//!
//! - **Correlation IDs**: [`ids::CorrelationId`] pairs a task result with its request
//! - **Messages**: the [`messages::Envelope`] tagged union and its typed payloads
//! - **Codec**: strict, panic-free binary encoding of envelopes and payloads
//! - **Errors**: [`errors::DecodeError`] / [`errors::EncodeError`] via `thiserror`
//! - **Logging**: `tracing` subscriber setup and an in-memory capture layer for tests

#![deny(unsafe_code)]

pub mod codec;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod messages;

pub use codec::{
    MAX_PAYLOAD_SIZE, Payload, decode_envelope, decode_payload, encode_envelope, encode_message,
    encode_payload,
};
pub use errors::{DecodeError, EncodeError};
pub use ids::CorrelationId;
pub use messages::{
    Envelope, LeaveRequest, LeaveResponse, MAX_DESCRIBED_URL, MessageKind, RegistrationOutcome,
    TaskRequest, TaskResult, TaskStatus,
};
