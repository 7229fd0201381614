//! Binary codec for envelopes and payloads.
//!
//! Wire format (all integers big-endian):
//!
//! ```text
//! envelope := u32 kind | i64 correlation_id | u32 payload_len | payload
//! int      := i64
//! string   := u32 len | UTF-8 bytes
//! bytes    := u32 len | raw bytes
//! ```
//!
//! The envelope header never depends on the payload schema, so a frame with
//! an unrecognised kind still decodes and can be skipped without
//! desynchronising the stream. Payload schemas live next to their types in
//! [`crate::messages`] as [`Payload`] impls.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::errors::{DecodeError, EncodeError};
use crate::ids::CorrelationId;
use crate::messages::{Envelope, MessageKind};

/// Maximum size of any variable-length field (16 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// `kind` + `correlation_id` + `payload_len`.
const ENVELOPE_HEADER_SIZE: usize = 4 + 8 + 4;

/// A typed payload carried inside an [`Envelope`].
pub trait Payload: Sized {
    /// Envelope kind this payload travels under.
    const KIND: MessageKind;

    /// Append the payload fields to `out`.
    fn write(&self, out: &mut WireWriter) -> Result<(), EncodeError>;

    /// Read the payload fields from `input`. Trailing bytes are checked by the caller.
    fn read(input: &mut WireReader<'_>) -> Result<Self, DecodeError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelope
// ─────────────────────────────────────────────────────────────────────────────

/// Encode an envelope into a single frame.
pub fn encode_envelope(envelope: &Envelope) -> Result<Bytes, EncodeError> {
    let payload_len = checked_len("payload", envelope.payload.len())?;
    let mut buf = BytesMut::with_capacity(ENVELOPE_HEADER_SIZE + envelope.payload.len());
    buf.put_u32(envelope.kind.raw());
    buf.put_i64(envelope.correlation_id.get());
    buf.put_u32(payload_len);
    buf.put_slice(&envelope.payload);
    Ok(buf.freeze())
}

/// Decode a frame into an envelope without interpreting the payload.
pub fn decode_envelope(frame: &[u8]) -> Result<Envelope, DecodeError> {
    let mut input = WireReader::new(frame);
    let kind = MessageKind::from_raw(input.u32("kind")?);
    let correlation_id = CorrelationId::new(input.i64("correlation id")?);
    let payload = Bytes::copy_from_slice(input.bytes("payload")?);
    input.finish("envelope")?;
    Ok(Envelope {
        kind,
        correlation_id,
        payload,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Encode a payload on its own (the bytes that go inside an envelope).
pub fn encode_payload<T: Payload>(payload: &T) -> Result<Bytes, EncodeError> {
    let mut out = WireWriter::new();
    payload.write(&mut out)?;
    Ok(out.finish())
}

/// Decode a payload once the envelope kind is known.
pub fn decode_payload<T: Payload>(bytes: &[u8]) -> Result<T, DecodeError> {
    let mut input = WireReader::new(bytes);
    let value = T::read(&mut input)?;
    input.finish(T::KIND.name())?;
    Ok(value)
}

/// Encode a payload, wrap it in an envelope and encode the envelope.
pub fn encode_message<T: Payload>(
    correlation_id: CorrelationId,
    payload: &T,
) -> Result<Bytes, EncodeError> {
    encode_envelope(&Envelope::wrap(correlation_id, payload)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Field readers / writers
// ─────────────────────────────────────────────────────────────────────────────

/// Append-only field writer used by [`Payload::write`].
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a 64-bit signed integer.
    pub fn put_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    /// Write a length-prefixed byte field.
    pub fn put_bytes(&mut self, field: &'static str, value: &[u8]) -> Result<(), EncodeError> {
        let len = checked_len(field, value.len())?;
        self.buf.put_u32(len);
        self.buf.put_slice(value);
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string field.
    pub fn put_str(&mut self, field: &'static str, value: &str) -> Result<(), EncodeError> {
        self.put_bytes(field, value.as_bytes())
    }

    fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Bounds-checked field reader used by [`Payload::read`].
#[derive(Debug)]
pub struct WireReader<'a> {
    input: &'a [u8],
}

impl<'a> WireReader<'a> {
    /// Start reading `input` from the beginning.
    pub fn new(input: &'a [u8]) -> Self {
        Self { input }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.input.len()
    }

    /// Read a 32-bit unsigned integer.
    pub fn u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        let mut chunk = self.take(field, 4)?;
        Ok(chunk.get_u32())
    }

    /// Read a 64-bit signed integer.
    pub fn i64(&mut self, field: &'static str) -> Result<i64, DecodeError> {
        let mut chunk = self.take(field, 8)?;
        Ok(chunk.get_i64())
    }

    /// Read a length-prefixed byte field.
    pub fn bytes(&mut self, field: &'static str) -> Result<&'a [u8], DecodeError> {
        let declared = self.u32(field)?;
        let len = usize::try_from(declared)
            .ok()
            .filter(|len| *len <= MAX_PAYLOAD_SIZE)
            .ok_or(DecodeError::TooLarge {
                field,
                len: u64::from(declared),
                max: MAX_PAYLOAD_SIZE,
            })?;
        self.take(field, len)
    }

    /// Read a length-prefixed UTF-8 string field.
    pub fn string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let raw = self.bytes(field)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    /// Succeed only if every byte was consumed.
    pub fn finish(self, context: &'static str) -> Result<(), DecodeError> {
        if self.input.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes {
                context,
                count: self.input.len(),
            })
        }
    }

    fn take(&mut self, field: &'static str, needed: usize) -> Result<&'a [u8], DecodeError> {
        if self.input.len() < needed {
            return Err(DecodeError::Truncated {
                field,
                needed,
                remaining: self.input.len(),
            });
        }
        let (head, tail) = self.input.split_at(needed);
        self.input = tail;
        Ok(head)
    }
}

fn checked_len(field: &'static str, len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len)
        .ok()
        .filter(|_| len <= MAX_PAYLOAD_SIZE)
        .ok_or(EncodeError::TooLarge {
            field,
            len,
            max: MAX_PAYLOAD_SIZE,
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
