//! The channel engine.
//!
//! Walks a payload as CHANNEL -> DECODE -> CHANNEL: read a byte-aligned
//! selector, look it up in the channel map, run the channel's schema, emit
//! the ordered value vector as an event, realign, repeat. The engine has no
//! embedded processors; the caller consumes the event list in payload order
//! and is free to commit state per event, which is what keeps partially
//! decoded payloads meaningful.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::bits::{BitCursor, BitWriter};
use crate::error::{CodecError, Result};
use crate::primitive::{self, Value};
use crate::schema::Schema;

/// A registered channel: a stable name for diagnostics plus the schema the
/// engine runs when the selector appears on the wire.
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub name: &'static str,
    pub schema: Schema,
}

/// One decoded channel occurrence, in payload order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub channel: u8,
    pub values: Vec<Value>,
}

/// A failed decode, carrying everything that decoded cleanly before the
/// failure so the caller can still commit it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeFailure {
    pub error: CodecError,
    pub decoded: Vec<ChannelEvent>,
}

/// Channel map plus the interpreter over it.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    channels: BTreeMap<u8, ChannelSpec>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel schema. Later registrations replace earlier ones.
    pub fn register(&mut self, channel: u8, name: &'static str, schema: Schema) {
        self.channels.insert(channel, ChannelSpec { name, schema });
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_channel(mut self, channel: u8, name: &'static str, schema: Schema) -> Self {
        self.register(channel, name, schema);
        self
    }

    pub fn channel_name(&self, channel: u8) -> Option<&'static str> {
        self.channels.get(&channel).map(|c| c.name)
    }

    /// Decode a whole payload into channel events.
    ///
    /// On failure the events decoded before the failing channel are returned
    /// inside the [`DecodeFailure`]; the failing channel itself contributes
    /// nothing.
    pub fn decode(&self, payload: &Bytes) -> std::result::Result<Vec<ChannelEvent>, DecodeFailure> {
        let mut cur = BitCursor::new(payload);
        let mut events = Vec::new();

        while !cur.at_end() {
            match self.decode_channel(&mut cur, payload) {
                Ok(event) => {
                    events.push(event);
                    cur.align();
                }
                Err(error) => {
                    return Err(DecodeFailure {
                        error,
                        decoded: events,
                    })
                }
            }
        }
        Ok(events)
    }

    fn decode_channel(&self, cur: &mut BitCursor<'_>, payload: &Bytes) -> Result<ChannelEvent> {
        cur.require_aligned()?;
        let channel = cur.read_u8()?;
        let spec = self
            .channels
            .get(&channel)
            .ok_or(CodecError::ChannelNotFound(channel))?;

        let mut values = Vec::with_capacity(spec.schema.primitive_count());
        spec.schema.for_each_primitive(&mut |prim| {
            values.push(primitive::decode(prim, cur, payload)?);
            Ok(())
        })?;
        Ok(ChannelEvent { channel, values })
    }

    /// Encode one channel frame: selector byte, fields in schema order, then
    /// zero-bit padding to the next byte boundary.
    pub fn encode(&self, channel: u8, values: &[Value]) -> Result<Vec<u8>> {
        let spec = self
            .channels
            .get(&channel)
            .ok_or(CodecError::ChannelNotFound(channel))?;

        let expected = spec.schema.primitive_count();
        if values.len() != expected {
            return Err(CodecError::ArityMismatch {
                expected,
                got: values.len(),
            });
        }

        let mut w = BitWriter::new();
        w.write_u8(channel)?;
        let mut next = values.iter();
        spec.schema.for_each_primitive(&mut |prim| {
            // primitive_count == values.len() was checked above.
            match next.next() {
                Some(value) => primitive::encode(prim, value, &mut w),
                None => Err(CodecError::ArityMismatch {
                    expected,
                    got: values.len(),
                }),
            }
        })?;
        w.align();
        Ok(w.into_bytes())
    }
}
