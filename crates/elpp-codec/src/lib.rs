//! # ELPP Codec
//!
//! The bit-granular, channel-multiplexed wire codec for device uplinks and
//! downlinks. Layered bottom-up:
//!
//! - [`bits`] - read/write arbitrary bit runs into a byte sequence
//! - [`primitive`] - per-type encoders/decoders (fixed ints, varints,
//!   Q-format bitfields, 64-bit names, byte arrays)
//! - [`schema`] - composable tree-shaped field descriptors
//! - [`engine`] - the channel interpreter turning payloads into ordered
//!   value events and values back into frames
//!
//! ## Wire format
//!
//! ```text
//! ┌──────────────┬─────────────────────────┬───────┬──────────────┬─────┐
//! │ Channel (1B) │ Fields per schema       │ pad   │ Channel (1B) │ ... │
//! │ selector     │ (bit-packed, MSB first) │ to 8b │ selector     │     │
//! └──────────────┴─────────────────────────┴───────┴──────────────┴─────┘
//! ```
//!
//! Channel selectors and whole-byte fields are byte-aligned; bitfields pack
//! at arbitrary bit offsets inside a frame. Multi-byte integers are
//! little-endian at the byte level.

pub mod bits;
pub mod engine;
pub mod error;
pub mod primitive;
pub mod schema;

pub use engine::{ChannelEvent, ChannelSpec, DecodeFailure, Engine};
pub use error::{CodecError, Result};
pub use primitive::{decode_varuint32, write_varuint32, BitfieldSpec, Primitive, Value};
pub use schema::Schema;
