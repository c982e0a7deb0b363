use thiserror::Error;

/// Errors produced by the bit buffer, the primitive codecs, and the engine.
///
/// Every failure on malformed input is reported through this enum; nothing
/// in the codec panics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Selector byte is not registered in the channel map.
    #[error("channel {0:#04x} not found")]
    ChannelNotFound(u8),

    /// A read ran past the end of the buffer.
    #[error("short buffer: needed {needed} bits at bit {at}, {available} available")]
    ShortBuffer {
        at: usize,
        needed: usize,
        available: usize,
    },

    /// A whole-byte primitive was entered off a byte boundary.
    #[error("bit position {0} is not byte-aligned")]
    NotAligned(usize),

    /// A single bit run wider than the 32-bit capture limit.
    #[error("bit run of {0} bits exceeds the 32-bit limit")]
    RunTooWide(usize),

    /// A varuint32 did not terminate within five bytes.
    #[error("varuint32 longer than 5 bytes")]
    VaruintOverflow,

    /// A value handed to the encoder does not match the schema primitive.
    #[error("value mismatch: schema expects {expected}, got {got}")]
    ValueMismatch {
        expected: &'static str,
        got: &'static str,
    },

    /// The encoder was handed the wrong number of values for a schema.
    #[error("schema expects {expected} values, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    /// A fixed-length byte value of the wrong length.
    #[error("byte value of length {got}, schema expects {expected}")]
    LengthMismatch { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, CodecError>;
