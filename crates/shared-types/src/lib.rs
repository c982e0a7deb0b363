//! # Shared Types
//!
//! Domain types shared across the ELPP gateway subsystems. This crate is a
//! leaf: it depends on nothing but serde and is depended on by everything
//! that speaks about chains, devices, or signed transactions.

pub mod time;
pub mod transaction;

pub use transaction::SignedTransaction;

/// Chain selector carried in the low three bits of a TAPOS fragment.
pub type ChainId = u8;

/// Transaction slot carried in the low three bits of every fragment header.
pub type TrxId = u8;

/// Number of addressable chains (3-bit selector on the wire).
pub const CHAIN_ID_SPACE: usize = 8;

/// Number of in-flight transaction slots per device (3-bit id on the wire).
pub const TRX_ID_SPACE: usize = 8;

/// Mask extracting the 3-bit transaction id from a fragment header byte.
pub const TRX_ID_MASK: u8 = 0x07;

/// Mask extracting the 3-bit chain selector from a chain byte.
pub const CHAIN_ID_MASK: u8 = 0x07;
