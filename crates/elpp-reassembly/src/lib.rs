//! # ELPP Reassembly
//!
//! Rebuilds full blockchain transactions from the fragment channels of
//! device uplinks. Fragments for one transaction arrive out of order across
//! independent payloads; this crate keeps the per-device record table,
//! applies first-write-wins per field, and emits a submit-ready transaction
//! the moment all four fragments are present.
//!
//! Components:
//!
//! - [`channels`] - the built-in channel IDs and their wire schemas
//! - [`record`] - one in-flight transaction and its packing rules
//! - [`device`] - per-device state and the process-wide registry
//! - [`signature`] - `SIG_K1_` rendering
//! - [`reassembler`] - event application and the decode result sum

pub mod channels;
pub mod device;
pub mod reassembler;
pub mod record;
pub mod signature;

pub use device::{DeviceRegistry, DeviceState};
pub use reassembler::{
    CompletedTransaction, DecodeResult, ReassemblyError, ReassemblyStatus, Reassembler,
    TaposRequest,
};
pub use record::TrxRecord;
