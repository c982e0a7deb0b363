//! The signed-transaction JSON shape accepted by the chain's
//! `/v1/chain/send_transaction` endpoint.
//!
//! The reassembler produces this value; the dispatcher serializes it into
//! the POST body. Both ends share the one definition so the wire shape can
//! never drift between them.

use serde::{Deserialize, Serialize};

/// A fully reassembled, already-signed transaction in the submit format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Rendered signatures (`SIG_K1_...`); exactly one for device uplinks.
    pub signatures: Vec<String>,
    /// Always false: devices cannot afford to compress.
    pub compression: bool,
    /// Always empty: context-free data is not part of the uplink protocol.
    pub packed_context_free_data: String,
    /// Hex rendering of the packed transaction bytes.
    pub packed_trx: String,
}

impl SignedTransaction {
    /// Build the submit body for one signature and a packed transaction.
    pub fn new(signature: String, packed_trx_hex: String) -> Self {
        Self {
            signatures: vec![signature],
            compression: false,
            packed_context_free_data: String::new(),
            packed_trx: packed_trx_hex,
        }
    }
}
