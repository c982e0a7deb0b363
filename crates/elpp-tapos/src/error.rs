use thiserror::Error;

use shared_types::ChainId;

/// Outbound HTTP failures.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// TAPOS manager and dispatch failures.
#[derive(Debug, Error)]
pub enum TaposError {
    /// No chain configured under this selector.
    #[error("unknown chain {0}")]
    UnknownChain(ChainId),

    /// Every pool member is quarantined; retried on the short interval.
    #[error("api pool exhausted for chain {0}")]
    PoolExhausted(ChainId),

    /// The polled host answered for a different chain.
    #[error("chain id mismatch on chain {chain}: expected {expected}, got {got}")]
    ChainMismatch {
        chain: ChainId,
        expected: String,
        got: String,
    },

    /// `last_irreversible_block_id` too short or not hex.
    #[error("malformed block id {block_id:?}: {reason}")]
    BadBlockId { block_id: String, reason: String },

    /// No fresh TAPOS held for the chain.
    #[error("no tapos held for chain {0}")]
    TaposUnavailable(ChainId),

    #[error(transparent)]
    Client(#[from] ClientError),
}
