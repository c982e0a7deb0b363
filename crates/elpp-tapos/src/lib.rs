//! # ELPP TAPOS
//!
//! Keeps reference-block metadata fresh for every configured chain and
//! forwards completed transactions to the chain's JSON-RPC endpoint.
//!
//! - [`pool`] - weighted API host pool with quarantine and decay
//! - [`state`] - per-chain TAPOS value and dispatch FIFO
//! - [`client`] - outbound HTTP (get_info, send_transaction, downlinks)
//! - [`manager`] - per-chain refresh loops and the shared state table
//! - [`dispatch`] - enqueue/sweep over the dispatch queues

pub mod client;
pub mod dispatch;
pub mod error;
pub mod manager;
pub mod pool;
pub mod state;

pub use client::{ChainApiClient, ChainInfo, DispatchReply, DownlinkMessage};
pub use dispatch::SweepOutcome;
pub use error::{ClientError, TaposError};
pub use manager::{TaposManager, TaposSettings};
pub use pool::{ApiEndpoint, ApiEntry, ApiPool, CHECK_MAX, ERRORS_MAX};
pub use state::{ChainSpec, ChainState, DispatchItem, Tapos};
