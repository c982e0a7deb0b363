//! Per-chain TAPOS and dispatch state.

use std::collections::VecDeque;

use serde::Serialize;
use shared_types::ChainId;

use crate::pool::{ApiEndpoint, ApiPool};

/// Reference-block metadata required to submit a transaction within its
/// expiration window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tapos {
    /// Epoch seconds when this value was acquired.
    pub acq_epoch: u64,
    /// Low 16 bits of the last irreversible block number.
    pub ref_block_num: u16,
    /// Little-endian u32 at byte offset 8 of the block id.
    pub ref_block_prefix: u32,
}

/// One queued transaction awaiting dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchItem {
    /// Queue-local sequence number; identifies the item across the unlocked
    /// POST window.
    pub seq: u64,
    /// Epoch seconds when the item was enqueued.
    pub epoch: u64,
    /// Set once a sweep has claimed the item for POSTing.
    pub started: bool,
    /// Serialized submit body.
    pub json: String,
    /// Device the transaction came from, for response correlation.
    pub device_key: String,
}

/// Static description of one chain, as configured.
#[derive(Debug, Clone, Serialize)]
pub struct ChainSpec {
    pub chain_id: ChainId,
    pub name: String,
    /// Expected `chain_id` hash reported by `get_info`.
    pub chain_hash: String,
    pub apis: Vec<ApiEndpoint>,
}

/// Mutable per-chain state, guarded by one lock per chain.
#[derive(Debug, Serialize)]
pub struct ChainState {
    pub name: String,
    pub chain_hash: String,
    pub tapos: Option<Tapos>,
    pub pool: ApiPool,
    /// Pool index of the most recently successful API.
    pub api_last: Option<usize>,
    pub queue: VecDeque<DispatchItem>,
    next_seq: u64,
}

impl ChainState {
    pub fn new(spec: &ChainSpec) -> Self {
        Self {
            name: spec.name.clone(),
            chain_hash: spec.chain_hash.clone(),
            tapos: None,
            pool: ApiPool::new(spec.apis.clone()),
            api_last: None,
            queue: VecDeque::new(),
            next_seq: 0,
        }
    }

    /// Append a transaction to the dispatch FIFO.
    pub fn enqueue(&mut self, epoch: u64, json: String, device_key: String) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push_back(DispatchItem {
            seq,
            epoch,
            started: false,
            json,
            device_key,
        });
        seq
    }

    /// Drop an item by its sequence number (after its POST resolved, either
    /// way).
    pub fn remove(&mut self, seq: u64) -> bool {
        let before = self.queue.len();
        self.queue.retain(|item| item.seq != seq);
        before != self.queue.len()
    }
}
