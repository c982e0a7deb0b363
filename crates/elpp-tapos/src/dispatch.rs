//! The dispatch queue: enqueue completed transactions, sweep them out to
//! the chain's most recently successful API.
//!
//! Dispatch is fire and forget. An item is POSTed at most once and removed
//! on any response or transport error; devices retransmit on TAPOS
//! expiration if the chain never saw the transaction.

use shared_types::{time, ChainId};
use tracing::{debug, warn};

use crate::client::DispatchReply;
use crate::error::{ClientError, TaposError};
use crate::manager::TaposManager;

/// The fate of one swept item.
#[derive(Debug)]
pub struct SweepOutcome {
    pub chain: ChainId,
    /// Sequence number [`TaposManager::enqueue`] returned for the item, so
    /// callers can tell their own transaction's outcome apart from other
    /// items the same sweep flushed.
    pub seq: u64,
    pub device_key: String,
    pub result: Result<DispatchReply, ClientError>,
}

/// An item claimed by a sweep, carried across the unlocked POST window.
struct ClaimedItem {
    chain: ChainId,
    seq: u64,
    host: String,
    json: String,
    device_key: String,
}

impl TaposManager {
    /// Append a completed transaction to its chain's dispatch FIFO.
    ///
    /// Returns the item's queue sequence number; sweep outcomes carry it
    /// back so the caller can find the fate of exactly this transaction.
    pub fn enqueue(
        &self,
        chain: ChainId,
        json: String,
        device_key: String,
    ) -> Result<u64, TaposError> {
        let slot = self.chain(chain)?;
        let seq = slot.lock().enqueue(time::epoch_secs(), json, device_key);
        debug!(chain, seq, "transaction queued for dispatch");
        Ok(seq)
    }

    /// Sweep every chain's queue once.
    ///
    /// Not-started items on chains with a known-good API are claimed under
    /// the lock, POSTed outside it, and removed whatever the outcome.
    /// Chains with no `api_last` yet keep their items for a later sweep.
    pub async fn sweep(&self) -> Vec<SweepOutcome> {
        let claimed = self.claim_dispatchable();
        let mut outcomes = Vec::with_capacity(claimed.len());

        for item in claimed {
            let result = self.client().send_transaction(&item.host, &item.json).await;
            match &result {
                Ok(reply) if reply.is_success() => {
                    debug!(chain = item.chain, host = %item.host, status = reply.status,
                        "transaction dispatched")
                }
                Ok(reply) => warn!(chain = item.chain, host = %item.host, status = reply.status,
                    "chain rejected transaction"),
                Err(error) => warn!(chain = item.chain, host = %item.host, %error,
                    "dispatch transport failure"),
            }
            // Removed unconditionally; the device is the retry mechanism.
            if let Ok(slot) = self.chain(item.chain) {
                slot.lock().remove(item.seq);
            }
            outcomes.push(SweepOutcome {
                chain: item.chain,
                seq: item.seq,
                device_key: item.device_key,
                result,
            });
        }
        outcomes
    }

    fn claim_dispatchable(&self) -> Vec<ClaimedItem> {
        let mut claimed = Vec::new();
        for chain in self.chain_ids() {
            let Ok(slot) = self.chain(chain) else { continue };
            let mut state = slot.lock();
            let Some(api_last) = state.api_last else { continue };
            let Some(host) = state.pool.entry(api_last).map(|e| e.host.clone()) else {
                continue;
            };
            for item in state.queue.iter_mut().filter(|item| !item.started) {
                item.started = true;
                claimed.push(ClaimedItem {
                    chain,
                    seq: item.seq,
                    host: host.clone(),
                    json: item.json.clone(),
                    device_key: item.device_key.clone(),
                });
            }
        }
        claimed
    }
}
