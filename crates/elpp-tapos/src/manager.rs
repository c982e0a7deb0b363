//! The TAPOS manager: one refresh loop per configured chain.
//!
//! Each loop selects a pool member, polls `get_info`, validates the chain
//! hash, and commits fresh reference-block metadata. Successes reschedule
//! on a long random interval, failures on a short one. Locks are never held
//! across the poll.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use serde_json::json;
use shared_types::{time, ChainId};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::{chain_mismatch, ChainApiClient};
use crate::error::TaposError;
use crate::state::{ChainSpec, ChainState, Tapos};

/// Refresh cadence. Successful polls wait a uniformly random interval in
/// `[refresh_min, refresh_max)`, failed ones in `[retry_min, retry_max)`.
#[derive(Debug, Clone)]
pub struct TaposSettings {
    pub refresh_min: Duration,
    pub refresh_max: Duration,
    pub retry_min: Duration,
    pub retry_max: Duration,
}

impl Default for TaposSettings {
    fn default() -> Self {
        Self {
            refresh_min: Duration::from_secs(5 * 60),
            refresh_max: Duration::from_secs(10 * 60),
            retry_min: Duration::from_secs(10),
            retry_max: Duration::from_secs(30),
        }
    }
}

/// Process-wide TAPOS and dispatch state, one independently locked slot per
/// chain.
pub struct TaposManager {
    chains: HashMap<ChainId, Mutex<ChainState>>,
    client: ChainApiClient,
    settings: TaposSettings,
}

impl TaposManager {
    pub fn new(specs: Vec<ChainSpec>, client: ChainApiClient, settings: TaposSettings) -> Self {
        let chains = specs
            .iter()
            .map(|spec| (spec.chain_id, Mutex::new(ChainState::new(spec))))
            .collect();
        Self {
            chains,
            client,
            settings,
        }
    }

    pub fn client(&self) -> &ChainApiClient {
        &self.client
    }

    pub fn chain_ids(&self) -> Vec<ChainId> {
        let mut ids: Vec<ChainId> = self.chains.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn chain(&self, chain: ChainId) -> Result<&Mutex<ChainState>, TaposError> {
        self.chains.get(&chain).ok_or(TaposError::UnknownChain(chain))
    }

    /// The freshest TAPOS held for a chain, if any.
    pub fn tapos_for(&self, chain: ChainId) -> Option<Tapos> {
        self.chains.get(&chain).and_then(|slot| slot.lock().tapos)
    }

    /// Commit a freshly acquired TAPOS value.
    pub fn store_tapos(&self, chain: ChainId, tapos: Tapos) -> Result<(), TaposError> {
        self.chain(chain)?.lock().tapos = Some(tapos);
        Ok(())
    }

    /// One poll cycle for one chain: select, GET, validate, commit.
    pub async fn refresh_chain(&self, chain: ChainId) -> Result<(), TaposError> {
        let slot = self.chain(chain)?;

        let (index, base_url, expected_hash) = {
            let mut state = slot.lock();
            let mut rng = rand::thread_rng();
            let index = state
                .pool
                .select(&mut rng)
                .ok_or(TaposError::PoolExhausted(chain))?;
            let entry = state
                .pool
                .entry(index)
                .ok_or(TaposError::PoolExhausted(chain))?;
            (index, entry.base_url(), state.chain_hash.clone())
        };

        let outcome = async {
            let info = self.client.get_info(&base_url).await?;
            if info.chain_id != expected_hash {
                return Err(chain_mismatch(chain, &expected_hash, &info.chain_id));
            }
            let prefix = info.ref_block_prefix()?;
            Ok((info, prefix))
        }
        .await;

        match outcome {
            Ok((info, ref_block_prefix)) => {
                let tapos = Tapos {
                    acq_epoch: time::epoch_secs(),
                    ref_block_num: info.ref_block_num(),
                    ref_block_prefix,
                };
                let mut state = slot.lock();
                state.tapos = Some(tapos);
                state.pool.record_success(index, info.server_version_string);
                state.api_last = Some(index);
                debug!(
                    chain,
                    api = %base_url,
                    ref_block_num = tapos.ref_block_num,
                    ref_block_prefix = tapos.ref_block_prefix,
                    "tapos refreshed"
                );
                Ok(())
            }
            Err(error) => {
                slot.lock().pool.record_error(index);
                warn!(chain, api = %base_url, %error, "tapos refresh failed");
                Err(error)
            }
        }
    }

    /// Spawn one refresh loop per chain. Loops poll immediately at startup
    /// and exit when the shutdown flag flips.
    pub fn spawn_refresh_loops(self: &Arc<Self>, shutdown: watch::Receiver<bool>) {
        for chain in self.chain_ids() {
            let manager = Arc::clone(self);
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                info!(chain, "tapos refresh loop started");
                loop {
                    let ok = manager.refresh_chain(chain).await.is_ok();
                    let wait = manager.next_interval(ok);
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                }
                info!(chain, "tapos refresh loop stopped");
            });
        }
    }

    fn next_interval(&self, success: bool) -> Duration {
        let (lo, hi) = if success {
            (self.settings.refresh_min, self.settings.refresh_max)
        } else {
            (self.settings.retry_min, self.settings.retry_max)
        };
        let span = hi.saturating_sub(lo);
        lo + span.mul_f64(rand::thread_rng().gen::<f64>())
    }

    /// JSON snapshot of every chain's state for the introspection endpoint.
    pub fn snapshot(&self) -> serde_json::Value {
        let chains: serde_json::Map<String, serde_json::Value> = self
            .chain_ids()
            .into_iter()
            .filter_map(|chain| {
                let slot = self.chains.get(&chain)?;
                let state = slot.lock();
                Some((chain.to_string(), json!(&*state)))
            })
            .collect();
        json!({ "chains": chains })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ApiEndpoint;

    fn manager_with_chain(chain: ChainId) -> TaposManager {
        let spec = ChainSpec {
            chain_id: chain,
            name: format!("chain-{chain}"),
            chain_hash: "ab".repeat(32),
            apis: vec![ApiEndpoint::new("http://", "unreachable.invalid")],
        };
        TaposManager::new(
            vec![spec],
            ChainApiClient::new(Duration::from_millis(200)).unwrap(),
            TaposSettings::default(),
        )
    }

    #[test]
    fn test_tapos_lookup_and_store() {
        let manager = manager_with_chain(1);
        assert!(manager.tapos_for(1).is_none());
        let tapos = Tapos {
            acq_epoch: 100,
            ref_block_num: 0x1234,
            ref_block_prefix: 0xDEAD_BEEF,
        };
        manager.store_tapos(1, tapos).unwrap();
        assert_eq!(manager.tapos_for(1), Some(tapos));
        assert!(manager.tapos_for(2).is_none());
        assert!(matches!(
            manager.store_tapos(2, tapos),
            Err(TaposError::UnknownChain(2))
        ));
    }

    #[test]
    fn test_next_interval_within_bounds() {
        let manager = manager_with_chain(0);
        for _ in 0..100 {
            let ok = manager.next_interval(true);
            assert!(ok >= Duration::from_secs(300) && ok < Duration::from_secs(601));
            let err = manager.next_interval(false);
            assert!(err >= Duration::from_secs(10) && err < Duration::from_secs(31));
        }
    }

    #[test]
    fn test_snapshot_shape() {
        let manager = manager_with_chain(3);
        let snap = manager.snapshot();
        let chain = &snap["chains"]["3"];
        assert_eq!(chain["name"], "chain-3");
        assert!(chain["tapos"].is_null());
        assert_eq!(chain["pool"]["entries"][0]["host"], "unreachable.invalid");
    }

    #[tokio::test]
    async fn test_refresh_unreachable_host_records_error() {
        let manager = manager_with_chain(1);
        let err = manager.refresh_chain(1).await.unwrap_err();
        assert!(matches!(err, TaposError::Client(_)));
        let snap = manager.snapshot();
        assert_eq!(snap["chains"]["1"]["pool"]["entries"][0]["errors"], 1);
        assert!(snap["chains"]["1"]["api_last"].is_null());
    }

    #[tokio::test]
    async fn test_refresh_unknown_chain() {
        let manager = manager_with_chain(1);
        assert!(matches!(
            manager.refresh_chain(9).await,
            Err(TaposError::UnknownChain(9))
        ));
    }
}
