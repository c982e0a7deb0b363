//! Per-device reassembly state and the process-wide device registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use shared_types::{TrxId, TRX_ID_MASK};
use tracing::debug;

use crate::record::TrxRecord;

/// In-flight transactions for one device, keyed by the 3-bit trx id.
///
/// Created lazily on first uplink, lives for the process lifetime, is never
/// persisted. Callers serialize access per device (the registry hands out
/// one mutex per device key).
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceState {
    trx: HashMap<TrxId, TrxRecord>,
}

impl DeviceState {
    /// Look up or insert the record for a trx id, refreshing its age stamp.
    pub fn record_mut(&mut self, trx_id: TrxId, now_epoch: u64) -> &mut TrxRecord {
        let rec = self
            .trx
            .entry(trx_id & TRX_ID_MASK)
            .or_insert_with(|| TrxRecord::new(now_epoch));
        rec.last_epoch = now_epoch;
        rec
    }

    /// Remove and return the record for a trx id.
    pub fn take_record(&mut self, trx_id: TrxId) -> Option<TrxRecord> {
        self.trx.remove(&(trx_id & TRX_ID_MASK))
    }

    pub fn record(&self, trx_id: TrxId) -> Option<&TrxRecord> {
        self.trx.get(&(trx_id & TRX_ID_MASK))
    }

    pub fn in_flight(&self) -> usize {
        self.trx.len()
    }

    /// Drop records whose last fragment is older than `max_age`. Returns the
    /// number purged.
    pub fn purge_older_than(&mut self, now_epoch: u64, max_age: Duration) -> usize {
        let before = self.trx.len();
        self.trx
            .retain(|_, rec| rec.age_secs(now_epoch) <= max_age.as_secs());
        before - self.trx.len()
    }
}

/// Process-wide table of device states, keyed by device EUI.
///
/// Hands out one `Arc<Mutex<DeviceState>>` per device so uplink handling for
/// a single device is serialized while distinct devices proceed in parallel.
#[derive(Debug)]
pub struct DeviceRegistry {
    devices: Mutex<HashMap<String, Arc<Mutex<DeviceState>>>>,
    purge_after: Duration,
}

impl DeviceRegistry {
    pub fn new(purge_after: Duration) -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            purge_after,
        }
    }

    /// Look up (or lazily create) a device's state. Every lookup runs the
    /// purge pass over that device's records.
    pub fn device(&self, dev_eui: &str, now_epoch: u64) -> Arc<Mutex<DeviceState>> {
        let state = {
            let mut devices = self.devices.lock();
            Arc::clone(
                devices
                    .entry(dev_eui.to_string())
                    .or_insert_with(Default::default),
            )
        };
        let purged = state.lock().purge_older_than(now_epoch, self.purge_after);
        if purged > 0 {
            debug!(device = %dev_eui, purged, "purged stale transaction records");
        }
        state
    }

    pub fn device_count(&self) -> usize {
        self.devices.lock().len()
    }

    /// Clone of the full table for the introspection endpoint.
    pub fn snapshot(&self) -> HashMap<String, DeviceState> {
        let devices = self.devices.lock();
        devices
            .iter()
            .map(|(eui, state)| (eui.clone(), state.lock().clone()))
            .collect()
    }
}
