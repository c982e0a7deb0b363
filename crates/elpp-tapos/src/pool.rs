//! The rotating API host pool with error-aware selection.
//!
//! Each entry counts consecutive-ish errors; an entry with `errors >=
//! ERRORS_MAX` is quarantined and skipped by selection. Quarantine decays:
//! every `CHECK_MAX` selection passes over a quarantined entry knock one
//! error off, so a host that went dark eventually gets probed again.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Error count at which an entry stops being selected.
pub const ERRORS_MAX: u32 = 5;

/// Selection passes over a quarantined entry before one error decays.
pub const CHECK_MAX: u32 = 10;

/// Random draws one selection makes before giving up.
const SELECT_DRAWS: usize = 10;

/// A configured API host: scheme prefix plus host (and optional port).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoint {
    /// Scheme prefix, e.g. `http://`.
    pub method: String,
    /// Host name, optionally with a port.
    pub host: String,
}

impl ApiEndpoint {
    pub fn new(method: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            host: host.into(),
        }
    }
}

/// A pool member with its health bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct ApiEntry {
    pub method: String,
    pub host: String,
    pub errors: u32,
    pub check_count: u32,
    pub use_count: u64,
    pub version_found: Option<String>,
}

impl ApiEntry {
    fn new(endpoint: ApiEndpoint) -> Self {
        Self {
            method: endpoint.method,
            host: endpoint.host,
            errors: 0,
            check_count: 0,
            use_count: 0,
            version_found: None,
        }
    }

    /// `method + host`, the base the info URL is built on.
    pub fn base_url(&self) -> String {
        format!("{}{}", self.method, self.host)
    }

    pub fn is_quarantined(&self) -> bool {
        self.errors >= ERRORS_MAX
    }
}

/// The per-chain pool.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApiPool {
    entries: Vec<ApiEntry>,
}

impl ApiPool {
    pub fn new(endpoints: Vec<ApiEndpoint>) -> Self {
        Self {
            entries: endpoints.into_iter().map(ApiEntry::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> Option<&ApiEntry> {
        self.entries.get(index)
    }

    /// One quarantine-decay pass: count this selection against every
    /// quarantined entry and decay one error after `CHECK_MAX` passes.
    pub fn decay_pass(&mut self) {
        for entry in &mut self.entries {
            if entry.errors >= ERRORS_MAX {
                entry.check_count += 1;
                if entry.check_count >= CHECK_MAX {
                    entry.errors -= 1;
                    entry.check_count = 0;
                }
            }
        }
    }

    /// Select a healthy entry: one decay pass, then up to ten uniform draws
    /// rejecting quarantined entries.
    pub fn select<R: Rng>(&mut self, rng: &mut R) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        self.decay_pass();
        for _ in 0..SELECT_DRAWS {
            let index = rng.gen_range(0..self.entries.len());
            if !self.entries[index].is_quarantined() {
                return Some(index);
            }
        }
        None
    }

    /// A successful poll: decay one error, bump the use counter, remember
    /// the server version.
    pub fn record_success(&mut self, index: usize, version: Option<String>) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.errors = entry.errors.saturating_sub(1);
            entry.use_count += 1;
            if version.is_some() {
                entry.version_found = version;
            }
        }
    }

    /// A failed poll.
    pub fn record_error(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.errors += 1;
        }
    }
}
