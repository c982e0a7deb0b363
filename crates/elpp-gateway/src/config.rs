//! Gateway configuration with validation.
//!
//! Defaults cover the two Telos chains the production devices talk to; a
//! JSON file named by the `ELPP_GATEWAY_CONFIG` environment variable
//! replaces them wholesale.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_types::CHAIN_ID_SPACE;

use elpp_tapos::{ApiEndpoint, ChainSpec, TaposSettings};

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// ELPP application port devices address their uplinks to.
    pub elpp_port: u16,
    /// Ingress request handling.
    pub ingress: IngressConfig,
    /// Outbound HTTP (get_info, dispatch, downlinks).
    pub outbound: OutboundConfig,
    /// Reassembly table housekeeping.
    pub reassembly: ReassemblyConfig,
    /// TAPOS refresh cadence.
    pub tapos: TaposConfig,
    /// The chains devices may address, by 3-bit selector.
    pub chains: Vec<ChainConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            elpp_port: 8,
            ingress: IngressConfig::default(),
            outbound: OutboundConfig::default(),
            reassembly: ReassemblyConfig::default(),
            tapos: TaposConfig::default(),
            chains: default_chains(),
        }
    }
}

impl GatewayConfig {
    /// Load a configuration file (JSON).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Self =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.elpp_port == 0 {
            return Err(ConfigError::Invalid("elpp_port cannot be 0".into()));
        }
        if self.chains.is_empty() {
            return Err(ConfigError::Invalid("no chains configured".into()));
        }
        let mut seen = [false; CHAIN_ID_SPACE];
        for chain in &self.chains {
            let id = usize::from(chain.chain_id);
            if id >= CHAIN_ID_SPACE {
                return Err(ConfigError::InvalidChain(format!(
                    "chain id {} exceeds the 3-bit selector space",
                    chain.chain_id
                )));
            }
            if seen[id] {
                return Err(ConfigError::InvalidChain(format!(
                    "duplicate chain id {}",
                    chain.chain_id
                )));
            }
            seen[id] = true;
            if chain.chain_hash.len() != 64 || !chain.chain_hash.bytes().all(|b| b.is_ascii_hexdigit())
            {
                return Err(ConfigError::InvalidChain(format!(
                    "chain {} hash is not 64 hex characters",
                    chain.name
                )));
            }
            if chain.apis.is_empty() {
                return Err(ConfigError::InvalidChain(format!(
                    "chain {} has an empty api pool",
                    chain.name
                )));
            }
        }
        if self.ingress.request_deadline.as_millis() == 0 {
            return Err(ConfigError::InvalidTimeout(
                "request deadline cannot be 0".into(),
            ));
        }
        if self.outbound.timeout.as_millis() == 0 {
            return Err(ConfigError::InvalidTimeout(
                "outbound timeout cannot be 0".into(),
            ));
        }
        if self.tapos.refresh_min >= self.tapos.refresh_max
            || self.tapos.retry_min >= self.tapos.retry_max
        {
            return Err(ConfigError::InvalidTimeout(
                "tapos intervals must satisfy min < max".into(),
            ));
        }
        Ok(())
    }

    /// The chain table in the shape the TAPOS manager consumes.
    pub fn chain_specs(&self) -> Vec<ChainSpec> {
        self.chains
            .iter()
            .map(|chain| ChainSpec {
                chain_id: chain.chain_id,
                name: chain.name.clone(),
                chain_hash: chain.chain_hash.clone(),
                apis: chain.apis.clone(),
            })
            .collect()
    }

    /// Refresh cadence in the shape the TAPOS manager consumes.
    pub fn tapos_settings(&self) -> TaposSettings {
        TaposSettings {
            refresh_min: self.tapos.refresh_min,
            refresh_max: self.tapos.refresh_max,
            retry_min: self.tapos.retry_min,
            retry_max: self.tapos.retry_max,
        }
    }
}

/// Ingress request handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressConfig {
    /// Whole-request deadline for one uplink POST.
    #[serde(with = "humantime_serde")]
    pub request_deadline: Duration,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            request_deadline: Duration::from_secs(30),
        }
    }
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    /// Connect and total deadline for outbound requests.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
        }
    }
}

/// Reassembly table housekeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassemblyConfig {
    /// Age after which an in-flight record is purged.
    #[serde(with = "humantime_serde")]
    pub purge_after: Duration,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            purge_after: Duration::from_secs(300),
        }
    }
}

/// TAPOS refresh cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaposConfig {
    #[serde(with = "humantime_serde")]
    pub refresh_min: Duration,
    #[serde(with = "humantime_serde")]
    pub refresh_max: Duration,
    #[serde(with = "humantime_serde")]
    pub retry_min: Duration,
    #[serde(with = "humantime_serde")]
    pub retry_max: Duration,
}

impl Default for TaposConfig {
    fn default() -> Self {
        Self {
            refresh_min: Duration::from_secs(5 * 60),
            refresh_max: Duration::from_secs(10 * 60),
            retry_min: Duration::from_secs(10),
            retry_max: Duration::from_secs(30),
        }
    }
}

/// One chain a device may address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// 3-bit selector the devices use.
    pub chain_id: u8,
    pub name: String,
    /// Expected `chain_id` hash from `get_info`.
    pub chain_hash: String,
    /// API pool, scheme prefix + host each.
    pub apis: Vec<ApiEndpoint>,
}

fn default_chains() -> Vec<ChainConfig> {
    vec![
        ChainConfig {
            chain_id: 0,
            name: "telos-testnet".into(),
            chain_hash: "1eaa0824707c8c16bd25145493bf062aecddfeb56c736f6ba6397f3195f33c9f"
                .into(),
            apis: vec![ApiEndpoint::new("http://", "testnet.telos.net")],
        },
        ChainConfig {
            chain_id: 1,
            name: "telos-mainnet".into(),
            chain_hash: "4667b205c6838ef70ff7988f6e8257e8be0e1284a2f59699054a018f743b1d11"
                .into(),
            apis: vec![
                ApiEndpoint::new("http://", "mainnet.telos.net"),
                ApiEndpoint::new("http://", "telos.caleos.io"),
                ApiEndpoint::new("http://", "api.telosarabia.net"),
            ],
        },
    ]
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("cannot read configuration: {0}")]
    Io(String),
    /// Configuration file is not valid JSON
    #[error("cannot parse configuration: {0}")]
    Parse(String),
    /// Invalid chain table entry
    #[error("invalid chain: {0}")]
    InvalidChain(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            // Try parsing as plain seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.elpp_port, 8);
        assert_eq!(config.chains.len(), 2);
        assert_eq!(config.reassembly.purge_after, Duration::from_secs(300));
    }

    #[test]
    fn test_chain_id_must_fit_selector() {
        let mut config = GatewayConfig::default();
        config.chains[0].chain_id = 8;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChain(_))
        ));
    }

    #[test]
    fn test_duplicate_chain_ids_rejected() {
        let mut config = GatewayConfig::default();
        config.chains[1].chain_id = config.chains[0].chain_id;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChain(_))
        ));
    }

    #[test]
    fn test_chain_hash_shape_checked() {
        let mut config = GatewayConfig::default();
        config.chains[0].chain_hash = "not-hex".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChain(_))
        ));
    }

    #[test]
    fn test_empty_pool_rejected() {
        let mut config = GatewayConfig::default();
        config.chains[1].apis.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChain(_))
        ));
    }

    #[test]
    fn test_duration_formats() {
        let json = serde_json::json!({
            "ingress": { "request_deadline": "45s" },
            "outbound": { "timeout": "1500ms" },
            "reassembly": { "purge_after": "5m" },
        });
        let config: GatewayConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.ingress.request_deadline, Duration::from_secs(45));
        assert_eq!(config.outbound.timeout, Duration::from_millis(1500));
        assert_eq!(config.reassembly.purge_after, Duration::from_secs(300));
    }

    #[test]
    fn test_interval_ordering_checked() {
        let mut config = GatewayConfig::default();
        config.tapos.refresh_min = config.tapos.refresh_max;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_chain_specs_conversion() {
        let config = GatewayConfig::default();
        let specs = config.chain_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].name, "telos-mainnet");
        assert_eq!(specs[1].apis.len(), 3);
    }
}
