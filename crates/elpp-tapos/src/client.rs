//! Outbound HTTP: chain info polling, transaction submission, device
//! downlinks. One shared client with connect and total deadlines; every
//! call happens outside the chain-state locks.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_types::ChainId;

use crate::error::{ClientError, TaposError};

/// Relevant subset of the `get_info` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainInfo {
    pub chain_id: String,
    #[serde(default)]
    pub server_version_string: Option<String>,
    pub last_irreversible_block_num: u64,
    pub last_irreversible_block_id: String,
}

impl ChainInfo {
    /// Low 16 bits of the last irreversible block number.
    pub fn ref_block_num(&self) -> u16 {
        (self.last_irreversible_block_num & 0xFFFF) as u16
    }

    /// Little-endian u32 at byte offset 8 of the hex-decoded block id.
    pub fn ref_block_prefix(&self) -> Result<u32, TaposError> {
        let bytes = hex::decode(&self.last_irreversible_block_id).map_err(|e| {
            TaposError::BadBlockId {
                block_id: self.last_irreversible_block_id.clone(),
                reason: e.to_string(),
            }
        })?;
        let prefix: [u8; 4] =
            bytes
                .get(8..12)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| TaposError::BadBlockId {
                    block_id: self.last_irreversible_block_id.clone(),
                    reason: "shorter than 12 bytes".into(),
                })?;
        Ok(u32::from_le_bytes(prefix))
    }
}

/// Response of a transaction POST, relayed verbatim to the ingress caller.
#[derive(Debug, Clone)]
pub struct DispatchReply {
    pub status: u16,
    pub body: String,
}

impl DispatchReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Downlink message POSTed back to the network server for a device.
#[derive(Debug, Clone, Serialize)]
pub struct DownlinkMessage {
    /// Base64 of the ELPP-encoded downlink payload.
    pub payload_raw: String,
    /// ELPP port the device listens on.
    pub port: u16,
    pub confirmed: bool,
}

/// The gateway's outbound HTTP client.
#[derive(Debug, Clone)]
pub struct ChainApiClient {
    http: reqwest::Client,
}

impl ChainApiClient {
    /// Build a client with the given connect/total deadline.
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { http })
    }

    /// GET `<base>/v1/chain/get_info`.
    pub async fn get_info(&self, base_url: &str) -> Result<ChainInfo, ClientError> {
        let info = self
            .http
            .get(format!("{base_url}/v1/chain/get_info"))
            .send()
            .await?
            .error_for_status()?
            .json::<ChainInfo>()
            .await?;
        Ok(info)
    }

    /// POST a serialized transaction to `http://<host>/v1/chain/send_transaction`.
    ///
    /// Any response, success or rejection, is a reply; only transport
    /// failures error.
    pub async fn send_transaction(
        &self,
        host: &str,
        json: &str,
    ) -> Result<DispatchReply, ClientError> {
        let response = self
            .http
            .post(format!("http://{host}/v1/chain/send_transaction"))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(json.to_owned())
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Body(e.to_string()))?;
        Ok(DispatchReply { status, body })
    }

    /// POST a TAPOS response downlink to the network server.
    pub async fn post_downlink(
        &self,
        url: &str,
        message: &DownlinkMessage,
    ) -> Result<(), ClientError> {
        self.http
            .post(url)
            .json(message)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Convenience for error paths that need the chain attached.
pub fn chain_mismatch(chain: ChainId, expected: &str, got: &str) -> TaposError {
    TaposError::ChainMismatch {
        chain,
        expected: expected.to_owned(),
        got: got.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(block_num: u64, block_id: &str) -> ChainInfo {
        ChainInfo {
            chain_id: "00".repeat(32),
            server_version_string: Some("v3.1.0".into()),
            last_irreversible_block_num: block_num,
            last_irreversible_block_id: block_id.into(),
        }
    }

    #[test]
    fn test_ref_block_num_masks_to_16_bits() {
        assert_eq!(info(0x0123_4567, "").ref_block_num(), 0x4567);
        assert_eq!(info(0xFFFF_FFFF, "").ref_block_num(), 0xFFFF);
    }

    #[test]
    fn test_ref_block_prefix_offset_and_endianness() {
        // Bytes 8..12 are 0x11 0x22 0x33 0x44 -> LE u32 0x44332211.
        let block_id = format!("{}11223344{}", "00".repeat(8), "00".repeat(20));
        assert_eq!(info(1, &block_id).ref_block_prefix().unwrap(), 0x4433_2211);
    }

    #[test]
    fn test_ref_block_prefix_rejects_short_or_bad_ids() {
        assert!(matches!(
            info(1, "0011").ref_block_prefix(),
            Err(TaposError::BadBlockId { .. })
        ));
        assert!(matches!(
            info(1, "zz".repeat(16).as_str()).ref_block_prefix(),
            Err(TaposError::BadBlockId { .. })
        ));
    }

    #[test]
    fn test_get_info_parses_chain_response() {
        let body = serde_json::json!({
            "server_version": "deadbeef",
            "chain_id": "4667b205c6838ef70ff7988f6e8257e8be0e1284a2f59699054a018f743b1d11",
            "head_block_num": 301_247_610,
            "last_irreversible_block_num": 301_247_278,
            "last_irreversible_block_id":
                "11f3ac2e1234567890abcdef1234567890abcdef1234567890abcdef12345678",
            "server_version_string": "v3.1.0",
        });
        let parsed: ChainInfo = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.ref_block_num(), (301_247_278u32 & 0xFFFF) as u16);
        assert!(parsed.ref_block_prefix().is_ok());
        assert_eq!(parsed.server_version_string.as_deref(), Some("v3.1.0"));
    }
}
