//! Per-transaction reassembly records.
//!
//! A record collects the four fragment kinds for one (device, trx-id) slot.
//! Field writes are first-write-wins: the record keeps whatever arrived
//! first and ignores later fragments of the same kind. A record is complete
//! once all four byte members are set.

use serde::Serialize;
use shared_types::{time, ChainId, SignedTransaction};

use crate::signature::render_sig_k1;

/// Packed TAPOS length: 10 wire bytes plus three zero bytes standing in for
/// max_net_usage_words, max_cpu_usage_ms and delay_sec (varuint 0 is a
/// single 0x00 each).
///
/// TODO: confirm the three trailing varuint-0 bytes against the chain's
/// transaction ABI if the header fields ever become configurable.
pub const PACKED_TAPOS_LEN: usize = 13;

/// Packed action length: action-array count, 16 name bytes, permission-array
/// count, 16 name bytes.
pub const PACKED_ACTION_LEN: usize = 34;

/// One in-flight transaction being reassembled.
#[derive(Debug, Clone, Serialize)]
pub struct TrxRecord {
    /// Chain selector, fixed by the first TAPOS fragment.
    pub chain: ChainId,
    /// Rendered `SIG_K1_...` signature string.
    pub signature: Option<String>,
    /// Packed TAPOS header bytes.
    #[serde(serialize_with = "hex_opt_13")]
    pub tapos: Option<[u8; PACKED_TAPOS_LEN]>,
    /// Packed action bytes.
    #[serde(serialize_with = "hex_opt_34")]
    pub action: Option<[u8; PACKED_ACTION_LEN]>,
    /// Raw serialized-action data bytes.
    #[serde(serialize_with = "hex_opt_vec")]
    pub data: Option<Vec<u8>>,
    /// Epoch seconds of the most recent fragment for this record.
    pub last_epoch: u64,
}

impl TrxRecord {
    pub fn new(now_epoch: u64) -> Self {
        Self {
            chain: 0,
            signature: None,
            tapos: None,
            action: None,
            data: None,
            last_epoch: now_epoch,
        }
    }

    /// Store the chain selector and the packed 13-byte TAPOS. First write
    /// wins; returns whether the fragment was applied.
    pub fn set_tapos(&mut self, chain: ChainId, wire: &[u8]) -> bool {
        if self.tapos.is_some() {
            return false;
        }
        let mut packed = [0u8; PACKED_TAPOS_LEN];
        let n = wire.len().min(PACKED_TAPOS_LEN);
        packed[..n].copy_from_slice(&wire[..n]);
        self.chain = chain;
        self.tapos = Some(packed);
        true
    }

    /// Store the re-framed 34-byte action: outer action-array count at byte
    /// 0, permission-array count at byte 17, the four 8-byte names between.
    pub fn set_action(&mut self, names: [u64; 4]) -> bool {
        if self.action.is_some() {
            return false;
        }
        let mut packed = [0u8; PACKED_ACTION_LEN];
        packed[0] = 0x01;
        packed[1..9].copy_from_slice(&names[0].to_le_bytes());
        packed[9..17].copy_from_slice(&names[1].to_le_bytes());
        packed[17] = 0x01;
        packed[18..26].copy_from_slice(&names[2].to_le_bytes());
        packed[26..34].copy_from_slice(&names[3].to_le_bytes());
        self.action = Some(packed);
        true
    }

    /// Store the raw serialized-action bytes. First write wins.
    pub fn set_data(&mut self, data: &[u8]) -> bool {
        if self.data.is_some() {
            return false;
        }
        self.data = Some(data.to_vec());
        true
    }

    /// Render and store the signature. First write wins.
    pub fn set_signature(&mut self, sig: &[u8; 65]) -> bool {
        if self.signature.is_some() {
            return false;
        }
        self.signature = Some(render_sig_k1(sig));
        true
    }

    /// A record is complete iff all four byte members are set.
    pub fn is_complete(&self) -> bool {
        self.signature.is_some()
            && self.tapos.is_some()
            && self.action.is_some()
            && self.data.is_some()
    }

    /// Age in seconds relative to `now`.
    pub fn age_secs(&self, now_epoch: u64) -> u64 {
        now_epoch.saturating_sub(self.last_epoch)
    }

    /// The packed transaction byte sequence:
    /// `tapos13 || 0x00 || action34 || varuint(len) || data`.
    /// The lone zero byte is the empty context-free-actions array.
    pub fn packed_trx(&self) -> Option<Vec<u8>> {
        let (tapos, action, data) = match (&self.tapos, &self.action, &self.data) {
            (Some(t), Some(a), Some(d)) => (t, a, d),
            _ => return None,
        };
        let mut packed =
            Vec::with_capacity(PACKED_TAPOS_LEN + 1 + PACKED_ACTION_LEN + 5 + data.len());
        packed.extend_from_slice(tapos);
        packed.push(0x00);
        packed.extend_from_slice(action);
        elpp_codec::write_varuint32(&mut packed, data.len() as u32);
        packed.extend_from_slice(data);
        Some(packed)
    }

    /// Consume a complete record into the submit body.
    pub fn into_signed_transaction(self) -> Option<SignedTransaction> {
        let packed = self.packed_trx()?;
        let signature = self.signature?;
        Some(SignedTransaction::new(signature, hex::encode(packed)))
    }

    /// One human-readable status line, e.g.
    /// `has tapos, has action, needs data, needs signature`.
    pub fn status_line(&self) -> String {
        fn word(set: bool, what: &str) -> String {
            if set {
                format!("has {what}")
            } else {
                format!("needs {what}")
            }
        }
        [
            word(self.tapos.is_some(), "tapos"),
            word(self.action.is_some(), "action"),
            word(self.data.is_some(), "data"),
            word(self.signature.is_some(), "signature"),
        ]
        .join(", ")
    }
}

impl Default for TrxRecord {
    fn default() -> Self {
        Self::new(time::epoch_secs())
    }
}

fn hex_opt_13<S: serde::Serializer>(
    v: &Option<[u8; PACKED_TAPOS_LEN]>,
    ser: S,
) -> Result<S::Ok, S::Error> {
    hex_opt(v.as_ref().map(|b| &b[..]), ser)
}

fn hex_opt_34<S: serde::Serializer>(
    v: &Option<[u8; PACKED_ACTION_LEN]>,
    ser: S,
) -> Result<S::Ok, S::Error> {
    hex_opt(v.as_ref().map(|b| &b[..]), ser)
}

fn hex_opt_vec<S: serde::Serializer>(v: &Option<Vec<u8>>, ser: S) -> Result<S::Ok, S::Error> {
    hex_opt(v.as_deref(), ser)
}

fn hex_opt<S: serde::Serializer>(v: Option<&[u8]>, ser: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(bytes) => ser.serialize_some(&hex::encode(bytes)),
        None => ser.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record() -> TrxRecord {
        let mut rec = TrxRecord::new(1_000);
        assert!(rec.set_tapos(1, &[0xAA; 10]));
        assert!(rec.set_action([1, 2, 3, 4]));
        assert!(rec.set_data(&[0x55; 82]));
        assert!(rec.set_signature(&[7u8; 65]));
        rec
    }

    #[test]
    fn test_first_write_wins() {
        let mut rec = TrxRecord::new(0);
        assert!(rec.set_tapos(1, &[0x11; 10]));
        assert!(!rec.set_tapos(2, &[0x22; 10]));
        assert_eq!(rec.chain, 1);
        assert_eq!(rec.tapos.unwrap()[0], 0x11);

        assert!(rec.set_data(b"one"));
        assert!(!rec.set_data(b"two"));
        assert_eq!(rec.data.as_deref(), Some(&b"one"[..]));
    }

    #[test]
    fn test_tapos_padded_to_13_bytes() {
        let mut rec = TrxRecord::new(0);
        rec.set_tapos(3, &[0xFF; 10]);
        let packed = rec.tapos.unwrap();
        assert_eq!(&packed[..10], &[0xFF; 10]);
        assert_eq!(&packed[10..], &[0, 0, 0]);
    }

    #[test]
    fn test_action_reframed_with_array_counts() {
        let mut rec = TrxRecord::new(0);
        rec.set_action([
            0x0102_0304_0506_0708,
            0x1112_1314_1516_1718,
            0x2122_2324_2526_2728,
            0x3132_3334_3536_3738,
        ]);
        let packed = rec.action.unwrap();
        assert_eq!(packed[0], 0x01);
        assert_eq!(packed[17], 0x01);
        assert_eq!(packed[1], 0x08); // names are little-endian
        assert_eq!(packed[18], 0x28);
        assert_eq!(packed[33], 0x31);
    }

    #[test]
    fn test_completeness_requires_all_four() {
        let mut rec = TrxRecord::new(0);
        assert!(!rec.is_complete());
        rec.set_tapos(0, &[0; 10]);
        rec.set_action([0; 4]);
        rec.set_data(b"x");
        assert!(!rec.is_complete());
        rec.set_signature(&[0; 65]);
        assert!(rec.is_complete());
    }

    #[test]
    fn test_packed_trx_layout() {
        let rec = full_record();
        let packed = rec.packed_trx().unwrap();
        // tapos13 || 0x00 || action34 || 0x52 || data82
        assert_eq!(packed.len(), 13 + 1 + 34 + 1 + 82);
        assert_eq!(&packed[..10], &[0xAA; 10]);
        assert_eq!(packed[13], 0x00);
        assert_eq!(packed[14], 0x01);
        assert_eq!(packed[48], 0x52);
        assert_eq!(&packed[49..], &[0x55; 82]);
    }

    #[test]
    fn test_into_signed_transaction() {
        let rec = full_record();
        let expected_hex = hex::encode(rec.packed_trx().unwrap());
        let trx = rec.into_signed_transaction().unwrap();
        assert_eq!(trx.packed_trx, expected_hex);
        assert!(trx.signatures[0].starts_with("SIG_K1_"));
        assert!(!trx.compression);
    }

    #[test]
    fn test_status_line_wording() {
        let mut rec = TrxRecord::new(0);
        rec.set_tapos(1, &[0; 10]);
        rec.set_action([0; 4]);
        assert_eq!(
            rec.status_line(),
            "has tapos, has action, needs data, needs signature"
        );
    }

    #[test]
    fn test_introspection_serializes_hex() {
        let rec = full_record();
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["tapos"].as_str().unwrap().len(), 26);
        assert_eq!(json["data"].as_str().unwrap(), hex::encode([0x55u8; 82]));
        assert_eq!(json["chain"], 1);
    }
}
