//! The transaction reassembler.
//!
//! Consumes the channel events of one uplink payload, applies each fragment
//! to the owning device's record table, and reports what the payload
//! produced: completed transactions, a TAPOS request, or a still-pending
//! status. Fragments decoded before a decoder failure stay committed.

use bytes::Bytes;
use elpp_codec::{ChannelEvent, CodecError, Engine, Value};
use serde::Serialize;
use shared_types::{ChainId, SignedTransaction, TrxId, CHAIN_ID_MASK, TRX_ID_MASK};
use thiserror::Error;
use tracing::{debug, trace};

use crate::channels::{self, SIGNATURE_WIRE_LEN};
use crate::device::DeviceState;

/// Decode errors surfaced to the ingress. Partial state already committed
/// to the device table is retained.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReassemblyError {
    /// The payload failed in the codec (unknown channel, short buffer,
    /// misalignment).
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A decoded fragment did not have the value shape its channel promises.
    #[error("malformed {channel} fragment: {reason}")]
    MalformedFragment {
        channel: &'static str,
        reason: &'static str,
    },
}

/// A fully reassembled transaction, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedTransaction {
    pub chain: ChainId,
    pub trx_id: TrxId,
    pub trx: SignedTransaction,
}

/// A device asking for fresh TAPOS over channel 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaposRequest {
    pub chain_id: ChainId,
    pub req_id: u8,
}

/// Reassembly progress for the records this payload touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReassemblyStatus {
    lines: Vec<String>,
}

impl ReassemblyStatus {
    fn push(&mut self, trx_id: TrxId, line: String) {
        self.lines.push(format!("trx {trx_id}: {line}"));
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl std::fmt::Display for ReassemblyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.lines.is_empty() {
            f.write_str("no fragments")
        } else {
            f.write_str(&self.lines.join("; "))
        }
    }
}

/// What one uplink payload produced.
///
/// A payload can in the degenerate case complete more than one transaction
/// (the final fragments of two trx ids back to back), so `Complete` carries
/// them all. A payload mixing completions and TAPOS requests resolves in
/// favor of the completions.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeResult {
    Complete(Vec<CompletedTransaction>),
    TaposRequest(TaposRequest),
    Incomplete(ReassemblyStatus),
}

/// Stateless decoder over a device's record table.
#[derive(Debug)]
pub struct Reassembler {
    engine: Engine,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            engine: channels::uplink_engine(),
        }
    }

    /// Decode one uplink payload against a device's state.
    ///
    /// Every cleanly decoded fragment is committed before an error is
    /// reported, so a trailing unknown channel does not roll back the
    /// fragments in front of it.
    pub fn decode(
        &self,
        device: &mut DeviceState,
        payload: &Bytes,
        now_epoch: u64,
    ) -> Result<DecodeResult, ReassemblyError> {
        let (events, failure) = match self.engine.decode(payload) {
            Ok(events) => (events, None),
            Err(fail) => (fail.decoded, Some(fail.error)),
        };

        let mut completed = Vec::new();
        let mut tapos_request = None;
        let mut touched: Vec<TrxId> = Vec::new();

        for event in events {
            self.apply(
                device,
                event,
                now_epoch,
                &mut completed,
                &mut tapos_request,
                &mut touched,
            )?;
        }

        if let Some(error) = failure {
            return Err(error.into());
        }
        if !completed.is_empty() {
            return Ok(DecodeResult::Complete(completed));
        }
        if let Some(request) = tapos_request {
            return Ok(DecodeResult::TaposRequest(request));
        }

        // Progress reflects the final state of every record this payload
        // touched (completed ones are gone from the table already).
        let mut status = ReassemblyStatus::default();
        for trx_id in touched {
            if let Some(record) = device.record(trx_id) {
                status.push(trx_id, record.status_line());
            }
        }
        Ok(DecodeResult::Incomplete(status))
    }

    fn apply(
        &self,
        device: &mut DeviceState,
        event: ChannelEvent,
        now_epoch: u64,
        completed: &mut Vec<CompletedTransaction>,
        tapos_request: &mut Option<TaposRequest>,
        touched: &mut Vec<TrxId>,
    ) -> Result<(), ReassemblyError> {
        let channel = event.channel;
        trace!(channel = channels::channel_name(channel), "fragment");

        if channel == channels::TAPOS_REQUEST {
            let chain_id = expect_u8(&event, 0)? & CHAIN_ID_MASK;
            let req_id = expect_u8(&event, 1)?;
            tapos_request.get_or_insert(TaposRequest { chain_id, req_id });
            return Ok(());
        }

        let trx_id = expect_u8(&event, 0)? & TRX_ID_MASK;
        if !touched.contains(&trx_id) {
            touched.push(trx_id);
        }
        let record = device.record_mut(trx_id, now_epoch);

        let applied = match channel {
            channels::TAPOS => {
                let chain = expect_u8(&event, 1)? & CHAIN_ID_MASK;
                let wire = expect_bytes(&event, 2)?;
                record.set_tapos(chain, wire)
            }
            channels::ACTION => {
                let names = [
                    expect_name(&event, 1)?,
                    expect_name(&event, 2)?,
                    expect_name(&event, 3)?,
                    expect_name(&event, 4)?,
                ];
                record.set_action(names)
            }
            channels::SERIALIZED_ACTION => {
                let data = expect_bytes(&event, 1)?;
                record.set_data(data)
            }
            channels::SIGNATURE => {
                let raw = expect_bytes(&event, 1)?;
                let sig: &[u8; SIGNATURE_WIRE_LEN] =
                    raw.as_ref()
                        .try_into()
                        .map_err(|_| ReassemblyError::MalformedFragment {
                        channel: "SIGNATURE",
                        reason: "signature is not 65 bytes",
                    })?;
                record.set_signature(sig)
            }
            other => {
                // The uplink engine only yields registered channels.
                return Err(CodecError::ChannelNotFound(other).into());
            }
        };
        if !applied {
            debug!(
                trx_id,
                channel = channels::channel_name(channel),
                "duplicate fragment ignored"
            );
        }

        if record.is_complete() {
            // Remove before returning: the table never holds a complete
            // record.
            let record = device
                .take_record(trx_id)
                .ok_or(ReassemblyError::MalformedFragment {
                    channel: channels::channel_name(channel),
                    reason: "complete record vanished",
                })?;
            let chain = record.chain;
            let trx = record
                .into_signed_transaction()
                .ok_or(ReassemblyError::MalformedFragment {
                    channel: channels::channel_name(channel),
                    reason: "complete record failed to pack",
                })?;
            debug!(trx_id, chain, "transaction reassembled");
            completed.push(CompletedTransaction { chain, trx_id, trx });
        }
        Ok(())
    }
}

fn expect_u8(event: &ChannelEvent, index: usize) -> Result<u8, ReassemblyError> {
    value_at(event, index)?
        .as_u8()
        .ok_or(ReassemblyError::MalformedFragment {
            channel: channels::channel_name(event.channel),
            reason: "expected a u8 field",
        })
}

fn expect_name(event: &ChannelEvent, index: usize) -> Result<u64, ReassemblyError> {
    value_at(event, index)?
        .as_name()
        .ok_or(ReassemblyError::MalformedFragment {
            channel: channels::channel_name(event.channel),
            reason: "expected a name field",
        })
}

fn expect_bytes(event: &ChannelEvent, index: usize) -> Result<&Bytes, ReassemblyError> {
    value_at(event, index)?
        .as_bytes()
        .ok_or(ReassemblyError::MalformedFragment {
            channel: channels::channel_name(event.channel),
            reason: "expected a bytes field",
        })
}

fn value_at(event: &ChannelEvent, index: usize) -> Result<&Value, ReassemblyError> {
    event
        .values
        .get(index)
        .ok_or(ReassemblyError::MalformedFragment {
            channel: channels::channel_name(event.channel),
            reason: "fragment too short",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{uplink_engine, ACTION, SERIALIZED_ACTION, SIGNATURE, TAPOS};

    fn tapos_frame(trx_id: u8, chain: u8, body: [u8; 10]) -> Vec<u8> {
        uplink_engine()
            .encode(
                TAPOS,
                &[
                    Value::U8(trx_id),
                    Value::U8(chain),
                    Value::Bytes(Bytes::copy_from_slice(&body)),
                ],
            )
            .unwrap()
    }

    fn action_frame(trx_id: u8, names: [u64; 4]) -> Vec<u8> {
        uplink_engine()
            .encode(
                ACTION,
                &[
                    Value::U8(trx_id),
                    Value::Name(names[0]),
                    Value::Name(names[1]),
                    Value::Name(names[2]),
                    Value::Name(names[3]),
                ],
            )
            .unwrap()
    }

    fn data_frame(trx_id: u8, data: &[u8]) -> Vec<u8> {
        uplink_engine()
            .encode(
                SERIALIZED_ACTION,
                &[Value::U8(trx_id), Value::Bytes(Bytes::copy_from_slice(data))],
            )
            .unwrap()
    }

    fn signature_frame(trx_id: u8, sig: [u8; 65]) -> Vec<u8> {
        uplink_engine()
            .encode(
                SIGNATURE,
                &[Value::U8(trx_id), Value::Bytes(Bytes::copy_from_slice(&sig))],
            )
            .unwrap()
    }

    fn decode(
        reassembler: &Reassembler,
        device: &mut DeviceState,
        payload: Vec<u8>,
    ) -> Result<DecodeResult, ReassemblyError> {
        reassembler.decode(device, &Bytes::from(payload), 1_000)
    }

    #[test]
    fn test_tapos_and_action_in_one_uplink() {
        let reassembler = Reassembler::new();
        let mut device = DeviceState::default();

        let mut payload = tapos_frame(5, 1, [0xAB; 10]);
        payload.extend(action_frame(5, [1, 2, 3, 4]));

        match decode(&reassembler, &mut device, payload).unwrap() {
            DecodeResult::Incomplete(status) => {
                assert_eq!(
                    status.to_string(),
                    "trx 5: has tapos, has action, needs data, needs signature"
                );
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(device.record(5).unwrap().chain, 1);
    }

    #[test]
    fn test_data_then_signature_completes() {
        let reassembler = Reassembler::new();
        let mut device = DeviceState::default();

        let mut first = tapos_frame(5, 1, [0xAB; 10]);
        first.extend(action_frame(5, [1, 2, 3, 4]));
        decode(&reassembler, &mut device, first).unwrap();

        let mut second = data_frame(5, &[0x77; 82]);
        let mut sig = [0u8; 65];
        sig[0] = 1;
        second.extend(signature_frame(5, sig));

        match decode(&reassembler, &mut device, second).unwrap() {
            DecodeResult::Complete(done) => {
                assert_eq!(done.len(), 1);
                assert_eq!(done[0].chain, 1);
                assert_eq!(done[0].trx_id, 5);
                let trx = &done[0].trx;
                assert!(trx.signatures[0].starts_with("SIG_K1_"));
                // tapos13 || 0x00 || action34 || 0x52 || data82
                assert_eq!(trx.packed_trx.len(), 2 * (13 + 1 + 34 + 1 + 82));
                assert_eq!(&trx.packed_trx[96..98], "52");
            }
            other => panic!("unexpected result {other:?}"),
        }
        // Completion removed the record from the table.
        assert_eq!(device.in_flight(), 0);
    }

    #[test]
    fn test_fragment_idempotence() {
        let reassembler = Reassembler::new();
        let mut device = DeviceState::default();

        let payload = tapos_frame(2, 1, [0x11; 10]);
        decode(&reassembler, &mut device, payload.clone()).unwrap();
        let once = device.record(2).unwrap().clone();

        decode(&reassembler, &mut device, payload).unwrap();
        let twice = device.record(2).unwrap();
        assert_eq!(twice.chain, once.chain);
        assert_eq!(twice.tapos, once.tapos);
    }

    #[test]
    fn test_chain_fixed_by_first_tapos() {
        let reassembler = Reassembler::new();
        let mut device = DeviceState::default();

        decode(&reassembler, &mut device, tapos_frame(2, 1, [0x11; 10])).unwrap();
        decode(&reassembler, &mut device, tapos_frame(2, 3, [0x22; 10])).unwrap();

        let rec = device.record(2).unwrap();
        assert_eq!(rec.chain, 1);
        assert_eq!(rec.tapos.unwrap()[0], 0x11);
    }

    #[test]
    fn test_unknown_channel_keeps_prior_fragments() {
        let reassembler = Reassembler::new();
        let mut device = DeviceState::default();

        let mut payload = tapos_frame(6, 1, [0xCC; 10]);
        payload.push(0x7F);

        let err = decode(&reassembler, &mut device, payload).unwrap_err();
        assert_eq!(
            err,
            ReassemblyError::Codec(CodecError::ChannelNotFound(0x7F))
        );
        // The TAPOS fragment before the unknown byte stays committed.
        assert!(device.record(6).unwrap().tapos.is_some());
    }

    #[test]
    fn test_tapos_request_uplink() {
        let reassembler = Reassembler::new();
        let mut device = DeviceState::default();

        let payload = uplink_engine()
            .encode(channels::TAPOS_REQUEST, &[Value::U8(1), Value::U8(42)])
            .unwrap();

        match decode(&reassembler, &mut device, payload).unwrap() {
            DecodeResult::TaposRequest(req) => {
                assert_eq!(req.chain_id, 1);
                assert_eq!(req.req_id, 42);
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(device.in_flight(), 0);
    }

    #[test]
    fn test_two_transactions_complete_in_one_payload() {
        let reassembler = Reassembler::new();
        let mut device = DeviceState::default();

        for trx_id in [1u8, 2] {
            let mut setup = tapos_frame(trx_id, 1, [trx_id; 10]);
            setup.extend(action_frame(trx_id, [9, 9, 9, 9]));
            setup.extend(data_frame(trx_id, b"payload"));
            decode(&reassembler, &mut device, setup).unwrap();
        }

        let mut finals = signature_frame(1, [3u8; 65]);
        finals.extend(signature_frame(2, [4u8; 65]));

        match decode(&reassembler, &mut device, finals).unwrap() {
            DecodeResult::Complete(done) => {
                let ids: Vec<u8> = done.iter().map(|c| c.trx_id).collect();
                assert_eq!(ids, vec![1, 2]);
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(device.in_flight(), 0);
    }

    #[test]
    fn test_completion_atomicity_under_duplicates() {
        // A duplicate of the completing fragment after completion starts a
        // fresh record instead of resurrecting the finished one.
        let reassembler = Reassembler::new();
        let mut device = DeviceState::default();

        let mut all = tapos_frame(3, 1, [0xEE; 10]);
        all.extend(action_frame(3, [1, 2, 3, 4]));
        all.extend(data_frame(3, b"d"));
        all.extend(signature_frame(3, [1u8; 65]));
        decode(&reassembler, &mut device, all).unwrap();
        assert_eq!(device.in_flight(), 0);

        decode(&reassembler, &mut device, signature_frame(3, [2u8; 65])).unwrap();
        let fresh = device.record(3).unwrap();
        assert!(fresh.signature.is_some());
        assert!(fresh.tapos.is_none());
    }

    #[test]
    fn test_truncated_fragment_is_short_buffer() {
        let reassembler = Reassembler::new();
        let mut device = DeviceState::default();

        let mut payload = tapos_frame(1, 1, [0; 10]);
        payload.truncate(payload.len() - 4);

        let err = decode(&reassembler, &mut device, payload).unwrap_err();
        assert!(matches!(
            err,
            ReassemblyError::Codec(CodecError::ShortBuffer { .. })
        ));
        assert_eq!(device.in_flight(), 0);
    }
}
