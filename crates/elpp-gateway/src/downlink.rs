//! TAPOS response downlinks.
//!
//! A channel-4 uplink is a device asking for fresh reference-block
//! metadata. The gateway answers over the network server's downlink URL
//! with an ELPP frame carrying the chain, the request id it is answering,
//! the gateway receive time, and the chain's current TAPOS.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use elpp_codec::{CodecError, Value};
use elpp_reassembly::{channels, TaposRequest};
use elpp_tapos::{DownlinkMessage, Tapos};
use shared_types::time;

/// Encode the channel-4 TAPOS response frame.
pub fn encode_tapos_response(
    request: TaposRequest,
    received_at_ms: u64,
    tapos: &Tapos,
) -> Result<Vec<u8>, CodecError> {
    let (secs, millis) = time::split_millis(received_at_ms);
    channels::downlink_engine().encode(
        channels::TAPOS_REQUEST,
        &[
            Value::U8(request.chain_id),
            Value::U8(request.req_id),
            Value::U32(secs),
            Value::U16(millis),
            Value::U16(tapos.ref_block_num),
            Value::U32(tapos.ref_block_prefix),
        ],
    )
}

/// Wrap an encoded frame into the network server's downlink POST body.
pub fn downlink_message(frame: &[u8], elpp_port: u16) -> DownlinkMessage {
    DownlinkMessage {
        payload_raw: BASE64.encode(frame),
        port: elpp_port,
        confirmed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_frame_layout() {
        let tapos = Tapos {
            acq_epoch: 0,
            ref_block_num: 0x1234,
            ref_block_prefix: 0xDEAD_BEEF,
        };
        let request = TaposRequest {
            chain_id: 1,
            req_id: 42,
        };
        let frame = encode_tapos_response(request, 1_700_000_123_456, &tapos).unwrap();

        // selector, chain, req, u32 secs, u16 ms, u16 num, u32 prefix
        assert_eq!(frame.len(), 1 + 1 + 1 + 4 + 2 + 2 + 4);
        assert_eq!(frame[0], channels::TAPOS_REQUEST);
        assert_eq!(frame[1], 1);
        assert_eq!(frame[2], 42);
        assert_eq!(
            u32::from_le_bytes(frame[3..7].try_into().unwrap()),
            1_700_000_123
        );
        assert_eq!(u16::from_le_bytes(frame[7..9].try_into().unwrap()), 456);
        assert_eq!(u16::from_le_bytes(frame[9..11].try_into().unwrap()), 0x1234);
        assert_eq!(
            u32::from_le_bytes(frame[11..15].try_into().unwrap()),
            0xDEAD_BEEF
        );
    }

    #[test]
    fn test_downlink_message_wrapping() {
        let message = downlink_message(&[0x04, 0x01], 8);
        assert_eq!(message.port, 8);
        assert!(!message.confirmed);
        assert_eq!(BASE64.decode(message.payload_raw).unwrap(), vec![0x04, 0x01]);
    }
}
