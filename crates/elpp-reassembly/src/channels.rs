//! Built-in ELPP channel IDs and their schemas.
//!
//! Channels 0-3 carry the four transaction fragments; channel 4 carries the
//! device-originated TAPOS request uplink and the gateway's TAPOS response
//! downlink.

use elpp_codec::{Engine, Schema};

/// TAPOS fragment: header, chain byte, 10 opaque TAPOS bytes.
pub const TAPOS: u8 = 0;

/// Action fragment: header, dapp/action names, permission/actor names.
pub const ACTION: u8 = 1;

/// Serialized-action fragment: header, length-prefixed action data.
pub const SERIALIZED_ACTION: u8 = 2;

/// Signature fragment: header, 65 signature bytes (i, r, s).
pub const SIGNATURE: u8 = 3;

/// Device TAPOS request (uplink) / gateway TAPOS response (downlink).
pub const TAPOS_REQUEST: u8 = 4;

/// Length of the opaque TAPOS payload on the wire.
pub const TAPOS_WIRE_LEN: usize = 10;

/// Length of a raw signature on the wire.
pub const SIGNATURE_WIRE_LEN: usize = 65;

/// Returns a human-readable name for a channel ID.
pub fn channel_name(id: u8) -> &'static str {
    match id {
        TAPOS => "TAPOS",
        ACTION => "ACTION",
        SERIALIZED_ACTION => "SERIALIZED-ACTION",
        SIGNATURE => "SIGNATURE",
        TAPOS_REQUEST => "TAPOS-REQUEST",
        _ => "UNKNOWN",
    }
}

/// The uplink channel map: everything a device may send.
pub fn uplink_engine() -> Engine {
    Engine::new()
        .with_channel(
            TAPOS,
            "TAPOS",
            Schema::seq(vec![
                Schema::u8(), // header, trx id in the low 3 bits
                Schema::u8(), // chain id in the low 3 bits
                Schema::fixed_bytes(TAPOS_WIRE_LEN),
            ]),
        )
        .with_channel(
            ACTION,
            "ACTION",
            Schema::seq(vec![
                Schema::u8(),
                Schema::seq(vec![Schema::name(), Schema::name()]), // dapp, action
                Schema::seq(vec![Schema::name(), Schema::name()]), // permission, actor
            ]),
        )
        .with_channel(
            SERIALIZED_ACTION,
            "SERIALIZED-ACTION",
            Schema::seq(vec![Schema::u8(), Schema::dyn_bytes()]),
        )
        .with_channel(
            SIGNATURE,
            "SIGNATURE",
            Schema::seq(vec![Schema::u8(), Schema::fixed_bytes(SIGNATURE_WIRE_LEN)]),
        )
        .with_channel(
            TAPOS_REQUEST,
            "TAPOS-REQUEST",
            Schema::seq(vec![Schema::u8(), Schema::u8()]), // chain id, request id
        )
}

/// The downlink channel map: the TAPOS response the gateway owes a device
/// after a channel-4 request.
pub fn downlink_engine() -> Engine {
    Engine::new().with_channel(
        TAPOS_REQUEST,
        "TAPOS-RESPONSE",
        Schema::seq(vec![
            Schema::u8(),  // chain id
            Schema::u8(),  // request id
            Schema::u32(), // gateway receive time, whole seconds
            Schema::u16(), // gateway receive time, millisecond remainder
            Schema::u16(), // ref_block_num
            Schema::u32(), // ref_block_prefix
        ]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uplink_channels_registered() {
        let engine = uplink_engine();
        for id in [TAPOS, ACTION, SERIALIZED_ACTION, SIGNATURE, TAPOS_REQUEST] {
            assert!(engine.channel_name(id).is_some(), "channel {id} missing");
        }
        assert_eq!(engine.channel_name(0x7F), None);
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(channel_name(SERIALIZED_ACTION), "SERIALIZED-ACTION");
        assert_eq!(channel_name(0x55), "UNKNOWN");
    }
}
