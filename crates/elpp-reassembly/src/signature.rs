//! Rendering raw 65-byte signatures into the chain's `SIG_K1_` string form.

use ripemd::{Digest, Ripemd160};

use crate::channels::SIGNATURE_WIRE_LEN;

/// Prefix of every rendered K1 signature.
pub const SIG_PREFIX: &str = "SIG_K1_";

/// Render a raw (i, r, s) signature as
/// `"SIG_K1_" + base58(sig || ripemd160(sig || "K1")[..4])`.
///
/// TODO: only the RIPEMD160-derived 4-byte checksum is applied here; confirm
/// against the chain's current signature-serialization rules before the
/// format is relied on for anything beyond submission.
pub fn render_sig_k1(sig: &[u8; SIGNATURE_WIRE_LEN]) -> String {
    let mut hasher = Ripemd160::new();
    hasher.update(sig);
    hasher.update(b"K1");
    let checksum = hasher.finalize();

    let mut wrapped = Vec::with_capacity(SIGNATURE_WIRE_LEN + 4);
    wrapped.extend_from_slice(sig);
    wrapped.extend_from_slice(&checksum[..4]);

    format!("{SIG_PREFIX}{}", bs58::encode(wrapped).into_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendering_is_prefixed_and_checksummed() {
        let mut sig = [0u8; SIGNATURE_WIRE_LEN];
        sig[0] = 1;
        for (i, b) in sig.iter_mut().enumerate().skip(1) {
            *b = i as u8;
        }

        let rendered = render_sig_k1(&sig);
        let body = rendered.strip_prefix(SIG_PREFIX).expect("prefix");

        let decoded = bs58::decode(body).into_vec().unwrap();
        assert_eq!(decoded.len(), SIGNATURE_WIRE_LEN + 4);
        assert_eq!(&decoded[..SIGNATURE_WIRE_LEN], &sig[..]);

        let mut hasher = Ripemd160::new();
        hasher.update(sig);
        hasher.update(b"K1");
        assert_eq!(&decoded[SIGNATURE_WIRE_LEN..], &hasher.finalize()[..4]);
    }

    #[test]
    fn test_distinct_signatures_render_distinct() {
        let a = render_sig_k1(&[1u8; SIGNATURE_WIRE_LEN]);
        let b = render_sig_k1(&[2u8; SIGNATURE_WIRE_LEN]);
        assert_ne!(a, b);
    }
}
