//! Security-level dispatch: the three HKDS modes (M128/M256/M512) as
//! compile-time types rather than a runtime enum, so the hot derivation
//! path carries no branch on which sponge width is in play.

mod keccak;

use keccak::{Scalar128, Scalar256, Wide512, XofSqueeze};

/// Mode tag byte carried in the KSN's PRF-mode field (spec.md §6).
pub const MODE_TAG_M128: u8 = 0x09;
pub const MODE_TAG_M256: u8 = 0x0A;
pub const MODE_TAG_M512: u8 = 0x0B;

/// A single HKDS security level: key/tag width plus the formal names
/// folded into every derivation as domain separation.
pub trait SecurityLevel: Clone + Copy + Send + Sync + 'static {
    /// Width in bytes of every key, token, and derived stream slice.
    const KEY_BYTES: usize;
    /// Sponge rate in bytes, used only for capacity-planning squeezes.
    const RATE_BYTES: usize;
    /// Mode tag carried in the KSN.
    const MODE_TAG: u8;
    /// 7-byte name folded into CTOK/derivation inputs.
    const FORMAL_NAME: [u8; 7];
    /// 7-byte name folded into TMS/MAC inputs.
    const MAC_NAME: [u8; 7];

    /// Streaming handle for this level's XOF, already absorbed.
    type Stream: XofSqueeze;

    /// One-shot XOF: absorb `parts` in order, squeeze exactly `out.len()` bytes.
    fn xof(out: &mut [u8], parts: &[&[u8]]) {
        Self::xof_stream(parts).squeeze(out);
    }

    /// Open a streaming XOF over `parts`, for callers that need to
    /// squeeze an output in more than one slice (e.g. index-addressed
    /// transaction-key-stream derivation).
    fn xof_stream(parts: &[&[u8]]) -> Self::Stream;

    /// Keyed MAC: `tag` is filled in full.
    fn mac(tag: &mut [u8], message: &[u8], key: &[u8], customization: &[u8]);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Mode128;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Mode256;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Mode512;

impl SecurityLevel for Mode128 {
    const KEY_BYTES: usize = 16;
    const RATE_BYTES: usize = 168; // SHAKE128 rate
    const MODE_TAG: u8 = MODE_TAG_M128;
    const FORMAL_NAME: [u8; 7] = *b"HKDS128";
    const MAC_NAME: [u8; 7] = *b"HKMAC12";

    type Stream = Scalar128;

    fn xof_stream(parts: &[&[u8]]) -> Self::Stream {
        Scalar128::absorb(parts)
    }

    fn mac(tag: &mut [u8], message: &[u8], key: &[u8], customization: &[u8]) {
        keccak::mac_128(tag, message, key, customization);
    }
}

impl SecurityLevel for Mode256 {
    const KEY_BYTES: usize = 32;
    const RATE_BYTES: usize = 136; // SHAKE256 rate
    const MODE_TAG: u8 = MODE_TAG_M256;
    const FORMAL_NAME: [u8; 7] = *b"HKDS256";
    const MAC_NAME: [u8; 7] = *b"HKMAC25";

    type Stream = Scalar256;

    fn xof_stream(parts: &[&[u8]]) -> Self::Stream {
        Scalar256::absorb(parts)
    }

    fn mac(tag: &mut [u8], message: &[u8], key: &[u8], customization: &[u8]) {
        keccak::mac_256(tag, message, key, customization);
    }
}

impl SecurityLevel for Mode512 {
    const KEY_BYTES: usize = 64;
    const RATE_BYTES: usize = 136; // composed from two SHAKE256 lanes
    const MODE_TAG: u8 = MODE_TAG_M512;
    const FORMAL_NAME: [u8; 7] = *b"HKDS512";
    const MAC_NAME: [u8; 7] = *b"HKMAC51";

    type Stream = Wide512;

    fn xof_stream(parts: &[&[u8]]) -> Self::Stream {
        Wide512::absorb(parts)
    }

    fn mac(tag: &mut [u8], message: &[u8], key: &[u8], customization: &[u8]) {
        keccak::mac_512(tag, message, key, customization);
    }
}
