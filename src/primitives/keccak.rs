//! Scalar sponge wrappers around `tiny-keccak`'s SHAKE/KMAC.
//!
//! Customization is never a separate cSHAKE field here: every derivation
//! in this crate folds its customization string directly into the
//! absorbed input bytes, so a plain SHAKE (unkeyed XOF) and a plain KMAC
//! (keyed, with its own customization parameter) are exactly the right
//! shapes. M512 has no NIST-standard SHAKE512/KMAC512 counterpart; it is
//! composed from two domain-separated 256-bit instances (see `Wide`
//! below and `DESIGN.md`).

use tiny_keccak::{Hasher, Kmac, Shake, Xof};

/// A sponge that can be drained incrementally, in arbitrary-size chunks.
///
/// Each call continues squeezing from where the previous call left off;
/// callers never request more bytes than the target range they need, so
/// the underlying sponge only ever produces the minimum number of whole
/// blocks that cover what was asked for.
pub trait XofSqueeze {
    fn squeeze(&mut self, out: &mut [u8]);
}

pub(crate) struct Scalar128(Shake);
pub(crate) struct Scalar256(Shake);

/// Two domain-separated SHAKE256 lanes standing in for a 512-bit XOF.
pub(crate) struct Wide512 {
    lo: Shake,
    hi: Shake,
}

impl Scalar128 {
    pub(crate) fn absorb(parts: &[&[u8]]) -> Self {
        let mut shake = Shake::v128();
        for part in parts {
            shake.update(part);
        }
        Self(shake)
    }
}

impl XofSqueeze for Scalar128 {
    fn squeeze(&mut self, out: &mut [u8]) {
        self.0.squeeze(out);
    }
}

impl Scalar256 {
    pub(crate) fn absorb(parts: &[&[u8]]) -> Self {
        let mut shake = Shake::v256();
        for part in parts {
            shake.update(part);
        }
        Self(shake)
    }
}

impl XofSqueeze for Scalar256 {
    fn squeeze(&mut self, out: &mut [u8]) {
        self.0.squeeze(out);
    }
}

impl Wide512 {
    pub(crate) fn absorb(parts: &[&[u8]]) -> Self {
        let mut lo = Shake::v256();
        let mut hi = Shake::v256();
        for part in parts {
            lo.update(part);
            hi.update(part);
        }
        // Lane-distinguishing byte keeps the two 256-bit streams independent.
        lo.update(&[0x00]);
        hi.update(&[0x01]);
        Self { lo, hi }
    }
}

impl XofSqueeze for Wide512 {
    fn squeeze(&mut self, out: &mut [u8]) {
        debug_assert!(out.len() % 2 == 0, "M512 outputs are always even-length");
        let half = out.len() / 2;
        let (first, second) = out.split_at_mut(half);
        self.lo.squeeze(first);
        self.hi.squeeze(second);
    }
}

pub(crate) fn mac_128(tag: &mut [u8], message: &[u8], key: &[u8], customization: &[u8]) {
    let mut kmac = Kmac::v128(key, customization);
    kmac.update(message);
    kmac.finalize(tag);
}

pub(crate) fn mac_256(tag: &mut [u8], message: &[u8], key: &[u8], customization: &[u8]) {
    let mut kmac = Kmac::v256(key, customization);
    kmac.update(message);
    kmac.finalize(tag);
}

/// Tag is split in half between two domain-separated KMAC256 instances,
/// mirroring `Wide512`'s XOF composition.
pub(crate) fn mac_512(tag: &mut [u8], message: &[u8], key: &[u8], customization: &[u8]) {
    debug_assert!(tag.len() % 2 == 0, "M512 tags are always even-length");
    let half = tag.len() / 2;
    let (first, second) = tag.split_at_mut(half);

    let mut lo_custom = customization.to_vec();
    lo_custom.push(0x00);
    let mut kmac_lo = Kmac::v256(key, &lo_custom);
    kmac_lo.update(message);
    kmac_lo.finalize(first);

    let mut hi_custom = customization.to_vec();
    hi_custom.push(0x01);
    let mut kmac_hi = Kmac::v256(key, &hi_custom);
    kmac_hi.update(message);
    kmac_hi.finalize(second);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_xof_is_deterministic() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        Scalar256::absorb(&[b"input"]).squeeze(&mut a);
        Scalar256::absorb(&[b"input"]).squeeze(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn scalar_xof_is_input_sensitive() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        Scalar256::absorb(&[b"input-a"]).squeeze(&mut a);
        Scalar256::absorb(&[b"input-b"]).squeeze(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn xof_stream_squeeze_is_continuation() {
        let mut one_shot = [0u8; 64];
        Scalar256::absorb(&[b"stream"]).squeeze(&mut one_shot);

        let mut split = [0u8; 64];
        let mut stream = Scalar256::absorb(&[b"stream"]);
        stream.squeeze(&mut split[0..32]);
        stream.squeeze(&mut split[32..64]);
        assert_eq!(one_shot, split);
    }

    #[test]
    fn wide512_lanes_are_independent() {
        let mut out = [0u8; 64];
        Wide512::absorb(&[b"wide"]).squeeze(&mut out);
        assert_ne!(&out[0..32], &out[32..64]);
    }

    #[test]
    fn mac_is_key_and_customization_sensitive() {
        let mut t1 = [0u8; 32];
        let mut t2 = [0u8; 32];
        mac_256(&mut t1, b"msg", b"key-a", b"custom");
        mac_256(&mut t2, b"msg", b"key-b", b"custom");
        assert_ne!(t1, t2);

        let mut t3 = [0u8; 32];
        mac_256(&mut t3, b"msg", b"key-a", b"other-custom");
        assert_ne!(t1, t3);
    }

    #[test]
    fn mac_512_halves_are_independent() {
        let mut tag = [0u8; 64];
        mac_512(&mut tag, b"msg", &[0x11; 64], b"custom");
        assert_ne!(&tag[0..32], &tag[32..64]);
    }
}
