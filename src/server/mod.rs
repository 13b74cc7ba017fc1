//! Server-side derivation tree: Master Derivation Key → Embedded Device
//! Key → per-epoch Token → transaction key stream. Scalar path; see
//! [`batch8`] and [`batch64`] for the lane- and thread-parallel forms.

pub mod batch64;
pub mod batch8;

use core::marker::PhantomData;
use rand::RngCore;
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::constants::{CTOK_SIZE, DID_SIZE, MSG_LEN, TMS_SIZE};
use crate::entropy;
use crate::error::{HkdsError, Result};
use crate::ksn::KeySerialNumber;
use crate::primitives::SecurityLevel;

/// Server master secret set: `{ BDK, STK, KID }`. Never leaves the
/// server; read-only once constructed, zeroized on drop.
pub struct MasterDerivationKey<L: SecurityLevel> {
    bdk: Vec<u8>,
    stk: Vec<u8>,
    kid: [u8; 4],
    _level: PhantomData<L>,
}

impl<L: SecurityLevel> MasterDerivationKey<L> {
    /// Draws `BDK ‖ STK` from `rng` as a single `2*L`-byte block.
    ///
    /// The entropy source contract (spec.md §6) requires `rng` to fill
    /// the buffer fully and never fail short; a caller supplying a
    /// faulty RNG has violated that contract, not triggered a
    /// recoverable `HkdsError`.
    pub fn generate(rng: &mut impl RngCore, kid: [u8; 4]) -> Self {
        let mut block = vec![0u8; 2 * L::KEY_BYTES];
        rng.fill_bytes(&mut block);
        let (bdk, stk) = block.split_at(L::KEY_BYTES);
        let mdk = Self {
            bdk: bdk.to_vec(),
            stk: stk.to_vec(),
            kid,
            _level: PhantomData,
        };
        block.zeroize();
        info!(kid = ?mdk.kid, "generated master derivation key");
        mdk
    }

    /// Generate from OS entropy (the common provisioning-time path).
    pub fn generate_from_os_entropy(kid: [u8; 4]) -> Self {
        let mut block = vec![0u8; 2 * L::KEY_BYTES];
        entropy::fill_random(&mut block);
        let (bdk, stk) = block.split_at(L::KEY_BYTES);
        let mdk = Self {
            bdk: bdk.to_vec(),
            stk: stk.to_vec(),
            kid,
            _level: PhantomData,
        };
        block.zeroize();
        info!(kid = ?mdk.kid, "generated master derivation key from OS entropy");
        mdk
    }

    pub fn kid(&self) -> [u8; 4] {
        self.kid
    }

    /// Raw BDK bytes, for out-of-band device provisioning flows that
    /// call the standalone [`generate_edk`] directly instead of going
    /// through a [`ServerState`].
    pub fn bdk(&self) -> &[u8] {
        &self.bdk
    }
}

impl<L: SecurityLevel> Drop for MasterDerivationKey<L> {
    fn drop(&mut self) {
        self.bdk.zeroize();
        self.stk.zeroize();
    }
}

impl<L: SecurityLevel> core::fmt::Debug for MasterDerivationKey<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MasterDerivationKey")
            .field("kid", &self.kid)
            .field("bdk", &"[REDACTED]")
            .field("stk", &"[REDACTED]")
            .finish()
    }
}

/// `EDK = XOF(DID ‖ BDK, out_len=L)`. Standalone so callers can
/// provision a device's embedded key out-of-band, ahead of first
/// token issuance.
pub fn generate_edk<L: SecurityLevel>(bdk: &[u8], did: &[u8; DID_SIZE]) -> Vec<u8> {
    let mut edk = vec![0u8; L::KEY_BYTES];
    L::xof(&mut edk, &[did, bdk]);
    edk
}

fn device_id(ksn: &KeySerialNumber) -> [u8; DID_SIZE] {
    let mut did = [0u8; DID_SIZE];
    did.copy_from_slice(ksn.device_id());
    did
}

fn build_ctok<L: SecurityLevel>(ksn: &KeySerialNumber, cache_size: u32) -> Vec<u8> {
    let mut ctok = Vec::with_capacity(CTOK_SIZE);
    ctok.extend_from_slice(&ksn.epoch(cache_size).to_be_bytes());
    ctok.extend_from_slice(&L::FORMAL_NAME);
    ctok.extend_from_slice(ksn.device_id());
    ctok
}

fn build_tms<L: SecurityLevel>(ksn: &KeySerialNumber) -> Vec<u8> {
    let mut tms = Vec::with_capacity(TMS_SIZE);
    tms.extend_from_slice(ksn.as_bytes());
    tms.extend_from_slice(&L::MAC_NAME);
    tms
}

/// Ephemeral per-request server state: a KSN plus a borrow of the MDK
/// it was issued under. Stateless across calls beyond that borrow.
pub struct ServerState<'mdk, L: SecurityLevel> {
    ksn: KeySerialNumber,
    mdk: &'mdk MasterDerivationKey<L>,
    cache_size: u32,
}

impl<'mdk, L: SecurityLevel> ServerState<'mdk, L> {
    /// Validates the KSN's mode-tag byte against `L::MODE_TAG` once, at
    /// construction, rather than on every derivation call.
    pub fn new(ksn: KeySerialNumber, mdk: &'mdk MasterDerivationKey<L>, cache_size: u32) -> Result<Self> {
        if ksn.mode_tag() != L::MODE_TAG {
            return Err(HkdsError::ConfigMismatch("KSN mode tag does not match SecurityLevel"));
        }
        Ok(Self {
            ksn,
            mdk,
            cache_size,
        })
    }

    pub fn ksn(&self) -> &KeySerialNumber {
        &self.ksn
    }

    /// `Token ← XOF(CTOK ‖ STK)`, re-derived fresh every call — the
    /// server holds no per-epoch state beyond `(STK, CTOK)`.
    fn derive_token(&self, ctok: &[u8]) -> Vec<u8> {
        let mut token = vec![0u8; L::KEY_BYTES];
        L::xof(&mut token, &[ctok, &self.mdk.stk]);
        token
    }

    /// Encrypts and authenticates a fresh token for the current epoch.
    /// `ETOK = ciphertext(L) ‖ tag(L)`.
    pub fn encrypt_token(&self) -> Vec<u8> {
        let did = device_id(&self.ksn);
        let edk = generate_edk::<L>(&self.mdk.bdk, &did);
        let ctok = build_ctok::<L>(&self.ksn, self.cache_size);
        let token = self.derive_token(&ctok);

        let mut key_stream = vec![0u8; L::KEY_BYTES];
        L::xof(&mut key_stream, &[&ctok, &edk]);

        let mut etok = vec![0u8; 2 * L::KEY_BYTES];
        let (ciphertext, tag) = etok.split_at_mut(L::KEY_BYTES);
        for i in 0..L::KEY_BYTES {
            ciphertext[i] = key_stream[i] ^ token[i];
        }

        let tms = build_tms::<L>(&self.ksn);
        L::mac(tag, ciphertext, &edk, &tms);

        let mut edk = edk;
        edk.zeroize();
        key_stream.zeroize();
        let mut token = token;
        token.zeroize();

        info!(counter = self.ksn.counter(), "issued token");
        etok
    }

    /// Squeezes `slice_len` bytes of the transaction-key stream at
    /// `index`'s position, using the minimum number of whole blocks
    /// that cover `index*MsgLen + slice_len` bytes; earlier blocks are
    /// discarded.
    fn derive_transaction_key(&self, index: u32, slice_len: usize) -> Vec<u8> {
        let did = device_id(&self.ksn);
        let edk = generate_edk::<L>(&self.mdk.bdk, &did);
        let ctok = build_ctok::<L>(&self.ksn, self.cache_size);
        let token = self.derive_token(&ctok);

        let target_len = index as usize * MSG_LEN + slice_len;
        let mut stream = vec![0u8; target_len];
        L::xof(&mut stream, &[&token, &edk]);

        let offset = index as usize * MSG_LEN;
        let slice = stream[offset..offset + slice_len].to_vec();

        let mut edk = edk;
        edk.zeroize();
        let mut token = token;
        token.zeroize();
        stream.zeroize();

        slice
    }

    /// Decrypts one message slot; no authentication.
    pub fn decrypt_message(&self, ciphertext: &[u8]) -> Vec<u8> {
        debug_assert_eq!(ciphertext.len(), MSG_LEN);
        let index = self.ksn.slot(self.cache_size);
        let key = self.derive_transaction_key(index, MSG_LEN);
        let mut plaintext = vec![0u8; MSG_LEN];
        for i in 0..MSG_LEN {
            plaintext[i] = key[i] ^ ciphertext[i];
        }
        plaintext
    }

    /// Decrypts and verifies an authenticated message. Derives two
    /// consecutive transaction-key slots: the first as the stream key,
    /// the second as the MAC key, matching the client's two
    /// consecutive consumptions exactly.
    pub fn decrypt_verify_message(&self, ciphertext_and_tag: &[u8], data: &[u8]) -> (Vec<u8>, bool) {
        let tag_len = L::KEY_BYTES;
        debug_assert_eq!(ciphertext_and_tag.len(), MSG_LEN + tag_len);
        let (ciphertext, tag) = ciphertext_and_tag.split_at(MSG_LEN);

        let index = self.ksn.slot(self.cache_size);
        let two_keys = self.derive_transaction_key(index, 2 * MSG_LEN);
        let (stream_key, mac_key) = two_keys.split_at(MSG_LEN);

        let mut expected_tag = vec![0u8; tag_len];
        L::mac(&mut expected_tag, ciphertext, mac_key, data);

        let ok: bool = expected_tag.ct_eq(tag).into();
        if !ok {
            warn!(counter = self.ksn.counter(), "message authentication failed");
            return (vec![0u8; MSG_LEN], false);
        }

        let mut plaintext = vec![0u8; MSG_LEN];
        for i in 0..MSG_LEN {
            plaintext[i] = stream_key[i] ^ ciphertext[i];
        }
        (plaintext, true)
    }
}
