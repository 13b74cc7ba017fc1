//! Per-device client state: embedded device key, key serial number,
//! and a small cache of pre-derived transaction keys.

use core::marker::PhantomData;
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::constants::{CTOK_SIZE, DID_SIZE, MSG_LEN, TMS_SIZE};
use crate::error::{HkdsError, Result};
use crate::ksn::KeySerialNumber;
use crate::primitives::SecurityLevel;

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

/// `{ EDK, KSN, TKC[CacheSize], cache_empty }` — owned exclusively by
/// one device; not safe for concurrent mutation.
pub struct ClientState<L: SecurityLevel> {
    edk: Vec<u8>,
    ksn: KeySerialNumber,
    cache: Vec<Vec<u8>>,
    cache_empty: bool,
    cache_size: u32,
    _level: PhantomData<L>,
}

impl<L: SecurityLevel> ClientState<L> {
    /// Copies `EDK` and `DID` in; zeroes the transaction counter and
    /// the cache; marks the cache empty until a token is ingested.
    ///
    /// Validates `edk`'s length against `L::KEY_BYTES` and `did`'s
    /// mode-tag byte against `L::MODE_TAG` once, here, rather than on
    /// every derivation call.
    pub fn initialize(edk: Vec<u8>, did: [u8; DID_SIZE], cache_size: u32) -> Result<Self> {
        if edk.len() != L::KEY_BYTES {
            return Err(HkdsError::ConfigMismatch("EDK length does not match SecurityLevel::KEY_BYTES"));
        }
        let ksn = KeySerialNumber::new(&did, 0);
        if ksn.mode_tag() != L::MODE_TAG {
            return Err(HkdsError::ConfigMismatch("DID mode tag does not match SecurityLevel"));
        }
        Ok(Self {
            edk,
            ksn,
            cache: Vec::new(),
            cache_empty: true,
            cache_size,
            _level: PhantomData,
        })
    }

    pub fn ksn(&self) -> &KeySerialNumber {
        &self.ksn
    }

    pub fn cache_empty(&self) -> bool {
        self.cache_empty
    }

    /// Transaction keys remaining in the cache before it empties.
    pub fn keys_remaining(&self) -> u32 {
        if self.cache_empty {
            return 0;
        }
        self.cache_size - self.ksn.slot(self.cache_size)
    }

    /// Verifies `ETOK`'s MAC, then recovers `Token`. The MAC is
    /// checked on the ciphertext *before* the plaintext token is ever
    /// produced — the reverse of the server's encrypt-then-MAC order.
    pub fn decrypt_token(&self, etok: &[u8]) -> Result<Vec<u8>> {
        let tag_len = L::KEY_BYTES;
        if etok.len() != L::KEY_BYTES + tag_len {
            return Err(HkdsError::InvalidInput("ETOK has the wrong length"));
        }
        let (ciphertext, tag) = etok.split_at(L::KEY_BYTES);

        let tms = build_tms::<L>(&self.ksn);
        let mut expected_tag = vec![0u8; tag_len];
        L::mac(&mut expected_tag, ciphertext, &self.edk, &tms);

        let ok: bool = expected_tag.ct_eq(tag).into();
        if !ok {
            warn!(counter = self.ksn.counter(), "token authentication failed");
            return Err(HkdsError::AuthenticationFailed);
        }

        let ctok = build_ctok::<L>(&self.ksn, self.cache_size);
        let mut key_stream = vec![0u8; L::KEY_BYTES];
        L::xof(&mut key_stream, &[&ctok, &self.edk]);

        let mut token = vec![0u8; L::KEY_BYTES];
        for i in 0..L::KEY_BYTES {
            token[i] = key_stream[i] ^ ciphertext[i];
        }
        key_stream.zeroize();

        info!(counter = self.ksn.counter(), "decrypted token");
        Ok(token)
    }

    /// Expands `Token` into `CacheSize` transaction keys. Must only be
    /// called with the Token matching the current epoch
    /// (`counter / CacheSize`).
    pub fn generate_cache(&mut self, mut token: Vec<u8>) {
        let mut buf = vec![0u8; self.cache_size as usize * MSG_LEN];
        L::xof(&mut buf, &[&token, &self.edk]);
        token.zeroize();

        self.cache = buf.chunks(MSG_LEN).map(|chunk| chunk.to_vec()).collect();
        buf.zeroize();
        self.cache_empty = false;
        info!(counter = self.ksn.counter(), "refilled transaction-key cache");
    }

    /// Consumes the cache slot at the current counter's index: copies
    /// it out, zeroes it in place, advances the counter, and flips
    /// `cache_empty` on the epoch boundary.
    fn consume(&mut self) -> Vec<u8> {
        let idx = self.ksn.slot(self.cache_size) as usize;
        let key = self.cache[idx].clone();
        self.cache[idx].zeroize();

        let next_counter = self.ksn.counter() + 1;
        self.ksn = self.ksn.with_counter(next_counter);

        if idx as u32 == self.cache_size - 1 {
            self.cache_empty = true;
            info!(counter = self.ksn.counter(), "transaction-key cache exhausted");
        }
        key
    }

    /// `ciphertext ← K ⊕ plaintext`, consuming one cached key.
    pub fn encrypt_message(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        debug_assert_eq!(plaintext.len(), MSG_LEN);
        if self.cache_empty {
            return Err(HkdsError::CacheExhausted);
        }
        let key = self.consume();
        let mut ciphertext = vec![0u8; MSG_LEN];
        for i in 0..MSG_LEN {
            ciphertext[i] = key[i] ^ plaintext[i];
        }
        Ok(ciphertext)
    }

    /// Consumes two cached keys: the first as the stream key, the
    /// second as the MAC key. A successful call always consumes
    /// exactly two slots and advances the counter by two; if the
    /// cache cannot supply both, no output is produced and no slot is
    /// consumed.
    pub fn encrypt_authenticate_message(&mut self, plaintext: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        debug_assert_eq!(plaintext.len(), MSG_LEN);
        if self.keys_remaining() < 2 {
            return Err(HkdsError::CacheExhausted);
        }

        let k1 = self.consume();
        let mut ciphertext = vec![0u8; MSG_LEN];
        for i in 0..MSG_LEN {
            ciphertext[i] = k1[i] ^ plaintext[i];
        }

        let k2 = self.consume();
        let mut tag = vec![0u8; L::KEY_BYTES];
        L::mac(&mut tag, &ciphertext, &k2, data);

        let mut out = ciphertext;
        out.extend_from_slice(&tag);
        Ok(out)
    }
}

impl<L: SecurityLevel> Drop for ClientState<L> {
    fn drop(&mut self) {
        self.edk.zeroize();
        for slot in &mut self.cache {
            slot.zeroize();
        }
    }
}

impl<L: SecurityLevel> core::fmt::Debug for ClientState<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClientState")
            .field("ksn", &self.ksn)
            .field("cache_empty", &self.cache_empty)
            .field("edk", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CACHE_SIZE;
    use crate::primitives::Mode256;
    use crate::server::{generate_edk, MasterDerivationKey, ServerState};
    use rand::rngs::OsRng;

    fn test_did(fill: u8) -> [u8; DID_SIZE] {
        let mut did = [fill; DID_SIZE];
        did[5] = Mode256::MODE_TAG;
        did
    }

    fn provision() -> (MasterDerivationKey<Mode256>, ClientState<Mode256>, [u8; DID_SIZE]) {
        let mdk = MasterDerivationKey::<Mode256>::generate(&mut OsRng, [1, 2, 3, 4]);
        let did = test_did(5);
        let edk = generate_edk::<Mode256>(mdk.bdk(), &did);
        let client = ClientState::initialize(edk, did, CACHE_SIZE).unwrap();
        (mdk, client, did)
    }

    #[test]
    fn token_round_trips_through_server_and_client() {
        let (mdk, mut client, did) = provision();

        let ksn = KeySerialNumber::new(&did, 0);
        let server = ServerState::new(ksn, &mdk, CACHE_SIZE).unwrap();
        let etok = server.encrypt_token();

        let token = client.decrypt_token(&etok).expect("token should verify");
        client.generate_cache(token);
        assert!(!client.cache_empty());
    }

    #[test]
    fn decrypt_token_rejects_tampered_etok() {
        let (mdk, client, did) = provision();
        let ksn = KeySerialNumber::new(&did, 0);
        let server = ServerState::new(ksn, &mdk, CACHE_SIZE).unwrap();
        let mut etok = server.encrypt_token();
        etok[0] ^= 0x01;

        assert!(matches!(
            client.decrypt_token(&etok),
            Err(HkdsError::AuthenticationFailed)
        ));
    }

    #[test]
    fn encrypt_decrypt_round_trips_across_an_epoch() {
        let (mdk, mut client, did) = provision();
        let ksn = KeySerialNumber::new(&did, 0);
        let server = ServerState::new(ksn, &mdk, CACHE_SIZE).unwrap();
        let token = client.decrypt_token(&server.encrypt_token()).unwrap();
        client.generate_cache(token);

        for counter in 0..CACHE_SIZE {
            let plaintext = [counter as u8; MSG_LEN];
            let ciphertext = client.encrypt_message(&plaintext).unwrap();

            let server_ksn = KeySerialNumber::new(&did, counter);
            let server_state = ServerState::new(server_ksn, &mdk, CACHE_SIZE).unwrap();
            let recovered = server_state.decrypt_message(&ciphertext);
            assert_eq!(recovered, plaintext);
        }
    }

    #[test]
    fn cache_exhausts_after_cache_size_messages() {
        let (mdk, mut client, did) = provision();
        let ksn = KeySerialNumber::new(&did, 0);
        let server = ServerState::new(ksn, &mdk, CACHE_SIZE).unwrap();
        let token = client.decrypt_token(&server.encrypt_token()).unwrap();
        client.generate_cache(token);

        for _ in 0..CACHE_SIZE {
            assert!(client.encrypt_message(&[0u8; MSG_LEN]).is_ok());
        }
        assert!(matches!(
            client.encrypt_message(&[0u8; MSG_LEN]),
            Err(HkdsError::CacheExhausted)
        ));
        assert!(client.cache_empty());
    }

    #[test]
    fn authenticated_round_trip_and_tamper_detection() {
        let (mdk, mut client, did) = provision();
        let ksn = KeySerialNumber::new(&did, 0);
        let server = ServerState::new(ksn, &mdk, CACHE_SIZE).unwrap();
        let token = client.decrypt_token(&server.encrypt_token()).unwrap();
        client.generate_cache(token);

        let plaintext = [0xAAu8; MSG_LEN];
        let data = b"assoc-data";
        let blob = client.encrypt_authenticate_message(&plaintext, data).unwrap();

        let server_ksn = KeySerialNumber::new(&did, 0);
        let server_state = ServerState::new(server_ksn, &mdk, CACHE_SIZE).unwrap();
        let (recovered, ok) = server_state.decrypt_verify_message(&blob, data);
        assert!(ok);
        assert_eq!(recovered, plaintext);

        let (_, ok_bad) = server_state.decrypt_verify_message(&blob, b"wrong-data");
        assert!(!ok_bad);
    }

    #[test]
    fn initialize_rejects_a_did_with_a_mismatched_mode_tag() {
        let mdk = MasterDerivationKey::<Mode256>::generate(&mut OsRng, [1, 2, 3, 4]);
        let mut did = test_did(5);
        did[5] = crate::primitives::Mode128::MODE_TAG;
        let edk = generate_edk::<Mode256>(mdk.bdk(), &did);
        assert!(matches!(
            ClientState::<Mode256>::initialize(edk, did, CACHE_SIZE),
            Err(HkdsError::ConfigMismatch(_))
        ));
    }

    #[test]
    fn initialize_rejects_an_edk_with_the_wrong_length() {
        let did = test_did(5);
        let bad_edk = vec![0u8; Mode256::KEY_BYTES - 1];
        assert!(matches!(
            ClientState::<Mode256>::initialize(bad_edk, did, CACHE_SIZE),
            Err(HkdsError::ConfigMismatch(_))
        ));
    }
}
