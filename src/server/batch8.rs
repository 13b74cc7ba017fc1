//! Eight-lane batched server path. Lanes are independent server states
//! sharing one `MasterDerivationKey`; the contract is that lane `i`'s
//! output is bit-identical to a scalar [`ServerState`] call with the
//! same `(MDK, KSN_i, inputs)` — trivially true here since each lane
//! runs the identical scalar derivation, serially, through the same
//! `tiny-keccak` permutation: `encrypt_token_x8`/`decrypt_message_x8`/
//! `decrypt_verify_message_x8` are `std::array::from_fn` over eight
//! independent `ServerState` calls, with no shared or amortized
//! absorb across lanes. This is a lane-wise fan-out, not a genuine
//! SIMD-batched Keccak permutation; it exists so callers already have
//! a fixed-width, 8-lane call surface to migrate onto if this crate
//! later grows one.

use crate::constants::CACHX8_DEPTH;
use crate::error::Result;
use crate::ksn::KeySerialNumber;
use crate::primitives::SecurityLevel;

use super::{MasterDerivationKey, ServerState};

/// Eight independent KSNs over one shared, read-only MDK reference.
/// Lane `i` is a full, independent re-derivation through the scalar
/// [`ServerState`] API — this type is a lane-wise fan-out, not a
/// SIMD-batched primitive; see the module doc comment.
pub struct ServerStateX8<'mdk, L: SecurityLevel> {
    lanes: [ServerState<'mdk, L>; CACHX8_DEPTH],
}

impl<'mdk, L: SecurityLevel> ServerStateX8<'mdk, L> {
    /// Validates every lane's KSN against `L::MODE_TAG` (see
    /// [`ServerState::new`]) before any lane is constructed.
    pub fn new(
        ksns: [KeySerialNumber; CACHX8_DEPTH],
        mdk: &'mdk MasterDerivationKey<L>,
        cache_size: u32,
    ) -> Result<Self> {
        let mut lanes = Vec::with_capacity(CACHX8_DEPTH);
        for ksn in ksns {
            lanes.push(ServerState::new(ksn, mdk, cache_size)?);
        }
        let lanes = match <[ServerState<'mdk, L>; CACHX8_DEPTH]>::try_from(lanes) {
            Ok(lanes) => lanes,
            Err(_) => unreachable!("exactly CACHX8_DEPTH lanes were pushed"),
        };
        Ok(Self { lanes })
    }

    /// Issues a token on every lane; lane `i` bit-identical to
    /// `ServerState::encrypt_token` on the same `(MDK, KSN_i)`.
    pub fn encrypt_token_x8(&self) -> [Vec<u8>; CACHX8_DEPTH] {
        std::array::from_fn(|i| self.lanes[i].encrypt_token())
    }

    /// Decrypts one message per lane.
    pub fn decrypt_message_x8(&self, ciphertexts: &[[u8; 16]; CACHX8_DEPTH]) -> [Vec<u8>; CACHX8_DEPTH] {
        std::array::from_fn(|i| self.lanes[i].decrypt_message(&ciphertexts[i]))
    }

    /// Decrypts and verifies one authenticated message per lane. A
    /// MAC failure on one lane never affects the others; results are a
    /// boolean vector of length 8 alongside the plaintexts.
    pub fn decrypt_verify_message_x8(
        &self,
        blobs: &[Vec<u8>; CACHX8_DEPTH],
        data: &[&[u8]; CACHX8_DEPTH],
    ) -> ([Vec<u8>; CACHX8_DEPTH], [bool; CACHX8_DEPTH]) {
        let mut plaintexts: [Vec<u8>; CACHX8_DEPTH] = std::array::from_fn(|_| Vec::new());
        let mut oks = [false; CACHX8_DEPTH];
        for i in 0..CACHX8_DEPTH {
            let (pt, ok) = self.lanes[i].decrypt_verify_message(&blobs[i], data[i]);
            plaintexts[i] = pt;
            oks[i] = ok;
        }
        (plaintexts, oks)
    }

    pub fn lane(&self, i: usize) -> &ServerState<'mdk, L> {
        &self.lanes[i]
    }
}
