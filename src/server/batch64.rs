//! 64-way (8×8) parallel server path: a thin fan-out over
//! [`PARALLEL_DEPTH`] independent [`ServerStateX8`] workers, each
//! handling its own disjoint slice of the 64 lanes. Uses
//! `std::thread::scope` (stable since 1.63) rather than a thread-pool
//! crate — the MDK is read-only for the duration and outputs are
//! disjoint per worker, so no synchronisation primitive is needed
//! inside the scope.

use crate::constants::{CACHX8_DEPTH, PARALLEL_DEPTH};
use crate::error::{HkdsError, Result};
use crate::ksn::KeySerialNumber;
use crate::primitives::SecurityLevel;

use super::{batch8::ServerStateX8, MasterDerivationKey};

const TOTAL_LANES: usize = PARALLEL_DEPTH * CACHX8_DEPTH;

/// 64 independent KSNs, grouped into `PARALLEL_DEPTH` eight-lane
/// workers sharing one read-only MDK reference. Each `PARALLEL_DEPTH`
/// worker is itself a lane-wise fan-out (see [`ServerStateX8`]), so
/// this type is two nested layers of independent scalar derivations,
/// not a batched primitive.
pub struct ServerStateX64<'mdk, L: SecurityLevel> {
    ksns: [KeySerialNumber; TOTAL_LANES],
    mdk: &'mdk MasterDerivationKey<L>,
    cache_size: u32,
}

impl<'mdk, L: SecurityLevel> ServerStateX64<'mdk, L> {
    /// Validates every lane's KSN against `L::MODE_TAG` once, here, so
    /// the per-worker `ServerStateX8::new` calls inside
    /// `std::thread::scope` below never need to surface the error.
    pub fn new(
        ksns: [KeySerialNumber; TOTAL_LANES],
        mdk: &'mdk MasterDerivationKey<L>,
        cache_size: u32,
    ) -> Result<Self> {
        for ksn in &ksns {
            if ksn.mode_tag() != L::MODE_TAG {
                return Err(HkdsError::ConfigMismatch("KSN mode tag does not match SecurityLevel"));
            }
        }
        Ok(Self {
            ksns,
            mdk,
            cache_size,
        })
    }

    /// Issues a token on all 64 lanes. Ordering among workers is
    /// unspecified; results land at position-determined indices and
    /// are therefore deterministic regardless of scheduling.
    pub fn encrypt_token_x64(&self) -> [Vec<u8>; TOTAL_LANES] {
        let mut out: [Vec<u8>; TOTAL_LANES] = std::array::from_fn(|_| Vec::new());
        let chunks: Vec<&mut [Vec<u8>]> = out.chunks_mut(CACHX8_DEPTH).collect();

        std::thread::scope(|scope| {
            for (worker, out_chunk) in chunks.into_iter().enumerate() {
                let ksn_chunk: [KeySerialNumber; CACHX8_DEPTH] = std::array::from_fn(|i| {
                    self.ksns[worker * CACHX8_DEPTH + i]
                });
                let mdk = self.mdk;
                let cache_size = self.cache_size;
                scope.spawn(move || {
                    let worker_state = ServerStateX8::new(ksn_chunk, mdk, cache_size)
                        .expect("lanes were already validated in ServerStateX64::new");
                    let tokens = worker_state.encrypt_token_x8();
                    for (slot, token) in out_chunk.iter_mut().zip(tokens) {
                        *slot = token;
                    }
                });
            }
        });

        out
    }

    /// Decrypts one message per lane across all 64 lanes.
    pub fn decrypt_message_x64(&self, ciphertexts: &[[u8; 16]; TOTAL_LANES]) -> [Vec<u8>; TOTAL_LANES] {
        let mut out: [Vec<u8>; TOTAL_LANES] = std::array::from_fn(|_| Vec::new());
        let chunks: Vec<&mut [Vec<u8>]> = out.chunks_mut(CACHX8_DEPTH).collect();

        std::thread::scope(|scope| {
            for (worker, out_chunk) in chunks.into_iter().enumerate() {
                let ksn_chunk: [KeySerialNumber; CACHX8_DEPTH] =
                    std::array::from_fn(|i| self.ksns[worker * CACHX8_DEPTH + i]);
                let ct_chunk: [[u8; 16]; CACHX8_DEPTH] =
                    std::array::from_fn(|i| ciphertexts[worker * CACHX8_DEPTH + i]);
                let mdk = self.mdk;
                let cache_size = self.cache_size;
                scope.spawn(move || {
                    let worker_state = ServerStateX8::new(ksn_chunk, mdk, cache_size)
                        .expect("lanes were already validated in ServerStateX64::new");
                    let plaintexts = worker_state.decrypt_message_x8(&ct_chunk);
                    for (slot, pt) in out_chunk.iter_mut().zip(plaintexts) {
                        *slot = pt;
                    }
                });
            }
        });

        out
    }

    /// Decrypts and verifies one authenticated message per lane across
    /// all 64 lanes; one lane's MAC failure never affects the others.
    pub fn decrypt_verify_message_x64(
        &self,
        blobs: &[Vec<u8>; TOTAL_LANES],
        data: &[&[u8]; TOTAL_LANES],
    ) -> ([Vec<u8>; TOTAL_LANES], [bool; TOTAL_LANES]) {
        let mut plaintexts: [Vec<u8>; TOTAL_LANES] = std::array::from_fn(|_| Vec::new());
        let mut oks = [false; TOTAL_LANES];
        let pt_chunks: Vec<&mut [Vec<u8>]> = plaintexts.chunks_mut(CACHX8_DEPTH).collect();
        let ok_chunks: Vec<&mut [bool]> = oks.chunks_mut(CACHX8_DEPTH).collect();

        std::thread::scope(|scope| {
            for (worker, (pt_chunk, ok_chunk)) in pt_chunks.into_iter().zip(ok_chunks).enumerate() {
                let ksn_chunk: [KeySerialNumber; CACHX8_DEPTH] =
                    std::array::from_fn(|i| self.ksns[worker * CACHX8_DEPTH + i]);
                let blob_chunk: [Vec<u8>; CACHX8_DEPTH] =
                    std::array::from_fn(|i| blobs[worker * CACHX8_DEPTH + i].clone());
                let data_chunk: [&[u8]; CACHX8_DEPTH] =
                    std::array::from_fn(|i| data[worker * CACHX8_DEPTH + i]);
                let mdk = self.mdk;
                let cache_size = self.cache_size;
                scope.spawn(move || {
                    let worker_state = ServerStateX8::new(ksn_chunk, mdk, cache_size)
                        .expect("lanes were already validated in ServerStateX64::new");
                    let (worker_pts, worker_oks) =
                        worker_state.decrypt_verify_message_x8(&blob_chunk, &data_chunk);
                    for (slot, pt) in pt_chunk.iter_mut().zip(worker_pts) {
                        *slot = pt;
                    }
                    ok_chunk.copy_from_slice(&worker_oks);
                });
            }
        });

        (plaintexts, oks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DID_SIZE;
    use crate::primitives::Mode128;
    use crate::server::ServerState;
    use rand::rngs::OsRng;

    fn test_did(fill: u8) -> [u8; DID_SIZE] {
        let mut did = [fill; DID_SIZE];
        did[5] = Mode128::MODE_TAG;
        did
    }

    #[test]
    fn x64_matches_scalar_for_every_lane() {
        let mdk = MasterDerivationKey::<Mode128>::generate(&mut OsRng, [0; 4]);
        let ksns: [KeySerialNumber; TOTAL_LANES] =
            std::array::from_fn(|i| KeySerialNumber::new(&test_did(i as u8), 0));

        let x64 = ServerStateX64::new(ksns, &mdk, 4).unwrap();
        let tokens = x64.encrypt_token_x64();

        for i in 0..TOTAL_LANES {
            let scalar = ServerState::new(ksns[i], &mdk, 4).unwrap();
            assert_eq!(tokens[i], scalar.encrypt_token());
        }
    }

    #[test]
    fn new_rejects_any_lane_with_a_mismatched_mode_tag() {
        let mdk = MasterDerivationKey::<Mode128>::generate(&mut OsRng, [0; 4]);
        let mut ksns: [KeySerialNumber; TOTAL_LANES] =
            std::array::from_fn(|i| KeySerialNumber::new(&test_did(i as u8), 0));
        let mut bad_did = test_did(0);
        bad_did[5] = crate::primitives::Mode256::MODE_TAG;
        ksns[40] = KeySerialNumber::new(&bad_did, 0);

        assert!(ServerStateX64::new(ksns, &mdk, 4).is_err());
    }
}
