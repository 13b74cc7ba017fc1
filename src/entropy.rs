//! OS entropy source used only at MDK provisioning time (never on the
//! derivation hot path).

use rand::rngs::OsRng;
use rand::RngCore;

/// Fill `buffer` with cryptographically strong random bytes.
///
/// Per the entropy-source contract (spec.md §6): this must not return
/// short or fail. `OsRng` upholds that; a failure here is a fatal
/// contract violation, not a recoverable `HkdsError`.
pub fn fill_random(buffer: &mut [u8]) {
    OsRng.fill_bytes(buffer);
}
