//! HKDS (Hierarchical Key Derivation System): forward-evolving
//! transaction key derivation for resource-constrained client devices.
//!
//! The server holds a [`server::MasterDerivationKey`] and issues an
//! encrypted, device-bound token via [`server::ServerState`] (or its
//! [`server::batch8`] / [`server::batch64`] batched forms). A client
//! ingests the token through [`client::ClientState::decrypt_token`],
//! expands it into a small cache of single-use transaction keys with
//! [`client::ClientState::generate_cache`], and consumes one (or two,
//! for authenticated messages) per call until the cache empties and a
//! new token is required.

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod client;
pub mod constants;
pub mod entropy;
pub mod error;
pub mod ksn;
pub mod prelude;
pub mod primitives;
pub mod server;

pub use client::ClientState;
pub use error::{HkdsError, Result};
pub use ksn::{KeySerialNumber, ProtocolId};
pub use primitives::{Mode128, Mode256, Mode512, SecurityLevel};
pub use server::{batch64::ServerStateX64, batch8::ServerStateX8, generate_edk, MasterDerivationKey, ServerState};

/// HKDS crate version (the package version, not the wire protocol).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
