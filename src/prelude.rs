//! Convenient re-exports for common usage.

pub use crate::client::ClientState;
pub use crate::error::{HkdsError, Result};
pub use crate::ksn::{KeySerialNumber, ProtocolId};
pub use crate::primitives::{Mode128, Mode256, Mode512, SecurityLevel};
pub use crate::server::{
    batch64::ServerStateX64, batch8::ServerStateX8, generate_edk, MasterDerivationKey, ServerState,
};

pub use crate::VERSION;
