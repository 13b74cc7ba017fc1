use thiserror::Error;

/// Unified error surface for key derivation, token issuance, and message
/// encrypt/decrypt across the server and client APIs.
#[derive(Error, Debug)]
pub enum HkdsError {
    #[error("client transaction-key cache is exhausted, request a new token")]
    CacheExhausted,

    #[error("message authentication failed")]
    AuthenticationFailed,

    #[error("security-level or size mismatch: {0}")]
    ConfigMismatch(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("entropy source failed: {0}")]
    EntropySourceFailed(#[from] rand::Error),
}

pub type Result<T> = core::result::Result<T, HkdsError>;
