//! Fixed sizes and derivation-input constants shared across server and
//! client. Numeric values here are this crate's own implementation
//! choice where spec.md leaves them as opaque per-mode constants.

/// Number of transaction keys issued per embedding derivation key (EDK)
/// epoch, i.e. the client cache depth and the server's `count / CacheSize`
/// epoch-boundary divisor.
pub const CACHE_SIZE: u32 = 4;

/// Lane count for the batched x8 derivation path.
pub const CACHX8_DEPTH: usize = 8;

/// Worker count for the batched x64 derivation path (8 x8 workers).
pub const PARALLEL_DEPTH: usize = 8;

/// Width in bytes of one transaction key slice drawn from a derived
/// key stream.
pub const MSG_LEN: usize = 16;

/// Device identifier width within a KSN.
pub const DID_SIZE: usize = 12;

/// Transaction-key-counter width within a KSN.
pub const TKC_SIZE: usize = 4;

/// Total KSN width: `DID_SIZE + TKC_SIZE`.
pub const KSN_SIZE: usize = DID_SIZE + TKC_SIZE;

/// Width of the 7-byte formal/mac names folded into CTOK/TMS.
pub const NAME_SIZE: usize = 7;

/// CTOK = be32(count / CacheSize) || formal-name(7) || DID(12).
pub const CTOK_SIZE: usize = 4 + NAME_SIZE + DID_SIZE;

/// TMS = KSN(16) || mac-name(7).
pub const TMS_SIZE: usize = KSN_SIZE + NAME_SIZE;
