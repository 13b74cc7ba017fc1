//! Key Serial Number: the 16-byte value that names one transaction key
//! within a device's stream (spec.md §6).

use crate::constants::{DID_SIZE, KSN_SIZE, TKC_SIZE};
use crate::error::{HkdsError, Result};

/// Authentication mode carried in a KSN's protocol-id byte; HKDS issues
/// tokens either anonymously (unauthenticated device onboarding) or
/// tied to a verified device identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolId {
    Unauthenticated = 0x10,
    Authenticated = 0x11,
}

impl ProtocolId {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0x10 => Ok(ProtocolId::Unauthenticated),
            0x11 => Ok(ProtocolId::Authenticated),
            _ => Err(HkdsError::InvalidInput("unrecognized protocol id byte")),
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// `KSN = DID(12) || TKC-ctr(4, big-endian)`, where `DID` itself packs
/// five named sub-fields per spec.md §6:
///
/// ```text
/// [0..4)   group / BDK id
/// [4]      protocol id      (0x10 unauthenticated, 0x11 authenticated)
/// [5]      PRF-mode tag     (0x09/0x0A/0x0B — M128/M256/M512)
/// [6..8)   manufacturer/model id
/// [8..12)  per-device id
/// ```
///
/// [`KeySerialNumber::new`] treats `device_id` as one opaque 12-byte
/// blob for callers who already have it packed; [`KeySerialNumber::new_with_fields`]
/// composes it from the five named sub-fields instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeySerialNumber {
    bytes: [u8; KSN_SIZE],
}

const GROUP_ID_RANGE: core::ops::Range<usize> = 0..4;
const PROTOCOL_ID_OFFSET: usize = 4;
const MODE_TAG_OFFSET: usize = 5;
const MODEL_ID_RANGE: core::ops::Range<usize> = 6..8;
const DEVICE_SUB_ID_RANGE: core::ops::Range<usize> = 8..12;

impl KeySerialNumber {
    pub fn new(device_id: &[u8; DID_SIZE], counter: u32) -> Self {
        let mut bytes = [0u8; KSN_SIZE];
        bytes[..DID_SIZE].copy_from_slice(device_id);
        bytes[DID_SIZE..].copy_from_slice(&counter.to_be_bytes());
        Self { bytes }
    }

    /// Composes a KSN from its five named device-id sub-fields
    /// (spec.md §6) plus the transaction counter, rather than
    /// requiring the caller to hand-pack a 12-byte blob.
    pub fn new_with_fields(
        group_id: [u8; 4],
        protocol_id: ProtocolId,
        mode_tag: u8,
        model_id: [u8; 2],
        device_sub_id: [u8; 4],
        counter: u32,
    ) -> Self {
        let mut device_id = [0u8; DID_SIZE];
        device_id[GROUP_ID_RANGE].copy_from_slice(&group_id);
        device_id[PROTOCOL_ID_OFFSET] = protocol_id.to_byte();
        device_id[MODE_TAG_OFFSET] = mode_tag;
        device_id[MODEL_ID_RANGE].copy_from_slice(&model_id);
        device_id[DEVICE_SUB_ID_RANGE].copy_from_slice(&device_sub_id);
        Self::new(&device_id, counter)
    }

    pub fn from_bytes(bytes: [u8; KSN_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KSN_SIZE] {
        &self.bytes
    }

    pub fn device_id(&self) -> &[u8] {
        &self.bytes[..DID_SIZE]
    }

    pub fn group_id(&self) -> &[u8] {
        &self.bytes[GROUP_ID_RANGE]
    }

    pub fn protocol_id(&self) -> Result<ProtocolId> {
        ProtocolId::from_byte(self.bytes[PROTOCOL_ID_OFFSET])
    }

    pub fn mode_tag(&self) -> u8 {
        self.bytes[MODE_TAG_OFFSET]
    }

    pub fn model_id(&self) -> &[u8] {
        &self.bytes[MODEL_ID_RANGE]
    }

    pub fn device_sub_id(&self) -> &[u8] {
        &self.bytes[DEVICE_SUB_ID_RANGE]
    }

    pub fn counter(&self) -> u32 {
        let mut c = [0u8; TKC_SIZE];
        c.copy_from_slice(&self.bytes[DID_SIZE..]);
        u32::from_be_bytes(c)
    }

    /// Epoch index: which embedding-derivation-key cache this counter
    /// falls in, given the crate-wide `CacheSize`.
    pub fn epoch(&self, cache_size: u32) -> u32 {
        self.counter() / cache_size
    }

    /// Position of this counter within its epoch's cache, `0..CacheSize`.
    pub fn slot(&self, cache_size: u32) -> u32 {
        self.counter() % cache_size
    }

    /// Returns a KSN advanced to the given absolute counter, same device.
    pub fn with_counter(&self, counter: u32) -> Self {
        let mut device_id = [0u8; DID_SIZE];
        device_id.copy_from_slice(self.device_id());
        Self::new(&device_id, counter)
    }
}
