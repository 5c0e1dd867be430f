//! Session handles, operation results and statistics

use crate::xform::{CryptoXform, IpsecXform};
use bytes::Bytes;

/// Opaque handle of a device session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionId(pub u64);

/// Everything needed to program one SA
#[derive(Debug, Clone, Copy)]
pub struct SessionConf<'a> {
    /// SA transform
    pub ipsec: IpsecXform,
    /// Crypto transform
    pub crypto: CryptoXform,
    /// Cipher / AEAD key (at least the key length of `crypto`)
    pub key: &'a [u8],
    /// Authentication key (chain transforms only)
    pub auth_key: &'a [u8],
    /// Nonce salt (AEAD and counter modes)
    pub salt: &'a [u8],
    /// Application IV, used when `iv_gen_disable` is set
    pub iv: &'a [u8],
}

/// Completion status of a submitted packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpStatus {
    /// Packet transformed
    Success,
    /// Packet rejected (expired SA, ICV mismatch, header verification)
    Error,
}

/// Auxiliary indications attached to a completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuxFlags {
    /// The SA crossed its soft lifetime on this packet
    pub soft_expiry: bool,
}

/// Checksum side channel reported with ingress completions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OffloadFlags {
    /// Inner IPv4 header checksum verified good
    pub ip_cksum_good: bool,
    /// Inner IPv4 header checksum verified bad
    pub ip_cksum_bad: bool,
    /// Inner TCP / UDP checksum verified good
    pub l4_cksum_good: bool,
    /// Inner TCP / UDP checksum verified bad
    pub l4_cksum_bad: bool,
}

/// Result of one submitted packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedOp {
    /// Completion status
    pub status: OpStatus,
    /// Auxiliary indications
    pub aux_flags: AuxFlags,
    /// Checksum indications
    pub ol_flags: OffloadFlags,
    /// Transformed packet (the untouched input on error)
    pub packet: Bytes,
}

impl CompletedOp {
    /// Successful completion carrying `packet`
    pub fn success(packet: Bytes) -> Self {
        CompletedOp {
            status: OpStatus::Success,
            aux_flags: AuxFlags::default(),
            ol_flags: OffloadFlags::default(),
            packet,
        }
    }

    /// Failed completion carrying the rejected input
    pub fn error(packet: Bytes) -> Self {
        CompletedOp {
            status: OpStatus::Error,
            aux_flags: AuxFlags::default(),
            ol_flags: OffloadFlags::default(),
            packet,
        }
    }

    /// Whether the status is [`OpStatus::Success`]
    pub fn is_success(&self) -> bool {
        self.status == OpStatus::Success
    }
}

/// Per-SA counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SaStats {
    /// Packets decapsulated
    pub ipackets: u64,
    /// Packets encapsulated
    pub opackets: u64,
    /// Bytes decapsulated
    pub ibytes: u64,
    /// Bytes encapsulated
    pub obytes: u64,
    /// Ingress errors
    pub ierrors: u64,
    /// Egress errors
    pub oerrors: u64,
}
