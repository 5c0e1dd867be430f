//! SA and crypto transform descriptors
//!
//! These are the parameters a caller hands to [`SecurityDevice::create_session`]
//! (`crate::SecurityDevice::create_session`). They mirror the negotiable
//! behaviours of an ESP Security Association (RFC 4301 / RFC 4303) without
//! carrying any key-management state.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Direction of a Security Association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SaDirection {
    /// Outbound: plaintext in, ESP packet out
    #[default]
    Egress,
    /// Inbound: ESP packet in, plaintext out
    Ingress,
}

/// ESP encapsulation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SaMode {
    /// ESP inserted between the original IP header and its payload
    Transport,
    /// Whole inner packet protected behind a new outer IP header
    #[default]
    Tunnel,
}

/// Address family of the outer tunnel header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TunnelType {
    /// IPv4 outer header
    #[default]
    Ipv4,
    /// IPv6 outer header
    Ipv6,
}

/// Tunnel header verification strictness on ingress
///
/// Ordinal: a device advertising a level supports every lower level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TunnelVerify {
    /// No verification
    #[default]
    None = 0,
    /// Outer destination address must match the SA
    DstAddr = 1,
    /// Outer source and destination addresses must match the SA
    SrcDstAddr = 2,
}

/// IPv4 outer header parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ipv4Tunnel {
    /// Tunnel source address
    pub src: Ipv4Addr,
    /// Tunnel destination address
    pub dst: Ipv4Addr,
    /// DSCP written when not copied from the inner header
    pub dscp: u8,
    /// DF bit written when not copied from the inner header
    pub df: bool,
    /// Outer TTL
    pub ttl: u8,
}

impl Default for Ipv4Tunnel {
    fn default() -> Self {
        Ipv4Tunnel {
            src: Ipv4Addr::UNSPECIFIED,
            dst: Ipv4Addr::UNSPECIFIED,
            dscp: 0,
            df: false,
            ttl: 64,
        }
    }
}

/// IPv6 outer header parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ipv6Tunnel {
    /// Tunnel source address
    pub src: Ipv6Addr,
    /// Tunnel destination address
    pub dst: Ipv6Addr,
    /// DSCP written when not copied from the inner header
    pub dscp: u8,
    /// Flow label written when not copied from the inner header
    pub flabel: u32,
    /// Outer hop limit
    pub hlimit: u8,
}

impl Default for Ipv6Tunnel {
    fn default() -> Self {
        Ipv6Tunnel {
            src: Ipv6Addr::UNSPECIFIED,
            dst: Ipv6Addr::UNSPECIFIED,
            dscp: 0,
            flabel: 0,
            hlimit: 64,
        }
    }
}

/// Tunnel endpoint configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TunnelParams {
    /// Which of the two parameter sets is used
    pub tunnel_type: TunnelType,
    /// IPv4 endpoints
    pub ipv4: Ipv4Tunnel,
    /// IPv6 endpoints
    pub ipv6: Ipv6Tunnel,
}

/// Negotiable SA options
///
/// The same shape describes both what a scenario requests and what a device
/// advertises in its capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SaOptions {
    /// Extended (64-bit) sequence numbers
    pub esn: bool,
    /// UDP encapsulation (RFC 3948)
    pub udp_encap: bool,
    /// Copy DSCP from the inner header to the outer header
    pub copy_dscp: bool,
    /// Copy flow label from the inner header to the outer header
    pub copy_flabel: bool,
    /// Copy DF bit from the inner header to the outer header
    pub copy_df: bool,
    /// Decrement inner TTL / hop limit
    pub dec_ttl: bool,
    /// ECN propagation (RFC 6040)
    pub ecn: bool,
    /// Per-SA statistics
    pub stats: bool,
    /// Use the application supplied IV instead of generating one (egress only)
    pub iv_gen_disable: bool,
    /// Tunnel header verification (ingress only)
    pub tunnel_hdr_verify: TunnelVerify,
    /// Verify UDP encapsulation ports on ingress
    pub udp_ports_verify: bool,
    /// Compute / verify the inner IPv4 header checksum
    pub ip_csum_enable: bool,
    /// Compute / verify the inner TCP / UDP checksum
    pub l4_csum_enable: bool,
}

/// Packet and byte based SA lifetime limits, zero meaning unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SaLifetime {
    /// Soft packet limit: packets beyond it carry a soft expiry indication
    pub packets_soft_limit: u64,
    /// Hard packet limit: packets beyond it are rejected
    pub packets_hard_limit: u64,
    /// Soft byte limit
    pub bytes_soft_limit: u64,
    /// Hard byte limit
    pub bytes_hard_limit: u64,
}

/// UDP encapsulation ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UdpPorts {
    /// Source port
    pub sport: u16,
    /// Destination port
    pub dport: u16,
}

impl Default for UdpPorts {
    fn default() -> Self {
        UdpPorts {
            sport: 4500,
            dport: 4500,
        }
    }
}

/// ESP Security Association transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IpsecXform {
    /// Security Parameters Index
    pub spi: u32,
    /// Direction
    pub direction: SaDirection,
    /// Transport or tunnel
    pub mode: SaMode,
    /// Tunnel endpoints (tunnel mode only)
    pub tunnel: TunnelParams,
    /// Negotiated options
    pub options: SaOptions,
    /// Lifetime limits
    pub life: SaLifetime,
    /// UDP encapsulation ports
    pub udp: UdpPorts,
}

/// AEAD algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AeadAlgorithm {
    /// AES in Galois/Counter Mode (RFC 4106)
    AesGcm,
}

impl AeadAlgorithm {
    /// Canonical algorithm name
    pub fn name(self) -> &'static str {
        match self {
            AeadAlgorithm::AesGcm => "aes-gcm",
        }
    }
}

/// Cipher algorithms usable in a cipher + auth chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CipherAlgorithm {
    /// ESP NULL encryption (RFC 2410)
    Null,
    /// AES-CBC (RFC 3602)
    AesCbc,
    /// AES-CTR (RFC 3686)
    AesCtr,
}

impl CipherAlgorithm {
    /// Canonical algorithm name
    pub fn name(self) -> &'static str {
        match self {
            CipherAlgorithm::Null => "null",
            CipherAlgorithm::AesCbc => "aes-cbc",
            CipherAlgorithm::AesCtr => "aes-ctr",
        }
    }
}

/// Authentication algorithms usable in a cipher + auth chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuthAlgorithm {
    /// No integrity protection
    Null,
    /// HMAC-SHA-256-128 (RFC 4868)
    Sha256Hmac,
    /// HMAC-SHA-384-192 (RFC 4868)
    Sha384Hmac,
    /// HMAC-SHA-512-256 (RFC 4868)
    Sha512Hmac,
    /// AES-XCBC-MAC-96 (RFC 3566)
    AesXcbcMac,
}

impl AuthAlgorithm {
    /// Canonical algorithm name
    pub fn name(self) -> &'static str {
        match self {
            AuthAlgorithm::Null => "null",
            AuthAlgorithm::Sha256Hmac => "sha2-256-hmac",
            AuthAlgorithm::Sha384Hmac => "sha2-384-hmac",
            AuthAlgorithm::Sha512Hmac => "sha2-512-hmac",
            AuthAlgorithm::AesXcbcMac => "aes-xcbc-mac",
        }
    }
}

/// AEAD operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AeadOp {
    /// Seal
    #[default]
    Encrypt,
    /// Open
    Decrypt,
}

/// Cipher operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CipherOp {
    /// Encrypt
    #[default]
    Encrypt,
    /// Decrypt
    Decrypt,
}

/// Authentication operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuthOp {
    /// Produce the ICV
    #[default]
    Generate,
    /// Check the ICV
    Verify,
}

/// AEAD transform parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AeadXform {
    /// Algorithm
    pub algo: AeadAlgorithm,
    /// Operation
    pub op: AeadOp,
    /// Key length in bytes
    pub key_len: u16,
    /// Full nonce length in bytes (salt + explicit IV)
    pub iv_len: u16,
    /// Tag length in bytes
    pub digest_len: u16,
    /// AAD length in bytes (zero when the device builds the AAD)
    pub aad_len: u16,
}

/// Cipher half of a chain transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CipherXform {
    /// Algorithm
    pub algo: CipherAlgorithm,
    /// Operation
    pub op: CipherOp,
    /// Key length in bytes
    pub key_len: u16,
    /// IV length in bytes
    pub iv_len: u16,
}

/// Authentication half of a chain transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuthXform {
    /// Algorithm
    pub algo: AuthAlgorithm,
    /// Operation
    pub op: AuthOp,
    /// Key length in bytes
    pub key_len: u16,
    /// Truncated ICV length in bytes
    pub digest_len: u16,
    /// IV length in bytes (zero for HMAC)
    pub iv_len: u16,
}

/// Crypto transform of an SA: either one AEAD or a cipher + auth chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CryptoXform {
    /// Combined mode algorithm
    Aead(AeadXform),
    /// Encrypt-then-MAC chain
    Chain {
        /// Cipher parameters
        cipher: CipherXform,
        /// Authentication parameters
        auth: AuthXform,
    },
}

impl CryptoXform {
    /// Whether this is the AEAD variant
    pub fn is_aead(&self) -> bool {
        matches!(self, CryptoXform::Aead(_))
    }

    /// Switch every operation to its ingress counterpart
    ///
    /// AEAD encrypt becomes decrypt; a chain becomes decrypt + verify.
    pub fn set_ingress_ops(&mut self) {
        match self {
            CryptoXform::Aead(aead) => aead.op = AeadOp::Decrypt,
            CryptoXform::Chain { cipher, auth } => {
                cipher.op = CipherOp::Decrypt;
                auth.op = AuthOp::Verify;
            }
        }
    }

    /// ICV length appended to each ESP packet
    pub fn icv_len(&self) -> usize {
        match self {
            CryptoXform::Aead(aead) => aead.digest_len as usize,
            CryptoXform::Chain { auth, .. } => auth.digest_len as usize,
        }
    }
}
