//! Capability verification
//!
//! Pure predicates deciding whether a scenario applies to a device, given
//! the capability set it advertises. Failures are skip-class errors.

use crate::{Error, Result};
use saverify_platform::{
    AeadXform, AuthXform, CipherXform, CryptoXform, IpsecXform, SaDirection, SaOptions,
    SecurityCapability, SymCapability,
};
use std::fmt;

/// SA option named by a capability mismatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaOption {
    /// Extended sequence numbers
    Esn,
    /// UDP encapsulation
    UdpEncap,
    /// UDP port verification
    UdpPortsVerify,
    /// DSCP copy
    CopyDscp,
    /// Flow label copy
    CopyFlabel,
    /// DF copy
    CopyDf,
    /// TTL decrement
    DecTtl,
    /// ECN
    Ecn,
    /// Statistics
    Stats,
    /// Application IV
    IvGenDisable,
    /// Tunnel header verification
    TunnelHdrVerify,
    /// Inner IP checksum offload
    IpCsum,
    /// Inner L4 checksum offload
    L4Csum,
}

impl fmt::Display for SaOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SaOption::Esn => "ESN",
            SaOption::UdpEncap => "UDP encapsulation",
            SaOption::UdpPortsVerify => "UDP encapsulation ports verification",
            SaOption::CopyDscp => "Copy DSCP",
            SaOption::CopyFlabel => "Copy Flow Label",
            SaOption::CopyDf => "Copy DF bit",
            SaOption::DecTtl => "Decrement TTL",
            SaOption::Ecn => "ECN",
            SaOption::Stats => "Stats",
            SaOption::IvGenDisable => "Application provided IV",
            SaOption::TunnelHdrVerify => "Tunnel header verify",
            SaOption::IpCsum => "Inner IP checksum",
            SaOption::L4Csum => "Inner L4 checksum",
        };
        f.write_str(name)
    }
}

/// Check requested SA options against the device's supported options
///
/// Stops at the first requested option the device lacks. `iv_gen_disable`
/// only matters for egress SAs, tunnel header verification only for ingress
/// SAs, where the requested level must not exceed the advertised level.
pub fn verify_sa_options(xform: &IpsecXform, caps: &SaOptions) -> Result<()> {
    let req = &xform.options;

    let flags = [
        (req.esn, caps.esn, SaOption::Esn),
        (req.udp_encap, caps.udp_encap, SaOption::UdpEncap),
        (req.udp_ports_verify, caps.udp_ports_verify, SaOption::UdpPortsVerify),
        (req.copy_dscp, caps.copy_dscp, SaOption::CopyDscp),
        (req.copy_flabel, caps.copy_flabel, SaOption::CopyFlabel),
        (req.copy_df, caps.copy_df, SaOption::CopyDf),
        (req.dec_ttl, caps.dec_ttl, SaOption::DecTtl),
        (req.ecn, caps.ecn, SaOption::Ecn),
        (req.stats, caps.stats, SaOption::Stats),
    ];
    for (requested, supported, option) in flags {
        if requested && !supported {
            return Err(Error::UnsupportedOption(option));
        }
    }

    match xform.direction {
        SaDirection::Egress => {
            if req.iv_gen_disable && !caps.iv_gen_disable {
                return Err(Error::UnsupportedOption(SaOption::IvGenDisable));
            }
        }
        SaDirection::Ingress => {
            if req.tunnel_hdr_verify > caps.tunnel_hdr_verify {
                return Err(Error::UnsupportedOption(SaOption::TunnelHdrVerify));
            }
        }
    }

    if req.ip_csum_enable && !caps.ip_csum_enable {
        return Err(Error::UnsupportedOption(SaOption::IpCsum));
    }
    if req.l4_csum_enable && !caps.l4_csum_enable {
        return Err(Error::UnsupportedOption(SaOption::L4Csum));
    }

    Ok(())
}

/// Whether an AEAD capability entry covers `xform`
pub fn verify_aead(cap: &SymCapability, xform: &AeadXform) -> bool {
    match cap {
        SymCapability::Aead {
            algo,
            key_size,
            digest_size,
            aad_size,
            iv_size,
        } => {
            *algo == xform.algo
                && key_size.contains(xform.key_len)
                && digest_size.contains(xform.digest_len)
                && aad_size.contains(xform.aad_len)
                && iv_size.contains(xform.iv_len)
        }
        _ => false,
    }
}

/// Whether a cipher capability entry covers `xform`
pub fn verify_cipher(cap: &SymCapability, xform: &CipherXform) -> bool {
    match cap {
        SymCapability::Cipher {
            algo,
            key_size,
            iv_size,
        } => *algo == xform.algo && key_size.contains(xform.key_len) && iv_size.contains(xform.iv_len),
        _ => false,
    }
}

/// Whether an auth capability entry covers `xform`
pub fn verify_auth(cap: &SymCapability, xform: &AuthXform) -> bool {
    match cap {
        SymCapability::Auth {
            algo,
            key_size,
            digest_size,
            iv_size,
        } => {
            *algo == xform.algo
                && key_size.contains(xform.key_len)
                && digest_size.contains(xform.digest_len)
                && iv_size.contains(xform.iv_len)
        }
        _ => false,
    }
}

/// Check a crypto transform against the device's crypto capability list
///
/// Scans the advertised list in order up to its end marker; the first entry
/// of the right algorithm whose ranges cover the transform satisfies it.
/// A chain needs both its cipher and its auth half covered.
pub fn verify_crypto_capability(caps: &SecurityCapability, xform: &CryptoXform) -> Result<()> {
    match xform {
        CryptoXform::Aead(aead) => {
            if caps.symmetric().any(|cap| verify_aead(cap, aead)) {
                Ok(())
            } else {
                Err(Error::UnsupportedCrypto(format!(
                    "{} key {} digest {}",
                    aead.algo.name(),
                    aead.key_len,
                    aead.digest_len
                )))
            }
        }
        CryptoXform::Chain { cipher, auth } => {
            if !caps.symmetric().any(|cap| verify_cipher(cap, cipher)) {
                return Err(Error::UnsupportedCrypto(format!(
                    "{} key {} iv {}",
                    cipher.algo.name(),
                    cipher.key_len,
                    cipher.iv_len
                )));
            }
            if !caps.symmetric().any(|cap| verify_auth(cap, auth)) {
                return Err(Error::UnsupportedCrypto(format!(
                    "{} key {} digest {}",
                    auth.algo.name(),
                    auth.key_len,
                    auth.digest_len
                )));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saverify_platform::{
        AeadAlgorithm, AeadOp, AuthAlgorithm, AuthOp, CipherAlgorithm, CipherOp,
        CryptoCapability, ParamRange, TunnelVerify,
    };

    fn gcm(key_len: u16) -> AeadXform {
        AeadXform {
            algo: AeadAlgorithm::AesGcm,
            op: AeadOp::Encrypt,
            key_len,
            iv_len: 12,
            digest_len: 16,
            aad_len: 0,
        }
    }

    fn caps() -> SecurityCapability {
        SecurityCapability {
            options: SaOptions {
                udp_encap: true,
                stats: true,
                tunnel_hdr_verify: TunnelVerify::DstAddr,
                ..SaOptions::default()
            },
            crypto: vec![
                CryptoCapability::Symmetric(SymCapability::Aead {
                    algo: AeadAlgorithm::AesGcm,
                    key_size: ParamRange::new(16, 32, 8),
                    digest_size: ParamRange::fixed(16),
                    aad_size: ParamRange::new(0, 12, 4),
                    iv_size: ParamRange::fixed(12),
                }),
                CryptoCapability::Symmetric(SymCapability::Cipher {
                    algo: CipherAlgorithm::AesCbc,
                    key_size: ParamRange::fixed(16),
                    iv_size: ParamRange::fixed(16),
                }),
                CryptoCapability::Undefined,
                CryptoCapability::Symmetric(SymCapability::Auth {
                    algo: AuthAlgorithm::Sha256Hmac,
                    key_size: ParamRange::new(1, 1024, 1),
                    digest_size: ParamRange::fixed(16),
                    iv_size: ParamRange::fixed(0),
                }),
            ],
        }
    }

    #[test]
    fn test_options_supported() {
        let mut xform = IpsecXform::default();
        xform.options.udp_encap = true;
        xform.options.stats = true;
        assert!(verify_sa_options(&xform, &caps().options).is_ok());
    }

    #[test]
    fn test_options_first_violation() {
        let mut xform = IpsecXform::default();
        xform.options.esn = true;
        xform.options.ecn = true;
        assert_eq!(
            verify_sa_options(&xform, &caps().options),
            Err(Error::UnsupportedOption(SaOption::Esn))
        );
    }

    #[test]
    fn test_iv_gen_disable_only_checked_on_egress() {
        let mut xform = IpsecXform::default();
        xform.options.iv_gen_disable = true;
        assert_eq!(
            verify_sa_options(&xform, &caps().options),
            Err(Error::UnsupportedOption(SaOption::IvGenDisable))
        );

        xform.direction = SaDirection::Ingress;
        assert!(verify_sa_options(&xform, &caps().options).is_ok());
    }

    #[test]
    fn test_tunnel_verify_is_ordinal() {
        let mut xform = IpsecXform {
            direction: SaDirection::Ingress,
            ..IpsecXform::default()
        };
        xform.options.tunnel_hdr_verify = TunnelVerify::DstAddr;
        assert!(verify_sa_options(&xform, &caps().options).is_ok());

        xform.options.tunnel_hdr_verify = TunnelVerify::SrcDstAddr;
        assert_eq!(
            verify_sa_options(&xform, &caps().options),
            Err(Error::UnsupportedOption(SaOption::TunnelHdrVerify))
        );

        // Not checked for egress
        xform.direction = SaDirection::Egress;
        assert!(verify_sa_options(&xform, &caps().options).is_ok());
    }

    #[test]
    fn test_aead_ranges() {
        let caps = caps();
        for key_len in [16, 24, 32] {
            assert!(verify_crypto_capability(&caps, &CryptoXform::Aead(gcm(key_len))).is_ok());
        }
        let err = verify_crypto_capability(&caps, &CryptoXform::Aead(gcm(20))).unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn test_entries_after_end_marker_ignored() {
        let xform = CryptoXform::Chain {
            cipher: CipherXform {
                algo: CipherAlgorithm::AesCbc,
                op: CipherOp::Encrypt,
                key_len: 16,
                iv_len: 16,
            },
            auth: AuthXform {
                algo: AuthAlgorithm::Sha256Hmac,
                op: AuthOp::Generate,
                key_len: 32,
                digest_len: 16,
                iv_len: 0,
            },
        };
        // The SHA-256 entry sits behind the end marker
        match verify_crypto_capability(&caps(), &xform) {
            Err(Error::UnsupportedCrypto(msg)) => assert!(msg.contains("sha2-256-hmac")),
            other => panic!("Expected unsupported auth, got {:?}", other),
        }
    }
}
