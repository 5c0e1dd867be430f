//! Test vector builder
//!
//! Turns a catalog entry plus scenario flags into outbound test records,
//! seeded from the golden templates.

use crate::catalog::{CryptoParam, CryptoParamCombination, ParamKind, IPSEC_TEST_PACKETS_MAX};
use crate::esp;
use crate::flags::{DfPolicy, TestFlags};
use crate::packet::{self, IPPROTO_TCP, IPPROTO_UDP};
use crate::vectors::{
    IpsecTestData, PKT_AES_128_CBC_HMAC_SHA256, PKT_AES_128_CBC_HMAC_SHA256_V6, PKT_AES_256_GCM,
    PKT_AES_256_GCM_V6,
};
use crate::{checksum, Error, Result};
use saverify_platform::{
    AeadOp, AeadXform, AuthOp, AuthXform, CipherOp, CipherXform, CryptoXform, SaMode, TunnelType,
};

/// Fragment offset given to the inner packet of fragmentation scenarios
pub const FRAGMENT_OFFSET: u16 = 4;

/// Build `count` outbound records for one catalog entry
///
/// Every record starts from the template matching the entry (AEAD or
/// chained) and the inner family (`flags.ipv6`); flags then override
/// disjoint fields.
///
/// # Errors
///
/// Returns `InvalidParameter` if the combination pairs the wrong kinds of
/// catalog entries (an AEAD slot holding a cipher, ...)
pub fn prepare(
    param: &CryptoParamCombination,
    flags: &TestFlags,
    count: usize,
) -> Result<Vec<IpsecTestData>> {
    (0..count).map(|_| prepare_one(param, flags)).collect()
}

fn prepare_one(param: &CryptoParamCombination, flags: &TestFlags) -> Result<IpsecTestData> {
    let mut td = match param {
        CryptoParamCombination::Aead(aead) => {
            let template = if flags.ipv6 {
                &*PKT_AES_256_GCM_V6
            } else {
                &*PKT_AES_256_GCM
            };
            let mut td = template.clone();
            td.xform = aead_xform(aead)?;
            td.key.set_len(aead.key_len as usize);
            td
        }
        CryptoParamCombination::Chain { cipher, auth } => {
            let template = if flags.ipv6 {
                &*PKT_AES_128_CBC_HMAC_SHA256_V6
            } else {
                &*PKT_AES_128_CBC_HMAC_SHA256
            };
            let mut td = template.clone();
            td.xform = chain_xform(cipher, auth)?;
            td.key.set_len(cipher.key_len as usize);
            td.auth_key.set_len(auth.key_len as usize);
            td
        }
    };
    let iv_len = esp::wire_iv_len(&td.xform, td.salt.len());
    td.iv.set_len(iv_len);

    if flags.iv_gen {
        td.ipsec_xform.options.iv_gen_disable = false;
    }

    if flags.sa_expiry_pkts_soft {
        td.ipsec_xform.life.packets_soft_limit = IPSEC_TEST_PACKETS_MAX as u64 - 1;
    }

    if flags.ip_csum {
        td.ipsec_xform.options.ip_csum_enable = true;
        let pkt = td.input_text.as_mut_slice();
        if packet::is_ipv4(pkt) {
            packet::set_ipv4_checksum_field(pkt, 0)?;
        }
    }

    if flags.l4_csum {
        td.ipsec_xform.options.l4_csum_enable = true;
        zero_l4_checksum(td.input_text.as_mut_slice())?;
    }

    if flags.transport {
        td.ipsec_xform.mode = SaMode::Transport;
    } else {
        td.ipsec_xform.mode = SaMode::Tunnel;
        td.ipsec_xform.tunnel.tunnel_type = if flags.tunnel_ipv6 {
            TunnelType::Ipv6
        } else {
            TunnelType::Ipv4
        };
    }

    if flags.stats_success {
        td.ipsec_xform.options.stats = true;
    }

    if flags.fragment {
        let pkt = td.input_text.as_mut_slice();
        if packet::is_ipv4(pkt) {
            packet::set_ipv4_frag_field(pkt, FRAGMENT_OFFSET)?;
            checksum::update_ipv4_checksum(pkt)?;
        }
    }

    match flags.df {
        Some(policy) if policy.is_copy() => td.ipsec_xform.options.copy_df = true,
        Some(DfPolicy::Set1Inner0) => td.ipsec_xform.tunnel.ipv4.df = true,
        Some(DfPolicy::Set0Inner1) => td.ipsec_xform.tunnel.ipv4.df = false,
        _ => {}
    }

    Ok(td)
}

fn aead_xform(param: &CryptoParam) -> Result<CryptoXform> {
    match param.kind {
        ParamKind::Aead(algo) => Ok(CryptoXform::Aead(AeadXform {
            algo,
            op: AeadOp::Encrypt,
            key_len: param.key_len,
            iv_len: param.iv_len,
            digest_len: param.digest_len,
            aad_len: 0,
        })),
        other => Err(Error::InvalidParameter(format!(
            "{:?} in AEAD position",
            other
        ))),
    }
}

fn chain_xform(cipher: &CryptoParam, auth: &CryptoParam) -> Result<CryptoXform> {
    match (cipher.kind, auth.kind) {
        (ParamKind::Cipher(cipher_algo), ParamKind::Auth(auth_algo)) => Ok(CryptoXform::Chain {
            cipher: CipherXform {
                algo: cipher_algo,
                op: CipherOp::Encrypt,
                key_len: cipher.key_len,
                iv_len: cipher.iv_len,
            },
            auth: AuthXform {
                algo: auth_algo,
                op: AuthOp::Generate,
                key_len: auth.key_len,
                digest_len: auth.digest_len,
                iv_len: 0,
            },
        }),
        (c, a) => Err(Error::InvalidParameter(format!(
            "{:?} / {:?} in cipher / auth position",
            c, a
        ))),
    }
}

fn zero_l4_checksum(pkt: &mut [u8]) -> Result<()> {
    let (proto, hlen) = packet::l3_info(pkt)?;
    match proto {
        IPPROTO_TCP => packet::write_u16(pkt, hlen + 16, 0),
        IPPROTO_UDP => packet::write_u16(pkt, hlen + 6, 0),
        _ => Ok(()),
    }
}
