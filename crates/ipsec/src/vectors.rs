//! Test records and golden templates
//!
//! [`IpsecTestData`] is the record a scenario is built in and verified
//! against. The four templates seed it with realistic packets and key
//! material: IPv4/TCP and IPv6/UDP inner packets, each under AES-256-GCM and
//! under AES-128-CBC with HMAC-SHA256-128. Their expected outputs are sealed
//! once with the reference ESP transform (sequence number 1, application IV).
//!
//! Templates are read-only after initialization and shared freely.

use crate::buffer::BoundedBuf;
use crate::esp::{self, EspTransform};
use crate::{checksum, packet};
use once_cell::sync::Lazy;
use saverify_platform::{
    AeadAlgorithm, AeadOp, AeadXform, AuthAlgorithm, AuthOp, AuthXform, CipherAlgorithm, CipherOp,
    CipherXform, CryptoXform, IpsecXform, SaDirection, SaMode, SessionConf, TunnelType,
};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Cipher / AEAD key capacity
pub const KEY_MAX: usize = 32;
/// Authentication key capacity
pub const AUTH_KEY_MAX: usize = 64;
/// Salt capacity
pub const SALT_MAX: usize = 4;
/// IV capacity
pub const IV_MAX: usize = 16;
/// Packet text capacity
pub const TEXT_MAX: usize = 1024;

/// One SA test record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpsecTestData {
    /// Cipher or AEAD key
    pub key: BoundedBuf<KEY_MAX>,
    /// Authentication key (chained mode)
    pub auth_key: BoundedBuf<AUTH_KEY_MAX>,
    /// Salt / nonce (AES-GCM, AES-CTR)
    pub salt: BoundedBuf<SALT_MAX>,
    /// Application IV as carried on the wire
    pub iv: BoundedBuf<IV_MAX>,
    /// Packet handed to the device
    pub input_text: BoundedBuf<TEXT_MAX>,
    /// Packet the device must produce
    pub output_text: BoundedBuf<TEXT_MAX>,
    /// SA transform
    pub ipsec_xform: IpsecXform,
    /// Crypto transform
    pub xform: CryptoXform,
}

impl IpsecTestData {
    /// Whether the record uses an AEAD transform
    pub fn is_aead(&self) -> bool {
        self.xform.is_aead()
    }

    /// Session parameters for the device under test
    pub fn session_conf(&self) -> SessionConf<'_> {
        SessionConf {
            ipsec: self.ipsec_xform,
            crypto: self.xform,
            key: self.key.as_slice(),
            auth_key: self.auth_key.as_slice(),
            salt: self.salt.as_slice(),
            iv: self.iv.as_slice(),
        }
    }

    /// Keyed reference transform for this record
    pub fn transform(&self) -> crate::Result<EspTransform> {
        EspTransform::new(
            self.xform,
            self.key.as_slice(),
            self.auth_key.as_slice(),
            self.salt.as_slice(),
        )
    }
}

// 192.168.1.10:1234 -> 192.168.2.20:80, TCP PSH/ACK, 32-byte payload
const INNER_IPV4_TCP: &str = "450000480000000040060000c0a8010ac0a8021404d200500000000100000000\
                              50182000000000004950736563205341206f66666c6f6164206b6e6f776e2061\
                              6e737765722e2e2e";

// 2001:db8::10:5000 -> 2001:db8:1::20:5001, UDP, 32-byte payload
const INNER_IPV6_UDP: &str = "600000000028114020010db800000000000000000000001020010db800010000\
                              000000000000002013881389002800004950736563205341206f66666c6f6164\
                              206b6e6f776e20616e737765722e2e2e";

const GCM_KEY: &str = "4c80cdefbb5d10da906ac73c3613a634c2d1c97fa0b1b5e0b9c08d1eb2a1c3f4";
const GCM_SALT: &str = "2e443b68";
const GCM_IV: &str = "4956ed7ea8b1f4e2";

// Holds enough key bytes for the 256-bit catalog entries
const CBC_KEY: &str = "00112233445566778899aabbccddeeff0f1e2d3c4b5a69788796a5b4c3d2e1f0";
const CBC_AUTH_KEY: &str = "0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f20\
                            2122232425262728292a2b2c2d2e2f303132333435363738393a3b3c3d3e3f40";
const CBC_SALT: &str = "00000030";
const CBC_IV: &str = "f0e1d2c3b4a5968778695a4b3c2d1e0f";

fn decode(s: &str) -> Vec<u8> {
    hex::decode(s.replace(' ', "")).expect("static hex")
}

fn inner_packet(s: &str) -> Vec<u8> {
    let mut pkt = decode(s);
    if packet::is_ipv4(&pkt) {
        checksum::update_ipv4_checksum(&mut pkt).expect("static IPv4 header");
    }
    checksum::update_l4_checksum(&mut pkt).expect("static L4 header");
    pkt
}

fn template_sa(spi: u32, tunnel_type: TunnelType) -> IpsecXform {
    let mut sa = IpsecXform {
        spi,
        direction: SaDirection::Egress,
        mode: SaMode::Tunnel,
        ..IpsecXform::default()
    };
    sa.tunnel.tunnel_type = tunnel_type;
    sa.tunnel.ipv4.src = Ipv4Addr::new(10, 0, 0, 1);
    sa.tunnel.ipv4.dst = Ipv4Addr::new(10, 0, 0, 2);
    sa.tunnel.ipv6.src = Ipv6Addr::new(0x2001, 0xdb8, 0xffff, 0, 0, 0, 0, 1);
    sa.tunnel.ipv6.dst = Ipv6Addr::new(0x2001, 0xdb8, 0xffff, 0, 0, 0, 0, 2);
    sa.options.iv_gen_disable = true;
    sa
}

fn gcm_xform() -> CryptoXform {
    CryptoXform::Aead(AeadXform {
        algo: AeadAlgorithm::AesGcm,
        op: AeadOp::Encrypt,
        key_len: 32,
        iv_len: 12,
        digest_len: 16,
        aad_len: 0,
    })
}

fn cbc_sha256_xform() -> CryptoXform {
    CryptoXform::Chain {
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
    }
}

fn sealed(mut td: IpsecTestData) -> IpsecTestData {
    let transform = td.transform().expect("static template keys");
    let out = esp::encapsulate(
        &td.ipsec_xform,
        &transform,
        1,
        td.iv.as_slice(),
        td.input_text.as_slice(),
    )
    .expect("static template seal");
    td.output_text.set(&out);
    td
}

fn gcm_template(spi: u32, inner: &str, tunnel_type: TunnelType) -> IpsecTestData {
    sealed(IpsecTestData {
        key: BoundedBuf::from_slice(&decode(GCM_KEY)),
        auth_key: BoundedBuf::new(),
        salt: BoundedBuf::from_slice(&decode(GCM_SALT)),
        iv: BoundedBuf::from_slice(&decode(GCM_IV)),
        input_text: BoundedBuf::from_slice(&inner_packet(inner)),
        output_text: BoundedBuf::new(),
        ipsec_xform: template_sa(spi, tunnel_type),
        xform: gcm_xform(),
    })
}

fn cbc_template(spi: u32, inner: &str, tunnel_type: TunnelType) -> IpsecTestData {
    let mut key = BoundedBuf::from_slice(&decode(CBC_KEY));
    key.set_len(16);
    let mut auth_key = BoundedBuf::from_slice(&decode(CBC_AUTH_KEY));
    auth_key.set_len(32);

    sealed(IpsecTestData {
        key,
        auth_key,
        salt: BoundedBuf::from_slice(&decode(CBC_SALT)),
        iv: BoundedBuf::from_slice(&decode(CBC_IV)),
        input_text: BoundedBuf::from_slice(&inner_packet(inner)),
        output_text: BoundedBuf::new(),
        ipsec_xform: template_sa(spi, tunnel_type),
        xform: cbc_sha256_xform(),
    })
}

/// AES-256-GCM, IPv4/TCP inner, IPv4 tunnel
pub static PKT_AES_256_GCM: Lazy<IpsecTestData> =
    Lazy::new(|| gcm_template(0x0000_a5f8, INNER_IPV4_TCP, TunnelType::Ipv4));

/// AES-256-GCM, IPv6/UDP inner, IPv6 tunnel
pub static PKT_AES_256_GCM_V6: Lazy<IpsecTestData> =
    Lazy::new(|| gcm_template(0x0000_a5f9, INNER_IPV6_UDP, TunnelType::Ipv6));

/// AES-128-CBC + HMAC-SHA256-128, IPv4/TCP inner, IPv4 tunnel
pub static PKT_AES_128_CBC_HMAC_SHA256: Lazy<IpsecTestData> =
    Lazy::new(|| cbc_template(0x0000_0c01, INNER_IPV4_TCP, TunnelType::Ipv4));

/// AES-128-CBC + HMAC-SHA256-128, IPv6/UDP inner, IPv6 tunnel
pub static PKT_AES_128_CBC_HMAC_SHA256_V6: Lazy<IpsecTestData> =
    Lazy::new(|| cbc_template(0x0000_0c02, INNER_IPV6_UDP, TunnelType::Ipv6));

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{IPPROTO_ESP, IPV4_HDR_LEN, IPV6_HDR_LEN};

    // Sealed with seq 1 and the template IV
    const GCM_V4_OUT: &str = concat!(
        "45000080000000004032664a0a0000010a0000020000a5f8000000014956ed7e",
        "a8b1f4e2f9cc4d63a4f519b8cb50adfa49ae715f0057d429e9b09c2944e3fb15",
        "004c1f9e5a8721729b86f754deb1061676c32914b1f3bf0c9ef9a1756edecd6d",
        "e71cbd622fae37f9d601812700d486422accf78ac16ff04b9a60025cc9e9304d",
    );
    const GCM_V6_OUT: &str = concat!(
        "600000000074324020010db8ffff0000000000000000000120010db8ffff0000",
        "00000000000000020000a5f9000000014956ed7ea8b1f4e2dccc4d2ba4dd08f8",
        "ab57560389067055c0ffd63ded629c6964e2f6ac004d1f9e0a9f01720afcf774",
        "846966fa15cb721fd8ccaa0f91b693506edac564fc1dfc6761b62ef3d3418f68",
        "6fa5f323ba621221aa8eae1c80fc27ce0dd06ca9b897b3bd2ebda3c9",
    );
    const CBC_V4_OUT: &str = concat!(
        "4500008c000000004032663e0a0000010a00000200000c0100000001f0e1d2c3",
        "b4a5968778695a4b3c2d1e0faeece808c05c77284d59a8f60a941a2ce97017e2",
        "e25fc0e0e507dd10d7c2e8b4f98d0f7d54d8ab68c3628bc4816e05b26f84a805",
        "c08260a2b67d3bb67cefe18a514dc91ac2937431da2a2a084aa13ed486bf06dc",
        "24f5bd5f9329355577da81d8",
    );
    const CBC_V6_OUT: &str = concat!(
        "600000000088324020010db8ffff0000000000000000000120010db8ffff0000",
        "000000000000000200000c0200000001f0e1d2c3b4a5968778695a4b3c2d1e0f",
        "36738dc441a23b2eef34bd94a408c67394e14270118758798152eea3ffb29acb",
        "c153d56f49469f4b73f362fda21d80a138fc739ec6d9bf212cf7b9e79ee5f7aa",
        "dedf6485fd03a306b89f8953b4689871b1a57fa55e862b864d812e08964d7349",
        "26ad6bab56c5b7a5caa7e299804854bb",
    );

    #[test]
    fn test_inner_packets_have_valid_checksums() {
        let v4 = PKT_AES_256_GCM.input_text.as_slice();
        assert_eq!(v4.len(), 72);
        assert!(checksum::verify_ipv4_checksum(v4).unwrap());
        assert!(checksum::verify_l4_checksum(v4).unwrap());

        let v6 = PKT_AES_256_GCM_V6.input_text.as_slice();
        assert_eq!(v6.len(), 80);
        assert!(checksum::verify_l4_checksum(v6).unwrap());
    }

    #[test]
    fn test_gcm_template_output_layout() {
        let td = &*PKT_AES_256_GCM;
        let out = td.output_text.as_slice();
        // outer IPv4 | ESP hdr | IV | 72 + 2 pad + 2 trailer | tag
        assert_eq!(out.len(), IPV4_HDR_LEN + 8 + 8 + 76 + 16);
        assert_eq!(packet::ipv4_proto(out).unwrap(), IPPROTO_ESP);
        assert_eq!(&out[IPV4_HDR_LEN..IPV4_HDR_LEN + 4], &0x0000_a5f8u32.to_be_bytes());
        assert_eq!(&out[IPV4_HDR_LEN + 4..IPV4_HDR_LEN + 8], &1u32.to_be_bytes());
        assert_eq!(&out[IPV4_HDR_LEN + 8..IPV4_HDR_LEN + 16], td.iv.as_slice());
    }

    #[test]
    fn test_cbc_template_output_layout() {
        let td = &*PKT_AES_128_CBC_HMAC_SHA256_V6;
        let out = td.output_text.as_slice();
        // outer IPv6 | ESP hdr | IV | 80 + 14 pad + 2 trailer | ICV
        assert_eq!(out.len(), IPV6_HDR_LEN + 8 + 16 + 96 + 16);
        assert!(packet::is_valid_ipv6(out));
        assert_eq!(td.key.len(), 16);
        assert_eq!(td.auth_key.len(), 32);
    }

    #[test]
    fn test_templates_decrypt_to_input() {
        for td in [
            &*PKT_AES_256_GCM,
            &*PKT_AES_256_GCM_V6,
            &*PKT_AES_128_CBC_HMAC_SHA256,
            &*PKT_AES_128_CBC_HMAC_SHA256_V6,
        ] {
            let transform = td.transform().unwrap();
            let dec = esp::decapsulate(&td.ipsec_xform, &transform, td.output_text.as_slice()).unwrap();
            assert_eq!(dec.inner, td.input_text.as_slice());
            assert_eq!(dec.sequence, 1);
        }
    }

    #[test]
    fn test_session_conf_borrows_record() {
        let td = &*PKT_AES_128_CBC_HMAC_SHA256;
        let conf = td.session_conf();
        assert_eq!(conf.key.len(), 16);
        assert_eq!(conf.iv, td.iv.as_slice());
        assert_eq!(conf.ipsec.spi, 0x0c01);
        assert!(!td.is_aead());
        assert!(PKT_AES_256_GCM.is_aead());
    }

    #[test]
    fn test_golden_outputs_match_known_answers() {
        for (td, expected) in [
            (&*PKT_AES_256_GCM, GCM_V4_OUT),
            (&*PKT_AES_256_GCM_V6, GCM_V6_OUT),
            (&*PKT_AES_128_CBC_HMAC_SHA256, CBC_V4_OUT),
            (&*PKT_AES_128_CBC_HMAC_SHA256_V6, CBC_V6_OUT),
        ] {
            assert_eq!(
                hex::encode(td.output_text.as_slice()),
                expected,
                "spi {:#x}",
                td.ipsec_xform.spi
            );
        }
    }
}
