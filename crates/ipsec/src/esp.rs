//! ESP (Encapsulating Security Payload) reference transform
//!
//! Implements the RFC 4303 framing that test vectors are sealed with and the
//! software device executes.
//!
//! # ESP Packet Format (RFC 4303)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |               Security Parameters Index (SPI)                 |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      Sequence Number                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    IV + Payload Data (variable)               |
//! ~                                                               ~
//! +               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |               |     Padding (0-255 bytes)                     |
//! +-+-+-+-+-+-+-+-+               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                               |  Pad Length   | Next Header   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Integrity Check Value-ICV   (variable)                |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! # AEAD Mode (AES-GCM)
//!
//! - 8-byte IV on the wire, nonce = 4-byte salt | IV (RFC 4106)
//! - Tag appended to the encrypted data, no separate ICV field
//! - AAD is SPI | Sequence Number
//!
//! # Chained Mode
//!
//! - AES-CBC (16-byte IV), AES-CTR (8-byte IV, salt as RFC 3686 nonce) or NULL
//! - HMAC ICV over SPI | Sequence | IV | ciphertext, truncated to the digest length

use crate::crypto;
use crate::packet::{
    self, Ipv4Fields, Ipv6Fields, ESP_HDR_LEN, IPPROTO_ESP, IPPROTO_IPIP, IPPROTO_IPV6,
    IPPROTO_UDP, IPV4_DF_FLAG, IPV6_HDR_LEN, UDP_HDR_LEN,
};
use crate::{checksum, Error, Result};
use saverify_platform::{
    AuthAlgorithm, CipherAlgorithm, CryptoXform, IpsecXform, SaMode, TunnelType, UdpPorts,
};
use std::net::IpAddr;
use zeroize::Zeroizing;

/// ESP Packet
///
/// Represents an ESP packet as defined in RFC 4303.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EspPacket {
    /// Security Parameters Index (SPI)
    pub spi: u32,

    /// Sequence Number
    pub sequence: u32,

    /// Initialization Vector (IV) as carried on the wire
    ///
    /// - AES-GCM: 8 bytes
    /// - AES-CBC: 16 bytes
    /// - AES-CTR: 8 bytes
    /// - NULL: empty
    pub iv: Vec<u8>,

    /// Encrypted payload, padding, pad length and next header
    ///
    /// For AEAD ciphers, also includes authentication tag at the end.
    pub encrypted_data: Vec<u8>,

    /// Integrity Check Value (ICV)
    ///
    /// None for AEAD ciphers and NULL authentication.
    pub icv: Option<Vec<u8>>,
}

impl EspPacket {
    /// Create new ESP packet
    pub fn new(
        spi: u32,
        sequence: u32,
        iv: Vec<u8>,
        encrypted_data: Vec<u8>,
        icv: Option<Vec<u8>>,
    ) -> Self {
        EspPacket {
            spi,
            sequence,
            iv,
            encrypted_data,
            icv,
        }
    }

    /// Serialize ESP packet to bytes
    ///
    /// ```text
    /// | SPI (4) | Sequence (4) | IV (variable) | Encrypted Data (variable) | [ICV (variable)] |
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len());
        bytes.extend_from_slice(&self.spi.to_be_bytes());
        bytes.extend_from_slice(&self.sequence.to_be_bytes());
        bytes.extend_from_slice(&self.iv);
        bytes.extend_from_slice(&self.encrypted_data);
        if let Some(icv) = &self.icv {
            bytes.extend_from_slice(icv);
        }
        bytes
    }

    /// Parse ESP packet from bytes
    ///
    /// # Arguments
    ///
    /// * `data` - Raw ESP packet bytes
    /// * `iv_len` - On-wire IV length
    /// * `icv_len` - Length of the separate ICV field (0 for AEAD and NULL auth)
    ///
    /// # Errors
    ///
    /// `BufferTooShort` if packet is too short
    pub fn from_bytes(data: &[u8], iv_len: usize, icv_len: usize) -> Result<Self> {
        let min_len = ESP_HDR_LEN + iv_len + icv_len;
        if data.len() < min_len {
            return Err(Error::BufferTooShort {
                required: min_len,
                available: data.len(),
            });
        }

        let spi = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let sequence = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);

        let encrypted_start = ESP_HDR_LEN + iv_len;
        let encrypted_end = data.len() - icv_len;
        let iv = data[ESP_HDR_LEN..encrypted_start].to_vec();
        let encrypted_data = data[encrypted_start..encrypted_end].to_vec();
        let icv = if icv_len > 0 {
            Some(data[encrypted_end..].to_vec())
        } else {
            None
        };

        Ok(EspPacket {
            spi,
            sequence,
            iv,
            encrypted_data,
            icv,
        })
    }

    /// Get total packet length
    pub fn len(&self) -> usize {
        ESP_HDR_LEN + self.iv.len() + self.encrypted_data.len() + self.icv.as_ref().map_or(0, |i| i.len())
    }

    /// Check if packet is empty (never true, the header is always present)
    pub fn is_empty(&self) -> bool {
        false
    }

    fn header_and_iv(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(ESP_HDR_LEN + self.iv.len() + self.encrypted_data.len());
        data.extend_from_slice(&self.spi.to_be_bytes());
        data.extend_from_slice(&self.sequence.to_be_bytes());
        data.extend_from_slice(&self.iv);
        data
    }
}

/// Calculate padding length needed for ESP
///
/// # Arguments
///
/// * `payload_len` - Length of payload (without the 2 trailer bytes)
/// * `block_size` - Alignment (16 for AES-CBC, 4 otherwise)
///
/// # Formula
///
/// ```text
/// total_len = payload_len + pad_len + 2  // +2 for pad_length and next_header bytes
/// total_len % block_size == 0
/// ```
pub fn calculate_padding(payload_len: usize, block_size: usize) -> usize {
    let total_with_trailer = payload_len + 2;
    let remainder = total_with_trailer % block_size;
    if remainder == 0 {
        0
    } else {
        block_size - remainder
    }
}

/// On-wire IV length for a crypto transform
///
/// For AEAD the descriptor carries the full nonce length, of which the salt
/// is not transmitted.
pub fn wire_iv_len(crypto: &CryptoXform, salt_len: usize) -> usize {
    match crypto {
        CryptoXform::Aead(aead) => (aead.iv_len as usize).saturating_sub(salt_len),
        CryptoXform::Chain { cipher, .. } => match cipher.algo {
            CipherAlgorithm::Null => 0,
            CipherAlgorithm::AesCbc => cipher.iv_len as usize,
            CipherAlgorithm::AesCtr => crypto::CTR_IV_LEN,
        },
    }
}

/// Keyed ESP transform for one SA
pub struct EspTransform {
    crypto: CryptoXform,
    key: Zeroizing<Vec<u8>>,
    auth_key: Zeroizing<Vec<u8>>,
    salt: Vec<u8>,
}

impl std::fmt::Debug for EspTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EspTransform")
            .field("crypto", &self.crypto)
            .field("salt", &hex::encode(&self.salt))
            .finish_non_exhaustive()
    }
}

impl EspTransform {
    /// Key a transform
    ///
    /// # Errors
    ///
    /// - `UnsupportedCrypto` for algorithms or lengths this transform cannot run
    /// - `InvalidParameter` if key material does not match the descriptor
    pub fn new(crypto: CryptoXform, key: &[u8], auth_key: &[u8], salt: &[u8]) -> Result<Self> {
        match &crypto {
            CryptoXform::Aead(aead) => {
                check_key("AEAD", key, aead.key_len)?;
                if aead.digest_len as usize != crypto::GCM_TAG_LEN {
                    return Err(Error::UnsupportedCrypto(format!(
                        "{} tag length {}",
                        aead.algo.name(),
                        aead.digest_len
                    )));
                }
                if salt.len() + 8 != aead.iv_len as usize {
                    return Err(Error::InvalidParameter(format!(
                        "AES-GCM salt length {} does not fit nonce length {}",
                        salt.len(),
                        aead.iv_len
                    )));
                }
            }
            CryptoXform::Chain { cipher, auth } => {
                match cipher.algo {
                    CipherAlgorithm::Null => {}
                    CipherAlgorithm::AesCbc => check_key("cipher", key, cipher.key_len)?,
                    CipherAlgorithm::AesCtr => {
                        check_key("cipher", key, cipher.key_len)?;
                        if salt.len() != crypto::CTR_NONCE_LEN {
                            return Err(Error::InvalidParameter(format!(
                                "AES-CTR nonce length {}",
                                salt.len()
                            )));
                        }
                    }
                }
                match auth.algo {
                    AuthAlgorithm::Null => {}
                    AuthAlgorithm::AesXcbcMac => {
                        return Err(Error::UnsupportedCrypto(auth.algo.name().to_string()));
                    }
                    _ => {
                        check_key("auth", auth_key, auth.key_len)?;
                        if auth.digest_len as usize > crypto::mac_len(auth.algo) {
                            return Err(Error::UnsupportedCrypto(format!(
                                "{} digest length {}",
                                auth.algo.name(),
                                auth.digest_len
                            )));
                        }
                    }
                }
            }
        }

        Ok(EspTransform {
            crypto,
            key: Zeroizing::new(key.to_vec()),
            auth_key: Zeroizing::new(auth_key.to_vec()),
            salt: salt.to_vec(),
        })
    }

    /// Crypto descriptor this transform was keyed with
    pub fn crypto(&self) -> &CryptoXform {
        &self.crypto
    }

    /// On-wire IV length
    pub fn iv_len(&self) -> usize {
        wire_iv_len(&self.crypto, self.salt.len())
    }

    /// Payload alignment
    pub fn block_size(&self) -> usize {
        match self.crypto {
            CryptoXform::Chain { cipher, .. } if cipher.algo == CipherAlgorithm::AesCbc => {
                crypto::AES_BLOCK_LEN
            }
            _ => 4,
        }
    }

    /// Length of the separate ICV field (0 for AEAD, where the tag is in the payload)
    pub fn icv_len(&self) -> usize {
        match self.crypto {
            CryptoXform::Aead(_) => 0,
            CryptoXform::Chain { auth, .. } => auth.digest_len as usize,
        }
    }

    /// Encrypt and authenticate `payload`
    ///
    /// # Arguments
    ///
    /// * `spi` - Security Parameters Index
    /// * `sequence` - Sequence number
    /// * `iv` - On-wire IV ([`iv_len`](Self::iv_len) bytes)
    /// * `payload` - Data to protect
    /// * `next_header` - Protocol of `payload` (4 = IPv4, 41 = IPv6, ...)
    pub fn protect(
        &self,
        spi: u32,
        sequence: u32,
        iv: &[u8],
        payload: &[u8],
        next_header: u8,
    ) -> Result<EspPacket> {
        if iv.len() != self.iv_len() {
            return Err(Error::InvalidParameter(format!(
                "IV length {} (expected {})",
                iv.len(),
                self.iv_len()
            )));
        }

        let pad_len = calculate_padding(payload.len(), self.block_size());
        let mut plaintext = Vec::with_capacity(payload.len() + pad_len + 2);
        plaintext.extend_from_slice(payload);
        // RFC 4303 default padding: 1, 2, 3, ...
        plaintext.extend((1..=pad_len).map(|i| i as u8));
        plaintext.push(pad_len as u8);
        plaintext.push(next_header);

        match self.crypto {
            CryptoXform::Aead(_) => {
                let nonce = [self.salt.as_slice(), iv].concat();
                let aad = esp_aad(spi, sequence);
                let encrypted_data = crypto::aes_gcm_encrypt(&self.key, &nonce, &aad, &plaintext)?;
                Ok(EspPacket::new(spi, sequence, iv.to_vec(), encrypted_data, None))
            }
            CryptoXform::Chain { cipher, auth } => {
                self.apply_cipher(cipher.algo, iv, &mut plaintext, true)?;
                let mut esp = EspPacket::new(spi, sequence, iv.to_vec(), plaintext, None);
                if auth.algo != AuthAlgorithm::Null {
                    let mut covered = esp.header_and_iv();
                    covered.extend_from_slice(&esp.encrypted_data);
                    esp.icv = Some(crypto::compute_icv(
                        auth.algo,
                        &self.auth_key,
                        &covered,
                        auth.digest_len as usize,
                    )?);
                }
                Ok(esp)
            }
        }
    }

    /// Verify and decrypt an ESP packet
    ///
    /// # Returns
    ///
    /// Returns tuple of (decrypted_payload, next_header)
    ///
    /// # Errors
    ///
    /// - `Crypto` if the tag or ICV does not verify
    /// - `InvalidParameter` if the trailer is malformed
    pub fn unprotect(&self, esp: &EspPacket) -> Result<(Vec<u8>, u8)> {
        let plaintext = match self.crypto {
            CryptoXform::Aead(_) => {
                let nonce = [self.salt.as_slice(), esp.iv.as_slice()].concat();
                let aad = esp_aad(esp.spi, esp.sequence);
                crypto::aes_gcm_decrypt(&self.key, &nonce, &aad, &esp.encrypted_data)?
            }
            CryptoXform::Chain { cipher, auth } => {
                if auth.algo != AuthAlgorithm::Null {
                    let mut covered = esp.header_and_iv();
                    covered.extend_from_slice(&esp.encrypted_data);
                    let expected = crypto::compute_icv(
                        auth.algo,
                        &self.auth_key,
                        &covered,
                        auth.digest_len as usize,
                    )?;
                    let received = esp.icv.as_deref().unwrap_or_default();
                    if !crypto::icv_matches(&expected, received) {
                        return Err(Error::Crypto("ICV verification failed".into()));
                    }
                }
                let mut data = esp.encrypted_data.clone();
                self.apply_cipher(cipher.algo, &esp.iv, &mut data, false)?;
                data
            }
        };

        if plaintext.len() < 2 {
            return Err(Error::BufferTooShort {
                required: 2,
                available: plaintext.len(),
            });
        }
        let pad_len = plaintext[plaintext.len() - 2] as usize;
        let next_header = plaintext[plaintext.len() - 1];
        if pad_len + 2 > plaintext.len() {
            return Err(Error::InvalidParameter(format!(
                "ESP pad length {} exceeds payload {}",
                pad_len,
                plaintext.len()
            )));
        }

        let payload_len = plaintext.len() - pad_len - 2;
        Ok((plaintext[..payload_len].to_vec(), next_header))
    }

    fn apply_cipher(&self, algo: CipherAlgorithm, iv: &[u8], data: &mut [u8], encrypt: bool) -> Result<()> {
        match algo {
            CipherAlgorithm::Null => Ok(()),
            CipherAlgorithm::AesCbc if encrypt => crypto::aes_cbc_encrypt(&self.key, iv, data),
            CipherAlgorithm::AesCbc => crypto::aes_cbc_decrypt(&self.key, iv, data),
            CipherAlgorithm::AesCtr => {
                let block = crypto::ctr_block(&self.salt, iv)?;
                crypto::aes_ctr_apply(&self.key, &block, data)
            }
        }
    }
}

fn check_key(what: &str, key: &[u8], expected: u16) -> Result<()> {
    if key.len() != expected as usize {
        return Err(Error::InvalidParameter(format!(
            "{} key length {} (expected {})",
            what,
            key.len(),
            expected
        )));
    }
    Ok(())
}

fn esp_aad(spi: u32, sequence: u32) -> [u8; ESP_HDR_LEN] {
    let mut aad = [0u8; ESP_HDR_LEN];
    aad[..4].copy_from_slice(&spi.to_be_bytes());
    aad[4..].copy_from_slice(&sequence.to_be_bytes());
    aad
}

fn prepend_udp(sa: &IpsecXform, esp: Vec<u8>) -> Result<Vec<u8>> {
    if !sa.options.udp_encap {
        return Ok(esp);
    }
    let udp = packet::build_udp_header(sa.udp.sport, sa.udp.dport, esp.len())?;
    Ok([udp.as_slice(), esp.as_slice()].concat())
}

/// Build the outbound IPsec packet for `inner`
///
/// Tunnel mode wraps the whole inner packet behind a new outer header.
/// Transport mode keeps the IP header and protects its payload. With UDP
/// encapsulation a UDP header (RFC 3948) sits between the IP and ESP headers.
pub fn encapsulate(
    sa: &IpsecXform,
    transform: &EspTransform,
    sequence: u32,
    iv: &[u8],
    inner: &[u8],
) -> Result<Vec<u8>> {
    let outer_proto = if sa.options.udp_encap {
        IPPROTO_UDP
    } else {
        IPPROTO_ESP
    };

    match sa.mode {
        SaMode::Tunnel => {
            let next_header = if packet::is_ipv4(inner) {
                IPPROTO_IPIP
            } else if packet::is_ipv6(inner) {
                IPPROTO_IPV6
            } else {
                return Err(Error::InvalidParameter("inner packet is not IP".into()));
            };
            let esp = transform.protect(sa.spi, sequence, iv, inner, next_header)?;
            let payload = prepend_udp(sa, esp.to_bytes())?;

            let mut out = match sa.tunnel.tunnel_type {
                TunnelType::Ipv4 => {
                    let t = &sa.tunnel.ipv4;
                    let df = if sa.options.copy_df && packet::is_ipv4(inner) {
                        packet::ipv4_df(inner)?
                    } else {
                        t.df
                    };
                    let hdr = packet::build_ipv4_header(
                        &Ipv4Fields {
                            src: t.src,
                            dst: t.dst,
                            tos: t.dscp << 2,
                            frag: if df { IPV4_DF_FLAG } else { 0 },
                            ttl: t.ttl,
                            proto: outer_proto,
                        },
                        payload.len(),
                    )?;
                    hdr.to_vec()
                }
                TunnelType::Ipv6 => {
                    let t = &sa.tunnel.ipv6;
                    let hdr = packet::build_ipv6_header(
                        &Ipv6Fields {
                            src: t.src,
                            dst: t.dst,
                            traffic_class: t.dscp << 2,
                            flow_label: t.flabel,
                            next_header: outer_proto,
                            hop_limit: t.hlimit,
                        },
                        payload.len(),
                    )?;
                    hdr.to_vec()
                }
            };
            out.extend_from_slice(&payload);
            Ok(out)
        }
        SaMode::Transport => {
            let (proto, hlen) = packet::l3_info(inner)?;
            let end = l3_end(inner)?;
            let esp = transform.protect(sa.spi, sequence, iv, &inner[hlen..end], proto)?;
            let payload = prepend_udp(sa, esp.to_bytes())?;

            let mut out = inner[..hlen].to_vec();
            out.extend_from_slice(&payload);
            rewrite_transport_header(&mut out, hlen, outer_proto)?;
            Ok(out)
        }
    }
}

// End of the IP datagram, ignoring link-layer trailing bytes
fn l3_end(pkt: &[u8]) -> Result<usize> {
    let end = if packet::is_ipv4(pkt) {
        packet::ipv4_total_len(pkt)? as usize
    } else {
        IPV6_HDR_LEN + packet::ipv6_payload_len(pkt)? as usize
    };
    if end > pkt.len() {
        return Err(Error::BufferTooShort {
            required: end,
            available: pkt.len(),
        });
    }
    Ok(end)
}

fn rewrite_transport_header(pkt: &mut [u8], hlen: usize, proto: u8) -> Result<()> {
    if packet::is_ipv4(pkt) {
        let total = u16::try_from(pkt.len())
            .map_err(|_| Error::InvalidParameter("IPv4 packet too large".into()))?;
        packet::write_u16(pkt, 2, total)?;
        pkt[9] = proto;
        checksum::update_ipv4_checksum(pkt)
    } else {
        let plen = u16::try_from(pkt.len() - hlen)
            .map_err(|_| Error::InvalidParameter("IPv6 payload too large".into()))?;
        packet::write_u16(pkt, 4, plen)?;
        pkt[6] = proto;
        Ok(())
    }
}

/// Result of inbound ESP processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decapsulated {
    /// Outer source address
    pub outer_src: IpAddr,
    /// Outer destination address
    pub outer_dst: IpAddr,
    /// UDP encapsulation ports, if the packet carried a UDP header
    pub udp_ports: Option<UdpPorts>,
    /// SPI from the ESP header
    pub spi: u32,
    /// Sequence number from the ESP header
    pub sequence: u32,
    /// Recovered inner packet
    pub inner: Vec<u8>,
}

/// Recover the inner packet from an inbound IPsec packet
///
/// # Errors
///
/// - `InvalidParameter` if the packet does not carry ESP (UDP is only
///   accepted on SAs with UDP encapsulation)
/// - `Crypto` if integrity verification fails
pub fn decapsulate(sa: &IpsecXform, transform: &EspTransform, pkt: &[u8]) -> Result<Decapsulated> {
    let (proto, hlen) = packet::l3_info(pkt)?;
    let end = l3_end(pkt)?;
    let (outer_src, outer_dst) = if packet::is_ipv4(pkt) {
        (
            IpAddr::V4(packet::ipv4_src(pkt)?),
            IpAddr::V4(packet::ipv4_dst(pkt)?),
        )
    } else {
        (
            IpAddr::V6(packet::ipv6_src(pkt)?),
            IpAddr::V6(packet::ipv6_dst(pkt)?),
        )
    };

    let (udp_ports, esp_start) = match proto {
        IPPROTO_ESP => (None, hlen),
        IPPROTO_UDP if sa.options.udp_encap => {
            let ports = UdpPorts {
                sport: packet::read_u16(pkt, hlen)?,
                dport: packet::read_u16(pkt, hlen + 2)?,
            };
            (Some(ports), hlen + UDP_HDR_LEN)
        }
        other => {
            return Err(Error::InvalidParameter(format!(
                "protocol {} is not ESP",
                other
            )));
        }
    };
    if esp_start > end {
        return Err(Error::BufferTooShort {
            required: esp_start,
            available: end,
        });
    }

    let esp = EspPacket::from_bytes(&pkt[esp_start..end], transform.iv_len(), transform.icv_len())?;
    let (payload, next_header) = transform.unprotect(&esp)?;

    let inner = match sa.mode {
        SaMode::Tunnel => payload,
        SaMode::Transport => {
            let mut inner = pkt[..hlen].to_vec();
            inner.extend_from_slice(&payload);
            rewrite_transport_header(&mut inner, hlen, next_header)?;
            inner
        }
    };

    Ok(Decapsulated {
        outer_src,
        outer_dst,
        udp_ports,
        spi: esp.spi,
        sequence: esp.sequence,
        inner,
    })
}
