//! Packet layouts and header accessors
//!
//! Byte-level views of the IPv4 (RFC 791), IPv6 (RFC 8200), UDP, TCP and ESP
//! (RFC 4303) headers the verification engine has to look into. Accessors
//! take the packet starting at the header in question and fail with
//! [`Error::BufferTooShort`] instead of panicking on truncated input.

use crate::checksum;
use crate::{Error, Result};
use std::net::{Ipv4Addr, Ipv6Addr};

/// IPv4 header length without options
pub const IPV4_HDR_LEN: usize = 20;
/// IPv6 fixed header length
pub const IPV6_HDR_LEN: usize = 40;
/// UDP header length
pub const UDP_HDR_LEN: usize = 8;
/// TCP header length without options
pub const TCP_HDR_LEN: usize = 20;
/// ESP header length (SPI + sequence number)
pub const ESP_HDR_LEN: usize = 8;

/// IP-in-IP
pub const IPPROTO_IPIP: u8 = 4;
/// TCP
pub const IPPROTO_TCP: u8 = 6;
/// UDP
pub const IPPROTO_UDP: u8 = 17;
/// IPv6 encapsulation
pub const IPPROTO_IPV6: u8 = 41;
/// ESP
pub const IPPROTO_ESP: u8 = 50;

/// Don't Fragment flag in the IPv4 fragment field
pub const IPV4_DF_FLAG: u16 = 0x4000;
/// More Fragments flag in the IPv4 fragment field
pub const IPV4_MF_FLAG: u16 = 0x2000;
/// Fragment offset bits in the IPv4 fragment field
pub const IPV4_FRAG_OFFSET_MASK: u16 = 0x1fff;

const IPV4_FRAG_OFF: usize = 6;
const IPV4_PROTO_OFF: usize = 9;
const IPV4_CKSUM_OFF: usize = 10;
const IPV6_NEXT_HDR_OFF: usize = 6;

/// Read a big-endian u16 at `off`
pub fn read_u16(pkt: &[u8], off: usize) -> Result<u16> {
    check_len(pkt, off + 2)?;
    Ok(u16::from_be_bytes([pkt[off], pkt[off + 1]]))
}

/// Write a big-endian u16 at `off`
pub fn write_u16(pkt: &mut [u8], off: usize, value: u16) -> Result<()> {
    check_len(pkt, off + 2)?;
    pkt[off..off + 2].copy_from_slice(&value.to_be_bytes());
    Ok(())
}

fn check_len(pkt: &[u8], required: usize) -> Result<()> {
    if pkt.len() < required {
        return Err(Error::BufferTooShort {
            required,
            available: pkt.len(),
        });
    }
    Ok(())
}

/// IP version nibble of the first byte
pub fn ip_version(pkt: &[u8]) -> Option<u8> {
    pkt.first().map(|b| b >> 4)
}

/// Whether the packet starts with an IPv4 version nibble
pub fn is_ipv4(pkt: &[u8]) -> bool {
    ip_version(pkt) == Some(4)
}

/// Whether the packet starts with an IPv6 version nibble
pub fn is_ipv6(pkt: &[u8]) -> bool {
    ip_version(pkt) == Some(6)
}

/// Whether the packet carries a plausible IPv4 header
///
/// Version must be 4, IHL at least 5 words and the total length at least
/// one minimal header.
pub fn is_valid_ipv4(pkt: &[u8]) -> bool {
    if pkt.len() < IPV4_HDR_LEN || !is_ipv4(pkt) {
        return false;
    }
    if pkt[0] & 0x0f < 5 {
        return false;
    }
    u16::from_be_bytes([pkt[2], pkt[3]]) as usize >= IPV4_HDR_LEN
}

/// Whether the packet carries a plausible IPv6 header
pub fn is_valid_ipv6(pkt: &[u8]) -> bool {
    pkt.len() >= IPV6_HDR_LEN && is_ipv6(pkt)
}

/// IPv4 header length from IHL
pub fn ipv4_header_len(pkt: &[u8]) -> Result<usize> {
    check_len(pkt, IPV4_HDR_LEN)?;
    let len = ((pkt[0] & 0x0f) as usize) * 4;
    if len < IPV4_HDR_LEN {
        return Err(Error::InvalidParameter(format!("IPv4 IHL too small: {}", len)));
    }
    check_len(pkt, len)?;
    Ok(len)
}

/// IPv4 total length field
pub fn ipv4_total_len(pkt: &[u8]) -> Result<u16> {
    read_u16(pkt, 2)
}

/// IPv4 flags + fragment offset field
pub fn ipv4_frag_field(pkt: &[u8]) -> Result<u16> {
    read_u16(pkt, IPV4_FRAG_OFF)
}

/// Overwrite the IPv4 flags + fragment offset field (checksum untouched)
pub fn set_ipv4_frag_field(pkt: &mut [u8], value: u16) -> Result<()> {
    write_u16(pkt, IPV4_FRAG_OFF, value)
}

/// Whether the IPv4 DF flag is set
pub fn ipv4_df(pkt: &[u8]) -> Result<bool> {
    Ok(ipv4_frag_field(pkt)? & IPV4_DF_FLAG != 0)
}

/// IPv4 protocol field
pub fn ipv4_proto(pkt: &[u8]) -> Result<u8> {
    check_len(pkt, IPV4_HDR_LEN)?;
    Ok(pkt[IPV4_PROTO_OFF])
}

/// IPv4 header checksum field
pub fn ipv4_checksum_field(pkt: &[u8]) -> Result<u16> {
    read_u16(pkt, IPV4_CKSUM_OFF)
}

/// Overwrite the IPv4 header checksum field
pub fn set_ipv4_checksum_field(pkt: &mut [u8], value: u16) -> Result<()> {
    write_u16(pkt, IPV4_CKSUM_OFF, value)
}

/// IPv4 source address
pub fn ipv4_src(pkt: &[u8]) -> Result<Ipv4Addr> {
    check_len(pkt, IPV4_HDR_LEN)?;
    Ok(Ipv4Addr::new(pkt[12], pkt[13], pkt[14], pkt[15]))
}

/// IPv4 destination address
pub fn ipv4_dst(pkt: &[u8]) -> Result<Ipv4Addr> {
    check_len(pkt, IPV4_HDR_LEN)?;
    Ok(Ipv4Addr::new(pkt[16], pkt[17], pkt[18], pkt[19]))
}

/// IPv6 payload length field
pub fn ipv6_payload_len(pkt: &[u8]) -> Result<u16> {
    read_u16(pkt, 4)
}

/// IPv6 next header field
pub fn ipv6_next_header(pkt: &[u8]) -> Result<u8> {
    check_len(pkt, IPV6_HDR_LEN)?;
    Ok(pkt[IPV6_NEXT_HDR_OFF])
}

/// IPv6 source address
pub fn ipv6_src(pkt: &[u8]) -> Result<Ipv6Addr> {
    check_len(pkt, IPV6_HDR_LEN)?;
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&pkt[8..24]);
    Ok(Ipv6Addr::from(octets))
}

/// IPv6 destination address
pub fn ipv6_dst(pkt: &[u8]) -> Result<Ipv6Addr> {
    check_len(pkt, IPV6_HDR_LEN)?;
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&pkt[24..40]);
    Ok(Ipv6Addr::from(octets))
}

/// Upper-layer protocol and L3 header length of an IPv4 or IPv6 packet
///
/// IPv6 extension headers are not walked.
pub fn l3_info(pkt: &[u8]) -> Result<(u8, usize)> {
    match ip_version(pkt) {
        Some(4) => Ok((ipv4_proto(pkt)?, ipv4_header_len(pkt)?)),
        Some(6) => Ok((ipv6_next_header(pkt)?, IPV6_HDR_LEN)),
        other => Err(Error::InvalidParameter(format!(
            "not an IP packet (version {:?})",
            other
        ))),
    }
}

/// Outer IPv4 header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Fields {
    /// Source address
    pub src: Ipv4Addr,
    /// Destination address
    pub dst: Ipv4Addr,
    /// Type of service byte
    pub tos: u8,
    /// Flags + fragment offset
    pub frag: u16,
    /// Time to live
    pub ttl: u8,
    /// Protocol
    pub proto: u8,
}

/// Minimal IPv4 header with a valid checksum
pub fn build_ipv4_header(fields: &Ipv4Fields, payload_len: usize) -> Result<[u8; IPV4_HDR_LEN]> {
    let total = u16::try_from(IPV4_HDR_LEN + payload_len)
        .map_err(|_| Error::InvalidParameter("IPv4 packet too large".into()))?;

    let mut hdr = [0u8; IPV4_HDR_LEN];
    hdr[0] = 0x45;
    hdr[1] = fields.tos;
    hdr[2..4].copy_from_slice(&total.to_be_bytes());
    hdr[6..8].copy_from_slice(&fields.frag.to_be_bytes());
    hdr[8] = fields.ttl;
    hdr[9] = fields.proto;
    hdr[12..16].copy_from_slice(&fields.src.octets());
    hdr[16..20].copy_from_slice(&fields.dst.octets());
    checksum::update_ipv4_checksum(&mut hdr)?;
    Ok(hdr)
}

/// Outer IPv6 header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Fields {
    /// Source address
    pub src: Ipv6Addr,
    /// Destination address
    pub dst: Ipv6Addr,
    /// Traffic class
    pub traffic_class: u8,
    /// Flow label (20 bits)
    pub flow_label: u32,
    /// Next header
    pub next_header: u8,
    /// Hop limit
    pub hop_limit: u8,
}

/// IPv6 fixed header
pub fn build_ipv6_header(fields: &Ipv6Fields, payload_len: usize) -> Result<[u8; IPV6_HDR_LEN]> {
    let plen = u16::try_from(payload_len)
        .map_err(|_| Error::InvalidParameter("IPv6 payload too large".into()))?;

    let vtf = (6u32 << 28) | ((fields.traffic_class as u32) << 20) | (fields.flow_label & 0xfffff);
    let mut hdr = [0u8; IPV6_HDR_LEN];
    hdr[0..4].copy_from_slice(&vtf.to_be_bytes());
    hdr[4..6].copy_from_slice(&plen.to_be_bytes());
    hdr[6] = fields.next_header;
    hdr[7] = fields.hop_limit;
    hdr[8..24].copy_from_slice(&fields.src.octets());
    hdr[24..40].copy_from_slice(&fields.dst.octets());
    Ok(hdr)
}

/// UDP header with a zero checksum
pub fn build_udp_header(sport: u16, dport: u16, payload_len: usize) -> Result<[u8; UDP_HDR_LEN]> {
    let len = u16::try_from(UDP_HDR_LEN + payload_len)
        .map_err(|_| Error::InvalidParameter("UDP datagram too large".into()))?;

    let mut hdr = [0u8; UDP_HDR_LEN];
    hdr[0..2].copy_from_slice(&sport.to_be_bytes());
    hdr[2..4].copy_from_slice(&dport.to_be_bytes());
    hdr[4..6].copy_from_slice(&len.to_be_bytes());
    Ok(hdr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv4_sample() -> Vec<u8> {
        hex::decode("450000730000400040110000c0a80001c0a800c7").unwrap()
    }

    #[test]
    fn test_ipv4_accessors() {
        let pkt = ipv4_sample();
        assert!(is_valid_ipv4(&pkt));
        assert_eq!(ipv4_header_len(&pkt).unwrap(), 20);
        assert_eq!(ipv4_total_len(&pkt).unwrap(), 0x73);
        assert!(ipv4_df(&pkt).unwrap());
        assert_eq!(ipv4_proto(&pkt).unwrap(), IPPROTO_UDP);
        assert_eq!(ipv4_src(&pkt).unwrap(), Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(ipv4_dst(&pkt).unwrap(), Ipv4Addr::new(192, 168, 0, 199));
    }

    #[test]
    fn test_ipv4_validity() {
        let mut pkt = ipv4_sample();
        pkt[0] = 0x44; // IHL 4
        assert!(!is_valid_ipv4(&pkt));

        let mut pkt = ipv4_sample();
        pkt[2] = 0;
        pkt[3] = 19;
        assert!(!is_valid_ipv4(&pkt));

        assert!(!is_valid_ipv4(&pkt[..10]));
        assert!(!is_valid_ipv6(&ipv4_sample()));
    }

    #[test]
    fn test_frag_field_roundtrip() {
        let mut pkt = ipv4_sample();
        set_ipv4_frag_field(&mut pkt, 0).unwrap();
        assert!(!ipv4_df(&pkt).unwrap());
        set_ipv4_frag_field(&mut pkt, IPV4_DF_FLAG | 4).unwrap();
        assert_eq!(ipv4_frag_field(&pkt).unwrap() & IPV4_FRAG_OFFSET_MASK, 4);
    }

    #[test]
    fn test_truncated_reads_fail() {
        assert!(matches!(
            read_u16(&[0x45], 0),
            Err(Error::BufferTooShort {
                required: 2,
                available: 1
            })
        ));
        assert!(ipv6_next_header(&[0x60; 10]).is_err());
    }

    #[test]
    fn test_build_ipv4_header() {
        let hdr = build_ipv4_header(
            &Ipv4Fields {
                src: Ipv4Addr::new(192, 168, 0, 1),
                dst: Ipv4Addr::new(192, 168, 0, 199),
                tos: 0,
                frag: IPV4_DF_FLAG,
                ttl: 64,
                proto: IPPROTO_UDP,
            },
            0x73 - 20,
        )
        .unwrap();
        assert_eq!(hex::encode(hdr), "450000730000400040110000c0a80001c0a800c7".replace("40110000", "4011b861"));
    }

    #[test]
    fn test_build_ipv6_header() {
        let hdr = build_ipv6_header(
            &Ipv6Fields {
                src: "2001:db8::1".parse().unwrap(),
                dst: "2001:db8::2".parse().unwrap(),
                traffic_class: 0,
                flow_label: 0x12345,
                next_header: IPPROTO_ESP,
                hop_limit: 64,
            },
            100,
        )
        .unwrap();
        assert!(is_valid_ipv6(&hdr));
        assert_eq!(&hdr[0..4], &[0x60, 0x01, 0x23, 0x45]);
        assert_eq!(ipv6_payload_len(&hdr).unwrap(), 100);
        assert_eq!(ipv6_next_header(&hdr).unwrap(), IPPROTO_ESP);
        assert_eq!(l3_info(&hdr).unwrap(), (IPPROTO_ESP, IPV6_HDR_LEN));
    }

    #[test]
    fn test_build_udp_header() {
        let hdr = build_udp_header(4500, 4500, 92).unwrap();
        assert_eq!(hdr, [0x11, 0x94, 0x11, 0x94, 0x00, 0x64, 0x00, 0x00]);
    }
}
