//! Internet checksums (RFC 1071)
//!
//! IPv4 header checksum and TCP / UDP checksums over the IPv4 or IPv6
//! pseudo-header. Every function computes as if the checksum field itself
//! were zero, so a stored checksum can be checked by recomputing it.

use crate::packet::{self, IPPROTO_TCP, IPPROTO_UDP};
use crate::{Error, Result};

/// One's-complement sum of `data` as big-endian 16-bit words, added to `initial`
///
/// An odd trailing byte is padded with zero.
pub fn ones_complement_sum(data: &[u8], initial: u32) -> u32 {
    let mut sum = initial;
    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum = sum.wrapping_add(u16::from_be_bytes([word[0], word[1]]) as u32);
    }
    if let [last] = chunks.remainder() {
        sum = sum.wrapping_add((*last as u32) << 8);
    }
    sum
}

/// Fold carries into 16 bits (no inversion)
pub fn fold(mut sum: u32) -> u16 {
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    sum as u16
}

// Sum of `data` with the 16-bit word at `skip` treated as zero
fn sum_skipping(data: &[u8], skip: usize, initial: u32) -> u32 {
    let sum = ones_complement_sum(&data[..skip], initial);
    ones_complement_sum(&data[skip + 2..], sum)
}

/// IPv4 header checksum of the header at the start of `pkt`
pub fn ipv4_header_checksum(pkt: &[u8]) -> Result<u16> {
    let hlen = packet::ipv4_header_len(pkt)?;
    Ok(!fold(sum_skipping(&pkt[..hlen], 10, 0)))
}

/// Recompute and store the IPv4 header checksum
pub fn update_ipv4_checksum(pkt: &mut [u8]) -> Result<()> {
    let cksum = ipv4_header_checksum(pkt)?;
    packet::set_ipv4_checksum_field(pkt, cksum)
}

/// Whether the stored IPv4 header checksum is correct
pub fn verify_ipv4_checksum(pkt: &[u8]) -> Result<bool> {
    Ok(packet::ipv4_checksum_field(pkt)? == ipv4_header_checksum(pkt)?)
}

struct L4Location {
    offset: usize,
    len: usize,
    proto: u8,
    cksum_off: usize,
    pseudo_sum: u32,
}

fn l4_location(pkt: &[u8]) -> Result<Option<L4Location>> {
    let (proto, hlen) = packet::l3_info(pkt)?;
    let cksum_off = match proto {
        IPPROTO_TCP => 16,
        IPPROTO_UDP => 6,
        _ => return Ok(None),
    };

    let (len, pseudo_sum) = if packet::is_ipv4(pkt) {
        let total = packet::ipv4_total_len(pkt)? as usize;
        let len = total.checked_sub(hlen).ok_or_else(|| {
            Error::InvalidParameter(format!("IPv4 total length {} below header length", total))
        })?;
        let mut sum = ones_complement_sum(&pkt[12..20], 0);
        sum = sum.wrapping_add(proto as u32);
        sum = sum.wrapping_add(len as u32);
        (len, sum)
    } else {
        let len = packet::ipv6_payload_len(pkt)? as usize;
        let mut sum = ones_complement_sum(&pkt[8..40], 0);
        sum = ones_complement_sum(&(len as u32).to_be_bytes(), sum);
        sum = sum.wrapping_add(proto as u32);
        (len, sum)
    };

    let required = hlen + len.max(cksum_off + 2);
    if pkt.len() < required {
        return Err(Error::BufferTooShort {
            required,
            available: pkt.len(),
        });
    }

    Ok(Some(L4Location {
        offset: hlen,
        len,
        proto,
        cksum_off,
        pseudo_sum,
    }))
}

/// TCP / UDP checksum of the packet, `None` for other protocols
pub fn l4_checksum(pkt: &[u8]) -> Result<Option<u16>> {
    let loc = match l4_location(pkt)? {
        Some(loc) => loc,
        None => return Ok(None),
    };
    let l4 = &pkt[loc.offset..loc.offset + loc.len];
    let cksum = !fold(sum_skipping(l4, loc.cksum_off, loc.pseudo_sum));

    // UDP transmits an all-zero result as all ones
    if loc.proto == IPPROTO_UDP && cksum == 0 {
        return Ok(Some(0xffff));
    }
    Ok(Some(cksum))
}

/// Recompute and store the TCP / UDP checksum (no-op for other protocols)
pub fn update_l4_checksum(pkt: &mut [u8]) -> Result<()> {
    let cksum = match l4_checksum(pkt)? {
        Some(c) => c,
        None => return Ok(()),
    };
    if let Some(loc) = l4_location(pkt)? {
        packet::write_u16(pkt, loc.offset + loc.cksum_off, cksum)?;
    }
    Ok(())
}

/// Whether the stored TCP / UDP checksum is correct (true for other protocols)
pub fn verify_l4_checksum(pkt: &[u8]) -> Result<bool> {
    let loc = match l4_location(pkt)? {
        Some(loc) => loc,
        None => return Ok(true),
    };
    let stored = packet::read_u16(pkt, loc.offset + loc.cksum_off)?;
    Ok(l4_checksum(pkt)? == Some(stored))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_header_checksum_known_answer() {
        let hdr = hex::decode("450000730000400040110000c0a80001c0a800c7").unwrap();
        assert_eq!(ipv4_header_checksum(&hdr).unwrap(), 0xb861);
    }

    #[test]
    fn test_checksum_ignores_stored_value() {
        let mut hdr = hex::decode("45000073000040004011ffffc0a80001c0a800c7").unwrap();
        assert_eq!(ipv4_header_checksum(&hdr).unwrap(), 0xb861);
        assert!(!verify_ipv4_checksum(&hdr).unwrap());

        update_ipv4_checksum(&mut hdr).unwrap();
        assert!(verify_ipv4_checksum(&hdr).unwrap());
    }

    #[test]
    fn test_fold() {
        assert_eq!(fold(0x1_fffe), 0xffff);
        assert_eq!(fold(0x2_0001), 0x0003);
    }

    #[test]
    fn test_odd_length_sum() {
        assert_eq!(ones_complement_sum(&[0x01, 0x02, 0x03], 0), 0x0102 + 0x0300);
    }

    #[test]
    fn test_udp_checksum_ipv4() {
        // 10.0.0.1:1234 -> 10.0.0.2:80, payload "hi"
        let mut pkt = hex::decode(
            "4500001e00000000401100000a0000010a00000204d20050000a00006869",
        )
        .unwrap();
        update_ipv4_checksum(&mut pkt).unwrap();
        update_l4_checksum(&mut pkt).unwrap();
        assert!(verify_l4_checksum(&pkt).unwrap());

        pkt[28] ^= 0x01;
        assert!(!verify_l4_checksum(&pkt).unwrap());
    }

    #[test]
    fn test_tcp_checksum_ipv6() {
        let mut pkt = vec![0u8; 40 + 20];
        pkt[0] = 0x60;
        pkt[5] = 20; // payload length
        pkt[6] = IPPROTO_TCP;
        pkt[7] = 64;
        pkt[23] = 1;
        pkt[39] = 2;
        pkt[40 + 12] = 0x50;

        update_l4_checksum(&mut pkt).unwrap();
        assert!(verify_l4_checksum(&pkt).unwrap());
        assert_ne!(packet::read_u16(&pkt, 40 + 16).unwrap(), 0);
    }

    #[test]
    fn test_non_l4_protocol() {
        let hdr = hex::decode("450000140000000040320000c0a80001c0a800c7").unwrap();
        assert_eq!(l4_checksum(&hdr).unwrap(), None);
        assert!(verify_l4_checksum(&hdr).unwrap());
    }

    #[test]
    fn test_truncated_l4() {
        let hdr = hex::decode("450000300000000040060000c0a80001c0a800c7").unwrap();
        assert!(matches!(l4_checksum(&hdr), Err(Error::BufferTooShort { .. })));
    }
}
