//! Post-processing and verification engine
//!
//! Judges one transformed packet against the record it came from. Egress
//! packets first get their outer header validated; then either the bytes
//! are compared with the expected output (known vectors, every inbound
//! leg), or, in combined mode, they are handed on as the input of the
//! inbound record that will verify them later.
//!
//! # Direct comparison
//!
//! ```text
//! ingress + expected error      -> accepted, judged by status alone
//! egress + UDP encapsulation    -> outer proto must be UDP, window shifts by 8
//! length                        -> must equal the expected length
//! egress + fragment             -> outer header carries no fragment bits
//! tunnel header                 -> skipped on both sides (egress tunnel only)
//! ingress + IP / L4 checksum    -> judged by the offload flag and a recompute
//! otherwise                     -> DF policy applied to the expected bytes, exact compare
//! ```

use crate::derive;
use crate::flags::{DfPolicy, TestFlags};
use crate::iv_history::IvHistory;
use crate::logging;
use crate::packet::{
    self, ESP_HDR_LEN, IPPROTO_UDP, IPV4_DF_FLAG, IPV4_FRAG_OFFSET_MASK, IPV4_HDR_LEN,
    IPV4_MF_FLAG, IPV6_HDR_LEN, UDP_HDR_LEN,
};
use crate::vectors::IpsecTestData;
use crate::{checksum, esp, Error, Result};
use saverify_platform::{CompletedOp, SaDirection, SaMode, TunnelType, TunnelVerify};

/// Length of the outer tunnel header the device adds
///
/// Zero unless the record is an egress tunnel-mode SA.
pub fn tunnel_hdr_len(td: &IpsecTestData) -> usize {
    let sa = &td.ipsec_xform;
    if sa.direction != SaDirection::Egress || sa.mode != SaMode::Tunnel {
        return 0;
    }
    match sa.tunnel.tunnel_type {
        TunnelType::Ipv4 => IPV4_HDR_LEN,
        TunnelType::Ipv6 => IPV6_HDR_LEN,
    }
}

/// Rewrite the DF bit of an IPv4 packet per the scenario's DF policy
///
/// DF ends up set for [`DfPolicy::CopyInner1`] and [`DfPolicy::Set0Inner1`]
/// and clear for the other two; the header checksum is recomputed. No-op
/// without a DF policy.
///
/// # Errors
///
/// Returns `InvalidParameter` if a DF policy is set and `pkt` is not IPv4
pub fn pkt_update(pkt: &mut [u8], flags: &TestFlags) -> Result<()> {
    let policy = match flags.df {
        Some(policy) => policy,
        None => return Ok(()),
    };
    if !packet::is_ipv4(pkt) {
        return Err(Error::InvalidParameter(
            "DF update on a packet that is not IPv4".into(),
        ));
    }

    let frag = packet::ipv4_frag_field(pkt)?;
    let frag = if policy.inner_df() {
        frag | IPV4_DF_FLAG
    } else {
        frag & !IPV4_DF_FLAG
    };
    packet::set_ipv4_frag_field(pkt, frag)?;
    checksum::update_ipv4_checksum(pkt)
}

// Offset of the IV in an egress packet: outer (or transport) IP header,
// optional UDP header, ESP header
fn iv_offset(pkt: &[u8], td: &IpsecTestData) -> Result<usize> {
    let sa = &td.ipsec_xform;
    let l3 = match sa.mode {
        SaMode::Tunnel => tunnel_hdr_len(td),
        SaMode::Transport => packet::l3_info(pkt)?.1,
    };
    let udp = if sa.options.udp_encap { UDP_HDR_LEN } else { 0 };
    Ok(l3 + udp + ESP_HDR_LEN)
}

/// Check the IV of an egress packet against the SA's history and record it
///
/// Transforms without an IV (NULL cipher) have nothing to check.
///
/// # Errors
///
/// - `IvRepeated` if the IV was seen within the window
/// - `IvTooLong` if the transform's IV does not fit a history slot
/// - `BufferTooShort` if the packet ends before the IV does
pub fn iv_verify(pkt: &[u8], td: &IpsecTestData, ivs: &mut IvHistory) -> Result<()> {
    let iv_len = esp::wire_iv_len(&td.xform, td.salt.len());
    if iv_len == 0 {
        return Ok(());
    }

    let start = iv_offset(pkt, td)?;
    let iv = pkt.get(start..start + iv_len).ok_or(Error::BufferTooShort {
        required: start + iv_len,
        available: pkt.len(),
    })?;

    let result = ivs.check_and_push(iv);
    if result == Err(Error::IvRepeated) {
        logging::log_iv_repeated(td.ipsec_xform.spi, iv);
    }
    result
}

// Outer header checks every egress packet must pass
fn verify_egress_header(pkt: &[u8], td: &IpsecTestData, flags: &TestFlags) -> Result<()> {
    let sa = &td.ipsec_xform;
    match sa.mode {
        SaMode::Transport => {
            if flags.ipv6 {
                if !packet::is_valid_ipv6(pkt) {
                    return Err(Error::InvalidOuterHeader(
                        "Transport packet is not IPv6".into(),
                    ));
                }
            } else if !packet::is_valid_ipv4(pkt) {
                return Err(Error::InvalidOuterHeader(
                    "Transport packet is not IPv4".into(),
                ));
            }
        }
        SaMode::Tunnel => match sa.tunnel.tunnel_type {
            TunnelType::Ipv4 => {
                if !packet::is_valid_ipv4(pkt) {
                    return Err(Error::InvalidOuterHeader(
                        "Tunnel outer header is not IPv4".into(),
                    ));
                }
                let expected = matches!(
                    flags.df,
                    Some(DfPolicy::CopyInner1) | Some(DfPolicy::Set1Inner0)
                );
                if packet::ipv4_df(pkt)? != expected {
                    return Err(Error::DfBit { expected });
                }
            }
            TunnelType::Ipv6 => {
                if !packet::is_valid_ipv6(pkt) {
                    return Err(Error::InvalidOuterHeader(
                        "Tunnel outer header is not IPv6".into(),
                    ));
                }
            }
        },
    }
    Ok(())
}

fn l3_csum_verify(pkt: &[u8]) -> Result<()> {
    if !packet::is_ipv4(pkt) {
        return Err(Error::NotApplicable(
            "IP checksum on a packet that is not IPv4".into(),
        ));
    }
    if checksum::verify_ipv4_checksum(pkt)? {
        Ok(())
    } else {
        Err(Error::InnerIpChecksum)
    }
}

fn l4_csum_verify(pkt: &[u8]) -> Result<()> {
    if checksum::verify_l4_checksum(pkt)? {
        Ok(())
    } else {
        Err(Error::InnerL4Checksum)
    }
}

/// Compare a transformed packet with the record's expected output
///
/// # Errors
///
/// Fails with the diagnosis of the first check that does not hold; the
/// mismatch dump is suppressed when `silent` is set, the verdict is not.
pub fn td_verify(
    op: &CompletedOp,
    td: &IpsecTestData,
    silent: bool,
    flags: &TestFlags,
) -> Result<()> {
    let ingress = td.ipsec_xform.direction == SaDirection::Ingress;

    // Judged by completion status alone
    if ingress
        && (flags.icv_corrupt
            || flags.sa_expiry_pkts_hard
            || flags.tunnel_hdr_verify != TunnelVerify::None)
    {
        return Ok(());
    }

    let pkt = op.packet.as_ref();
    let mut start = 0;
    let mut len = pkt.len();

    if !ingress && flags.udp_encap {
        let (proto, _) = packet::l3_info(pkt)?;
        if proto != IPPROTO_UDP || len < UDP_HDR_LEN {
            return Err(Error::UdpHeaderMissing);
        }
        start += UDP_HDR_LEN;
        len -= UDP_HDR_LEN;
    }

    if len != td.output_text.len() {
        return Err(Error::LengthMismatch {
            expected: td.output_text.len(),
            actual: len,
        });
    }

    if !ingress && flags.fragment && packet::is_ipv4(pkt) {
        let frag = packet::ipv4_frag_field(pkt)?;
        if frag & (IPV4_MF_FLAG | IPV4_FRAG_OFFSET_MASK) != 0 {
            return Err(Error::OutputFragmented);
        }
    }

    let skip = tunnel_hdr_len(td);
    if skip > len {
        return Err(Error::BufferTooShort {
            required: skip,
            available: len,
        });
    }

    if ingress && flags.ip_csum {
        if !op.ol_flags.ip_cksum_good {
            return Err(Error::InnerIpChecksum);
        }
        return l3_csum_verify(pkt);
    }

    if ingress && flags.l4_csum {
        if !op.ol_flags.l4_cksum_good {
            return Err(Error::InnerL4Checksum);
        }
        return l4_csum_verify(pkt);
    }

    let actual = &pkt[start + skip..start + len];
    let mut expected = td.output_text.as_slice()[skip..].to_vec();
    pkt_update(&mut expected, flags).map_err(|e| {
        Error::InvalidParameter(format!("Could not update expected vector: {}", e))
    })?;

    if let Some(offset) = actual.iter().zip(&expected).position(|(a, e)| a != e) {
        if !silent {
            logging::log_output_mismatch(offset, &expected, actual);
        }
        return Err(Error::OutputMismatch { offset });
    }
    Ok(())
}

/// Inbound record for an egress packet of a combined scenario
///
/// The transformed bytes become the input; direction and crypto operations
/// flip. The expected output is filled in once the outbound leg finished.
///
/// # Errors
///
/// Returns `BufferTooShort` if the packet does not fit a record
pub fn prepare_result(pkt: &[u8], td: &IpsecTestData) -> Result<IpsecTestData> {
    let mut res = derive::inbound_from_outbound(td);
    res.input_text.try_set(pkt)?;
    Ok(res)
}

/// Verify one completed packet
///
/// Egress packets get their IV checked (when the scenario asks for it) and
/// their outer header validated. Then, with no result sink, the packet is
/// compared against `td`; with a sink it becomes the sink's input.
///
/// `ivs` is the history of the SA that produced the packet.
///
/// # Errors
///
/// Returns the failure diagnosis (or a skip-class error when the scenario
/// does not apply to the packet)
pub fn post_process(
    op: &CompletedOp,
    td: &IpsecTestData,
    res_d: Option<&mut IpsecTestData>,
    silent: bool,
    flags: &TestFlags,
    ivs: &mut IvHistory,
) -> Result<()> {
    let pkt = op.packet.as_ref();

    if td.ipsec_xform.direction == SaDirection::Egress {
        if flags.iv_gen {
            iv_verify(pkt, td, ivs)?;
        }
        verify_egress_header(pkt, td, flags)?;
    }

    match res_d {
        None => td_verify(op, td, silent, flags),
        Some(res) => {
            *res = prepare_result(pkt, td)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectors::{PKT_AES_256_GCM, PKT_AES_256_GCM_V6};
    use bytes::Bytes;
    use saverify_platform::OffloadFlags;

    fn egress_op(td: &IpsecTestData) -> CompletedOp {
        CompletedOp::success(Bytes::copy_from_slice(td.output_text.as_slice()))
    }

    fn ingress_td() -> IpsecTestData {
        derive::inbound_from_outbound(&PKT_AES_256_GCM)
    }

    fn ingress_op(td: &IpsecTestData) -> CompletedOp {
        CompletedOp::success(Bytes::copy_from_slice(td.output_text.as_slice()))
    }

    #[test]
    fn test_tunnel_hdr_len() {
        assert_eq!(tunnel_hdr_len(&PKT_AES_256_GCM), 20);
        assert_eq!(tunnel_hdr_len(&PKT_AES_256_GCM_V6), 40);
        assert_eq!(tunnel_hdr_len(&ingress_td()), 0);

        let mut td = PKT_AES_256_GCM.clone();
        td.ipsec_xform.mode = SaMode::Transport;
        assert_eq!(tunnel_hdr_len(&td), 0);
    }

    #[test]
    fn test_known_vector_matches() {
        let td = &*PKT_AES_256_GCM;
        let mut ivs = IvHistory::new();
        post_process(&egress_op(td), td, None, false, &TestFlags::default(), &mut ivs).unwrap();
        assert!(ivs.is_empty());
    }

    #[test]
    fn test_mismatch_reports_offset() {
        let td = &*PKT_AES_256_GCM;
        let mut bytes = td.output_text.as_slice().to_vec();
        bytes[30] ^= 0xff;
        let op = CompletedOp::success(Bytes::from(bytes));
        assert_eq!(
            td_verify(&op, td, true, &TestFlags::default()),
            Err(Error::OutputMismatch { offset: 10 })
        );
    }

    #[test]
    fn test_outer_header_difference_ignored() {
        let td = &*PKT_AES_256_GCM;
        let mut bytes = td.output_text.as_slice().to_vec();
        // TTL lives inside the skipped tunnel header
        bytes[8] = 1;
        let op = CompletedOp::success(Bytes::from(bytes));
        assert!(td_verify(&op, td, true, &TestFlags::default()).is_ok());
    }

    #[test]
    fn test_length_mismatch() {
        let td = &*PKT_AES_256_GCM;
        let op = CompletedOp::success(Bytes::copy_from_slice(&td.output_text.as_slice()[..60]));
        assert_eq!(
            td_verify(&op, td, true, &TestFlags::default()),
            Err(Error::LengthMismatch {
                expected: td.output_text.len(),
                actual: 60
            })
        );
    }

    #[test]
    fn test_udp_encap_requires_udp() {
        let td = &*PKT_AES_256_GCM;
        let flags = TestFlags {
            udp_encap: true,
            ..TestFlags::default()
        };
        assert_eq!(
            td_verify(&egress_op(td), td, true, &flags),
            Err(Error::UdpHeaderMissing)
        );
    }

    #[test]
    fn test_outer_df_checked() {
        let td = &*PKT_AES_256_GCM;
        let mut ivs = IvHistory::new();
        let flags = TestFlags {
            df: Some(DfPolicy::Set1Inner0),
            ..TestFlags::default()
        };
        assert_eq!(
            post_process(&egress_op(td), td, None, true, &flags, &mut ivs),
            Err(Error::DfBit { expected: true })
        );
    }

    #[test]
    fn test_transport_requires_ip() {
        let mut td = PKT_AES_256_GCM.clone();
        td.ipsec_xform.mode = SaMode::Transport;
        let op = CompletedOp::success(Bytes::from_static(&[0u8; 64]));
        let mut ivs = IvHistory::new();
        assert!(matches!(
            post_process(&op, &td, None, true, &TestFlags::default(), &mut ivs),
            Err(Error::InvalidOuterHeader(_))
        ));
    }

    #[test]
    fn test_iv_repeat_detected() {
        let td = &*PKT_AES_256_GCM;
        let op = egress_op(td);
        let mut ivs = IvHistory::new();
        iv_verify(&op.packet, td, &mut ivs).unwrap();
        assert_eq!(ivs.len(), 1);
        assert!(ivs.contains(td.iv.as_slice()));
        assert_eq!(iv_verify(&op.packet, td, &mut ivs), Err(Error::IvRepeated));
    }

    #[test]
    fn test_result_sink_receives_packet() {
        let td = &*PKT_AES_256_GCM;
        let op = egress_op(td);
        let mut res = IpsecTestData::clone(td);
        let mut ivs = IvHistory::new();
        post_process(&op, td, Some(&mut res), false, &TestFlags::default(), &mut ivs).unwrap();

        assert_eq!(res.ipsec_xform.direction, SaDirection::Ingress);
        assert_eq!(res.input_text.as_slice(), op.packet.as_ref());
        assert_eq!(res.output_text, td.input_text);
    }

    #[test]
    fn test_inbound_round_trip_compare() {
        let td = ingress_td();
        assert!(td_verify(&ingress_op(&td), &td, false, &TestFlags::default()).is_ok());
    }

    #[test]
    fn test_expected_error_skips_compare() {
        let td = ingress_td();
        let op = CompletedOp::error(Bytes::from_static(b"garbage"));
        let flags = TestFlags {
            icv_corrupt: true,
            ..TestFlags::default()
        };
        assert!(td_verify(&op, &td, false, &flags).is_ok());
    }

    #[test]
    fn test_ip_checksum_needs_offload_flag() {
        let td = ingress_td();
        let flags = TestFlags {
            ip_csum: true,
            ..TestFlags::default()
        };
        let mut op = ingress_op(&td);
        assert_eq!(td_verify(&op, &td, true, &flags), Err(Error::InnerIpChecksum));

        op.ol_flags = OffloadFlags {
            ip_cksum_good: true,
            ..OffloadFlags::default()
        };
        assert!(td_verify(&op, &td, true, &flags).is_ok());

        // A good flag over a wrong checksum is still caught
        let mut bytes = op.packet.to_vec();
        bytes[10] ^= 0x01;
        op.packet = Bytes::from(bytes);
        assert_eq!(td_verify(&op, &td, true, &flags), Err(Error::InnerIpChecksum));
    }

    #[test]
    fn test_l4_checksum_corruption_diagnosed() {
        let td = ingress_td();
        let flags = TestFlags {
            l4_csum: true,
            ..TestFlags::default()
        };
        let mut bytes = td.output_text.as_slice().to_vec();
        // TCP checksum of the IPv4/TCP inner packet
        bytes[20 + 16] ^= 0x01;
        let mut op = CompletedOp::success(Bytes::from(bytes));
        op.ol_flags.l4_cksum_good = true;
        assert_eq!(td_verify(&op, &td, true, &flags), Err(Error::InnerL4Checksum));
    }

    #[test]
    fn test_pkt_update_policies() {
        let base = PKT_AES_256_GCM.input_text.as_slice().to_vec();
        for policy in DfPolicy::ALL {
            let mut pkt = base.clone();
            let flags = TestFlags {
                df: Some(policy),
                ..TestFlags::default()
            };
            pkt_update(&mut pkt, &flags).unwrap();
            assert_eq!(packet::ipv4_df(&pkt).unwrap(), policy.inner_df(), "{:?}", policy);
            assert!(checksum::verify_ipv4_checksum(&pkt).unwrap());
        }

        let mut v6 = PKT_AES_256_GCM_V6.input_text.as_slice().to_vec();
        assert!(pkt_update(&mut v6, &TestFlags::default()).is_ok());
        let flags = TestFlags {
            df: Some(DfPolicy::CopyInner0),
            ..TestFlags::default()
        };
        assert!(pkt_update(&mut v6, &flags).is_err());
    }
}
