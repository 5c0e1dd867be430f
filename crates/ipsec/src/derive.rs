//! Inbound record derivation
//!
//! An inbound record mirrors its outbound record: the ciphertext becomes
//! the input, the original plaintext the expected output.

use crate::catalog::IPSEC_TEST_PACKETS_MAX;
use crate::flags::TestFlags;
use crate::vectors::IpsecTestData;
use crate::{Error, Result};
use saverify_platform::SaDirection;

/// Length of the trailing window the ICV corruption targets
pub const ICV_CORRUPT_WINDOW: usize = 4;

/// Derive the inbound record of a completed outbound record
///
/// Texts swap, direction becomes ingress and the crypto operations flip to
/// decrypt / verify.
pub fn inbound_from_outbound(td: &IpsecTestData) -> IpsecTestData {
    let mut inb = td.clone();
    inb.input_text = td.output_text.clone();
    inb.output_text = td.input_text.clone();
    inb.ipsec_xform.direction = SaDirection::Ingress;
    inb.xform.set_ingress_ops();
    inb
}

/// Patch inbound records with what the outbound run produced
///
/// Each inbound record expects its own outbound record's input as output.
/// ICV corruption bumps the first byte of the trailing 4-byte window of the
/// inbound input.
///
/// # Errors
///
/// - `InvalidParameter` if the two runs differ in packet count
pub fn update_inbound(
    td_inb: &mut [IpsecTestData],
    td_outb: &[IpsecTestData],
    flags: &TestFlags,
) -> Result<()> {
    if td_inb.len() != td_outb.len() {
        return Err(Error::InvalidParameter(format!(
            "{} inbound records for {} outbound records",
            td_inb.len(),
            td_outb.len()
        )));
    }

    for (inb, outb) in td_inb.iter_mut().zip(td_outb) {
        inb.output_text.set(outb.input_text.as_slice());

        if flags.icv_corrupt {
            let len = inb.input_text.len();
            if len >= ICV_CORRUPT_WINDOW {
                let data = inb.input_text.as_mut_slice();
                data[len - ICV_CORRUPT_WINDOW] = data[len - ICV_CORRUPT_WINDOW].wrapping_add(1);
            }
        }

        if flags.sa_expiry_pkts_hard {
            inb.ipsec_xform.life.packets_hard_limit = IPSEC_TEST_PACKETS_MAX as u64 - 1;
        }

        let options = &mut inb.ipsec_xform.options;
        if flags.udp_encap {
            options.udp_encap = true;
        }
        if flags.udp_ports_verify {
            options.udp_ports_verify = true;
        }
        options.tunnel_hdr_verify = flags.tunnel_hdr_verify;
        if flags.ip_csum {
            options.ip_csum_enable = true;
        }
        if flags.l4_csum {
            options.l4_csum_enable = true;
        }

        // Egress-only option
        options.iv_gen_disable = false;
    }
    Ok(())
}
