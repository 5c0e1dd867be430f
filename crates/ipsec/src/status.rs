//! Completion status and per-SA counter checks

use crate::catalog::IPSEC_TEST_PACKETS_MAX;
use crate::flags::TestFlags;
use crate::logging;
use crate::{Error, Result};
use saverify_platform::{
    CompletedOp, OpStatus, SaDirection, SecurityDevice, SessionId, TunnelVerify,
};

/// Check the completion status of packet `pkt_num` (1-based)
///
/// The first matching clause decides the primary verdict:
///
/// 1. ingress hard expiry at the threshold packet: must be an error
/// 2. ingress tunnel header verification: must be an error
/// 3. ingress ICV corruption: must be an error
/// 4. anything else: must succeed
///
/// Soft expiry at the threshold packet must additionally carry the soft
/// expiry indication.
///
/// # Errors
///
/// - `Status` when the primary verdict does not hold
/// - `SoftExpiryMissing` when the soft expiry indication is absent
pub fn status_check(
    op: &CompletedOp,
    flags: &TestFlags,
    dir: SaDirection,
    pkt_num: usize,
) -> Result<()> {
    let ingress = dir == SaDirection::Ingress;
    let threshold = pkt_num == IPSEC_TEST_PACKETS_MAX;

    if ingress && flags.sa_expiry_pkts_hard && threshold {
        return expect_error(op, pkt_num, "SA hard expiry (pkts) not reported");
    }

    if ingress && flags.tunnel_hdr_verify != TunnelVerify::None {
        return expect_error(op, pkt_num, "tunnel header verify mismatch accepted");
    }

    if ingress && flags.icv_corrupt {
        expect_error(op, pkt_num, "ICV corruption not detected")?;
    } else if op.status != OpStatus::Success {
        let reason = format!("Security op processing failed [pkt_num: {}]", pkt_num);
        logging::log_status_failure(pkt_num, &reason);
        return Err(Error::Status(reason));
    }

    if flags.sa_expiry_pkts_soft && threshold && !op.aux_flags.soft_expiry {
        logging::log_status_failure(pkt_num, "soft expiry indication missing");
        return Err(Error::SoftExpiryMissing);
    }

    Ok(())
}

fn expect_error(op: &CompletedOp, pkt_num: usize, reason: &str) -> Result<()> {
    if op.status == OpStatus::Error {
        return Ok(());
    }
    logging::log_status_failure(pkt_num, reason);
    Err(Error::Status(reason.into()))
}

/// Check the per-SA counters after a single-packet scenario
///
/// Exactly one packet and no error must be counted in `dir`. No-op unless
/// the scenario verifies statistics.
///
/// # Errors
///
/// Returns `Stats` when the counters disagree or cannot be read
pub fn stats_verify<D>(
    dev: &D,
    session: SessionId,
    flags: &TestFlags,
    dir: SaDirection,
) -> Result<()>
where
    D: SecurityDevice + ?Sized,
{
    if !flags.stats_success {
        return Ok(());
    }

    let stats = dev
        .session_stats(session)
        .map_err(|e| Error::Stats(e.to_string()))?;

    let (packets, errors) = match dir {
        SaDirection::Egress => (stats.opackets, stats.oerrors),
        SaDirection::Ingress => (stats.ipackets, stats.ierrors),
    };
    if packets != 1 || errors != 0 {
        return Err(Error::Stats(format!(
            "{:?}: {} packets, {} errors",
            dir, packets, errors
        )));
    }
    Ok(())
}
