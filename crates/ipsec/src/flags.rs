//! Scenario flags
//!
//! Which optional behaviour a scenario exercises. Pure input data: the
//! builder, engine and runner read these, none of them write.

use saverify_platform::TunnelVerify;

/// Outer / inner DF bit variant under test
///
/// Names read as "outer policy, inner DF state": `Set1Inner0` programs the
/// SA to set DF on the outer header while the inner packet has DF clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DfPolicy {
    /// Copy DF from the inner packet, inner DF clear
    CopyInner0,
    /// Copy DF from the inner packet, inner DF set
    CopyInner1,
    /// Outer DF clear, inner DF set
    Set0Inner1,
    /// Outer DF set, inner DF clear
    Set1Inner0,
}

impl DfPolicy {
    /// All variants
    pub const ALL: [DfPolicy; 4] = [
        DfPolicy::CopyInner0,
        DfPolicy::CopyInner1,
        DfPolicy::Set0Inner1,
        DfPolicy::Set1Inner0,
    ];

    /// Whether the SA copies DF from the inner header
    pub fn is_copy(self) -> bool {
        matches!(self, DfPolicy::CopyInner0 | DfPolicy::CopyInner1)
    }

    /// DF state the inner packet is given
    pub fn inner_df(self) -> bool {
        matches!(self, DfPolicy::CopyInner1 | DfPolicy::Set0Inner1)
    }

    /// DF state the outer header must carry
    pub fn outer_df(self) -> bool {
        matches!(self, DfPolicy::CopyInner1 | DfPolicy::Set1Inner0)
    }
}

/// Scenario configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TestFlags {
    /// Log the algorithm under test
    pub display_alg: bool,
    /// Packet-count soft expiry
    pub sa_expiry_pkts_soft: bool,
    /// Packet-count hard expiry
    pub sa_expiry_pkts_hard: bool,
    /// Corrupt the ICV of inbound packets
    pub icv_corrupt: bool,
    /// Device-generated IVs, checked for repetition
    pub iv_gen: bool,
    /// Inbound tunnel header verification level
    pub tunnel_hdr_verify: TunnelVerify,
    /// UDP encapsulation
    pub udp_encap: bool,
    /// UDP port verification on inbound
    pub udp_ports_verify: bool,
    /// Inner IP checksum offload
    pub ip_csum: bool,
    /// Inner L4 checksum offload
    pub l4_csum: bool,
    /// IPv6 inner packet
    pub ipv6: bool,
    /// IPv6 outer tunnel header
    pub tunnel_ipv6: bool,
    /// Transport mode
    pub transport: bool,
    /// Fragmented inner packet
    pub fragment: bool,
    /// Check per-SA counters
    pub stats_success: bool,
    /// DF bit variant
    pub df: Option<DfPolicy>,
}

impl TestFlags {
    /// Whether the scenario needs a full packet window
    pub fn needs_full_window(&self) -> bool {
        self.iv_gen || self.sa_expiry_pkts_soft || self.sa_expiry_pkts_hard
    }

    /// Whether an ingress packet is expected to be rejected by the device
    pub fn expects_ingress_error(&self) -> bool {
        self.icv_corrupt || self.sa_expiry_pkts_hard || self.tunnel_hdr_verify != TunnelVerify::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_df_truth_table() {
        let table = [
            (DfPolicy::CopyInner0, true, false, false),
            (DfPolicy::CopyInner1, true, true, true),
            (DfPolicy::Set0Inner1, false, true, false),
            (DfPolicy::Set1Inner0, false, false, true),
        ];
        for (policy, copy, inner, outer) in table {
            assert_eq!(policy.is_copy(), copy, "{:?}", policy);
            assert_eq!(policy.inner_df(), inner, "{:?}", policy);
            assert_eq!(policy.outer_df(), outer, "{:?}", policy);
        }
    }

    #[test]
    fn test_default_flags() {
        let flags = TestFlags::default();
        assert!(!flags.needs_full_window());
        assert!(!flags.expects_ingress_error());
        assert_eq!(flags.df, None);
    }

    #[test]
    fn test_expected_ingress_errors() {
        let flags = TestFlags {
            tunnel_hdr_verify: TunnelVerify::DstAddr,
            ..TestFlags::default()
        };
        assert!(flags.expects_ingress_error());

        let flags = TestFlags {
            sa_expiry_pkts_soft: true,
            ..TestFlags::default()
        };
        assert!(!flags.expects_ingress_error());
        assert!(flags.needs_full_window());
    }
}
