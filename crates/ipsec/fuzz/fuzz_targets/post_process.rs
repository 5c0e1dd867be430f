//! Fuzz target for completed-packet verification.
//!
//! Arbitrary device output must yield a verdict, never a panic, whatever
//! the direction and scenario flags.
//!
//! Run with:
//! ```bash
//! cd crates/ipsec/fuzz
//! cargo +nightly fuzz run post_process -- -max_total_time=300
//! ```

#![no_main]
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use saverify_ipsec::vectors::{PKT_AES_256_GCM, PKT_AES_256_GCM_V6};
use saverify_ipsec::{verify, DfPolicy, IvHistory, TestFlags};
use saverify_platform::{CompletedOp, SaDirection};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let (ctl, pkt) = (data[0], &data[1..]);

    let mut td = if ctl & 0x01 != 0 {
        PKT_AES_256_GCM_V6.clone()
    } else {
        PKT_AES_256_GCM.clone()
    };
    if ctl & 0x02 != 0 {
        td.ipsec_xform.direction = SaDirection::Ingress;
    }

    let flags = TestFlags {
        udp_encap: ctl & 0x04 != 0,
        iv_gen: ctl & 0x08 != 0,
        fragment: ctl & 0x10 != 0,
        ip_csum: ctl & 0x20 != 0,
        l4_csum: ctl & 0x40 != 0,
        df: if ctl & 0x80 != 0 {
            Some(DfPolicy::CopyInner1)
        } else {
            None
        },
        ..TestFlags::default()
    };

    let op = CompletedOp::success(Bytes::copy_from_slice(pkt));
    let mut ivs = IvHistory::new();
    let _ = verify::post_process(&op, &td, None, true, &flags, &mut ivs);

    // Result sink path
    let mut res = td.clone();
    if verify::post_process(&op, &td, Some(&mut res), true, &flags, &mut ivs).is_ok() {
        assert_eq!(res.input_text.as_slice(), pkt);
    }
});
