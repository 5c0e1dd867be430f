//! Fuzz target for the reference ESP decapsulation.
//!
//! Run with:
//! ```bash
//! cd crates/ipsec/fuzz
//! cargo +nightly fuzz run decapsulate -- -max_total_time=300
//! ```

#![no_main]
use libfuzzer_sys::fuzz_target;
use saverify_ipsec::esp;
use saverify_ipsec::vectors::{PKT_AES_128_CBC_HMAC_SHA256, PKT_AES_256_GCM};
use saverify_platform::SaDirection;

fuzz_target!(|data: &[u8]| {
    for golden in [&*PKT_AES_256_GCM, &*PKT_AES_128_CBC_HMAC_SHA256] {
        let mut sa = golden.ipsec_xform;
        sa.direction = SaDirection::Ingress;
        let Ok(transform) = golden.transform() else {
            return;
        };
        let _ = esp::decapsulate(&sa, &transform, data);
    }
});
