//! Property tests for the building blocks of the verification engine

use proptest::prelude::*;
use saverify_ipsec::buffer::BoundedBuf;
use saverify_ipsec::catalog::IPSEC_TEST_PACKETS_MAX;
use saverify_ipsec::iv_history::IV_SLOT_LEN;
use saverify_ipsec::vectors::PKT_AES_256_GCM;
use saverify_ipsec::{checksum, packet, verify};
use saverify_ipsec::{alg_list, DfPolicy, Error, IvHistory, TestFlags};
use saverify_platform::CompletedOp;
use std::collections::HashSet;

fn ipv4_header() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), packet::IPV4_HDR_LEN).prop_map(|mut hdr| {
        hdr[0] = 0x45;
        hdr[2] = 0;
        hdr[3] = packet::IPV4_HDR_LEN as u8;
        hdr
    })
}

fn df_policy() -> impl Strategy<Value = DfPolicy> {
    prop::sample::select(DfPolicy::ALL.to_vec())
}

proptest! {
    #[test]
    fn try_set_respects_capacity(data in proptest::collection::vec(any::<u8>(), 0..48)) {
        let mut buf = BoundedBuf::<32>::new();
        let result = buf.try_set(&data);
        if data.len() <= 32 {
            prop_assert!(result.is_ok());
            prop_assert_eq!(buf.as_slice(), &data[..]);
        } else {
            let is_too_short = matches!(result, Err(Error::BufferTooShort { .. }));
            prop_assert!(is_too_short);
            prop_assert!(buf.is_empty());
        }
    }

    #[test]
    fn distinct_ivs_never_repeat(
        ivs in proptest::collection::hash_set(
            proptest::collection::vec(any::<u8>(), 8),
            1..IPSEC_TEST_PACKETS_MAX,
        )
    ) {
        let mut history = IvHistory::new();
        for iv in &ivs {
            prop_assert!(history.check_and_push(iv).is_ok());
        }
        prop_assert_eq!(history.len(), ivs.len());

        // Every one of them is now a repeat
        for iv in &ivs {
            prop_assert_eq!(history.check_and_push(iv), Err(Error::IvRepeated));
        }
    }

    #[test]
    fn iv_window_is_bounded(count in 0usize..100) {
        let mut history = IvHistory::new();
        for i in 0..count {
            let iv = (i as u64).to_be_bytes();
            prop_assert!(history.check_and_push(&iv).is_ok());
        }
        prop_assert_eq!(history.len(), count.min(IPSEC_TEST_PACKETS_MAX));
    }

    #[test]
    fn oversized_iv_rejected(len in (IV_SLOT_LEN + 1)..64) {
        let mut history = IvHistory::new();
        prop_assert_eq!(history.check_and_push(&vec![0u8; len]), Err(Error::IvTooLong(len)));
    }

    #[test]
    fn updated_ipv4_checksum_verifies(mut hdr in ipv4_header()) {
        checksum::update_ipv4_checksum(&mut hdr).unwrap();
        prop_assert!(checksum::verify_ipv4_checksum(&hdr).unwrap());

        hdr[12] ^= 0x01;
        prop_assert!(!checksum::verify_ipv4_checksum(&hdr).unwrap());
    }

    #[test]
    fn pkt_update_follows_policy(mut hdr in ipv4_header(), policy in df_policy()) {
        let flags = TestFlags { df: Some(policy), ..TestFlags::default() };
        verify::pkt_update(&mut hdr, &flags).unwrap();

        prop_assert_eq!(packet::ipv4_df(&hdr).unwrap(), policy.inner_df());
        prop_assert!(checksum::verify_ipv4_checksum(&hdr).unwrap());
    }

    #[test]
    fn mismatch_reports_first_differing_offset(pos in 20usize..72, flip in 1u8..=255) {
        let mut td = PKT_AES_256_GCM.clone();
        td.ipsec_xform.direction = saverify_platform::SaDirection::Ingress;
        td.output_text.set(PKT_AES_256_GCM.input_text.as_slice());

        let mut actual = td.output_text.as_slice().to_vec();
        actual[pos] ^= flip;
        let op = CompletedOp::success(bytes::Bytes::from(actual));

        prop_assert_eq!(
            verify::td_verify(&op, &td, true, &TestFlags::default()),
            Err(Error::OutputMismatch { offset: pos })
        );
    }
}

#[test]
fn catalog_is_ordered_and_unique() {
    let list = alg_list();
    assert!(list[..3].iter().all(|p| matches!(
        p,
        saverify_ipsec::CryptoParamCombination::Aead(_)
    )));

    let names: HashSet<String> = list.iter().map(|p| p.to_string()).collect();
    assert_eq!(names.len(), list.len());
    assert_eq!(list.iter().filter(|p| p.is_null_null()).count(), 1);
}
