//! ESP integrity algorithms
//!
//! HMAC-SHA2 ICVs truncated per RFC 4868. AES-XCBC-MAC is cataloged but not
//! computed here; asking for it is reported as unsupported.

use crate::{Error, Result};
use hmac::{Hmac, Mac};
use saverify_platform::AuthAlgorithm;
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

/// Full (untruncated) MAC output length, 0 for NULL
pub fn mac_len(algo: AuthAlgorithm) -> usize {
    match algo {
        AuthAlgorithm::Null => 0,
        AuthAlgorithm::Sha256Hmac => 32,
        AuthAlgorithm::Sha384Hmac => 48,
        AuthAlgorithm::Sha512Hmac => 64,
        AuthAlgorithm::AesXcbcMac => 16,
    }
}

/// Compute an ICV of `icv_len` bytes over `data`
///
/// # Errors
///
/// Returns `UnsupportedCrypto` for AES-XCBC-MAC and `Crypto` when
/// `icv_len` exceeds the MAC output
pub fn compute_icv(algo: AuthAlgorithm, key: &[u8], data: &[u8], icv_len: usize) -> Result<Vec<u8>> {
    if icv_len > mac_len(algo) {
        return Err(Error::Crypto(format!(
            "{} ICV length {} exceeds MAC length {}",
            algo.name(),
            icv_len,
            mac_len(algo)
        )));
    }

    let mut full = match algo {
        AuthAlgorithm::Null => return Ok(Vec::new()),
        AuthAlgorithm::Sha256Hmac => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key)
                .map_err(|_| Error::Crypto("invalid HMAC-SHA256 key".into()))?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        AuthAlgorithm::Sha384Hmac => {
            let mut mac = Hmac::<Sha384>::new_from_slice(key)
                .map_err(|_| Error::Crypto("invalid HMAC-SHA384 key".into()))?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        AuthAlgorithm::Sha512Hmac => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key)
                .map_err(|_| Error::Crypto("invalid HMAC-SHA512 key".into()))?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        AuthAlgorithm::AesXcbcMac => {
            return Err(Error::UnsupportedCrypto(algo.name().to_string()));
        }
    };
    full.truncate(icv_len);
    Ok(full)
}

/// Constant-time ICV comparison
pub fn icv_matches(expected: &[u8], received: &[u8]) -> bool {
    expected.len() == received.len() && bool::from(expected.ct_eq(received))
}
