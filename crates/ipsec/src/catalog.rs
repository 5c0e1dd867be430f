//! Crypto parameter catalog
//!
//! Static lists of the AEAD, cipher and authentication parameters under test
//! and their cross product. [`alg_list`] is ordered AEAD entries first, then
//! every cipher paired with every auth algorithm (cipher-major). Callers index
//! into it, so the order is part of the interface.

use once_cell::sync::Lazy;
use saverify_platform::{AeadAlgorithm, AuthAlgorithm, CipherAlgorithm};
use std::fmt;

/// Maximum packets per scenario
pub const IPSEC_TEST_PACKETS_MAX: usize = 32;

/// Algorithm of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// AEAD algorithm
    Aead(AeadAlgorithm),
    /// Cipher algorithm
    Cipher(CipherAlgorithm),
    /// Authentication algorithm
    Auth(AuthAlgorithm),
}

/// One crypto primitive with its lengths (bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CryptoParam {
    /// Primitive
    pub kind: ParamKind,
    /// Key length
    pub key_len: u16,
    /// IV length (full nonce for AEAD)
    pub iv_len: u16,
    /// Digest / tag length
    pub digest_len: u16,
}

impl CryptoParam {
    const fn aead(algo: AeadAlgorithm, key_len: u16) -> Self {
        CryptoParam {
            kind: ParamKind::Aead(algo),
            key_len,
            iv_len: 12,
            digest_len: 16,
        }
    }

    const fn cipher(algo: CipherAlgorithm, key_len: u16, iv_len: u16) -> Self {
        CryptoParam {
            kind: ParamKind::Cipher(algo),
            key_len,
            iv_len,
            digest_len: 0,
        }
    }

    const fn auth(algo: AuthAlgorithm, key_len: u16, digest_len: u16) -> Self {
        CryptoParam {
            kind: ParamKind::Auth(algo),
            key_len,
            iv_len: 0,
            digest_len,
        }
    }

    /// Whether this is the NULL cipher or NULL auth entry
    pub fn is_null(&self) -> bool {
        matches!(
            self.kind,
            ParamKind::Cipher(CipherAlgorithm::Null) | ParamKind::Auth(AuthAlgorithm::Null)
        )
    }

    fn name(&self) -> &'static str {
        match self.kind {
            ParamKind::Aead(a) => a.name(),
            ParamKind::Cipher(c) => c.name(),
            ParamKind::Auth(a) => a.name(),
        }
    }
}

/// AEAD parameters
pub const AEAD_LIST: [CryptoParam; 3] = [
    CryptoParam::aead(AeadAlgorithm::AesGcm, 16),
    CryptoParam::aead(AeadAlgorithm::AesGcm, 24),
    CryptoParam::aead(AeadAlgorithm::AesGcm, 32),
];

/// Cipher parameters
pub const CIPHER_LIST: [CryptoParam; 5] = [
    CryptoParam::cipher(CipherAlgorithm::Null, 0, 0),
    CryptoParam::cipher(CipherAlgorithm::AesCbc, 16, 16),
    CryptoParam::cipher(CipherAlgorithm::AesCtr, 16, 16),
    CryptoParam::cipher(CipherAlgorithm::AesCtr, 24, 16),
    CryptoParam::cipher(CipherAlgorithm::AesCtr, 32, 16),
];

/// Authentication parameters
pub const AUTH_LIST: [CryptoParam; 5] = [
    CryptoParam::auth(AuthAlgorithm::Null, 0, 0),
    CryptoParam::auth(AuthAlgorithm::Sha256Hmac, 32, 16),
    CryptoParam::auth(AuthAlgorithm::Sha384Hmac, 48, 24),
    CryptoParam::auth(AuthAlgorithm::Sha512Hmac, 64, 32),
    CryptoParam::auth(AuthAlgorithm::AesXcbcMac, 16, 12),
];

/// One testable crypto configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CryptoParamCombination {
    /// AEAD alone
    Aead(CryptoParam),
    /// Cipher followed by authentication
    Chain {
        /// Cipher entry
        cipher: CryptoParam,
        /// Auth entry
        auth: CryptoParam,
    },
}

impl CryptoParamCombination {
    /// Whether this pairs the NULL cipher with NULL auth
    pub fn is_null_null(&self) -> bool {
        match self {
            CryptoParamCombination::Aead(_) => false,
            CryptoParamCombination::Chain { cipher, auth } => cipher.is_null() && auth.is_null(),
        }
    }
}

impl fmt::Display for CryptoParamCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoParamCombination::Aead(aead) => {
                write!(f, "{} [{}]", aead.name(), aead.key_len * 8)
            }
            CryptoParamCombination::Chain { cipher, auth } => {
                write!(f, "{}", cipher.name())?;
                if !cipher.is_null() {
                    write!(f, " [{}]", cipher.key_len * 8)?;
                }
                write!(f, " {}", auth.name())?;
                if !auth.is_null() {
                    write!(f, " [{}B ICV]", auth.digest_len)?;
                }
                Ok(())
            }
        }
    }
}

static ALG_LIST: Lazy<Vec<CryptoParamCombination>> = Lazy::new(|| {
    let mut list = Vec::with_capacity(AEAD_LIST.len() + CIPHER_LIST.len() * AUTH_LIST.len());
    list.extend(AEAD_LIST.iter().copied().map(CryptoParamCombination::Aead));
    for cipher in CIPHER_LIST {
        for auth in AUTH_LIST {
            list.push(CryptoParamCombination::Chain { cipher, auth });
        }
    }
    list
});

/// Every combination under test, in catalog order
pub fn alg_list() -> &'static [CryptoParamCombination] {
    &ALG_LIST
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alg_list_size() {
        assert_eq!(
            alg_list().len(),
            AEAD_LIST.len() + CIPHER_LIST.len() * AUTH_LIST.len()
        );
        assert_eq!(alg_list().len(), 28);
    }

    #[test]
    fn test_alg_list_order() {
        let list = alg_list();
        for (i, aead) in AEAD_LIST.iter().enumerate() {
            assert_eq!(list[i], CryptoParamCombination::Aead(*aead));
        }

        // Cipher-major nested order after the AEAD block
        let base = AEAD_LIST.len();
        assert_eq!(
            list[base + 1],
            CryptoParamCombination::Chain {
                cipher: CIPHER_LIST[0],
                auth: AUTH_LIST[1],
            }
        );
        assert_eq!(
            list[base + AUTH_LIST.len()],
            CryptoParamCombination::Chain {
                cipher: CIPHER_LIST[1],
                auth: AUTH_LIST[0],
            }
        );
    }

    #[test]
    fn test_null_null_detection() {
        assert!(alg_list()[AEAD_LIST.len()].is_null_null());
        assert_eq!(alg_list().iter().filter(|c| c.is_null_null()).count(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(alg_list()[2].to_string(), "aes-gcm [256]");

        let cbc_sha256 = CryptoParamCombination::Chain {
            cipher: CIPHER_LIST[1],
            auth: AUTH_LIST[1],
        };
        assert_eq!(cbc_sha256.to_string(), "aes-cbc [128] sha2-256-hmac [16B ICV]");

        let null_null = CryptoParamCombination::Chain {
            cipher: CIPHER_LIST[0],
            auth: AUTH_LIST[0],
        };
        assert_eq!(null_null.to_string(), "null null");
    }
}
