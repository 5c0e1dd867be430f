//! Device capability advertisement
//!
//! A device publishes a [`SecurityCapability`]: the SA options it can honour
//! plus an ordered list of symmetric crypto capabilities. The list may end
//! with [`CryptoCapability::Undefined`]; anything after that entry is not
//! part of the advertisement.

use crate::xform::{AeadAlgorithm, AuthAlgorithm, CipherAlgorithm, SaOptions};

/// Inclusive size range with a step
///
/// `increment == 0` means the range holds exactly one size, `min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParamRange {
    /// Smallest supported size
    pub min: u16,
    /// Largest supported size
    pub max: u16,
    /// Step between supported sizes
    pub increment: u16,
}

impl ParamRange {
    /// Range over `min..=max` in steps of `increment`
    pub const fn new(min: u16, max: u16, increment: u16) -> Self {
        ParamRange {
            min,
            max,
            increment,
        }
    }

    /// Range holding a single size
    pub const fn fixed(size: u16) -> Self {
        ParamRange {
            min: size,
            max: size,
            increment: 0,
        }
    }

    /// Whether `size` is one of the advertised sizes
    pub fn contains(&self, size: u16) -> bool {
        if size < self.min || size > self.max {
            return false;
        }
        if self.increment == 0 {
            return size == self.min;
        }
        (size - self.min) % self.increment == 0
    }
}

/// One symmetric crypto capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SymCapability {
    /// AEAD algorithm
    Aead {
        /// Algorithm
        algo: AeadAlgorithm,
        /// Key sizes
        key_size: ParamRange,
        /// Tag sizes
        digest_size: ParamRange,
        /// AAD sizes
        aad_size: ParamRange,
        /// Nonce sizes
        iv_size: ParamRange,
    },
    /// Cipher algorithm
    Cipher {
        /// Algorithm
        algo: CipherAlgorithm,
        /// Key sizes
        key_size: ParamRange,
        /// IV sizes
        iv_size: ParamRange,
    },
    /// Authentication algorithm
    Auth {
        /// Algorithm
        algo: AuthAlgorithm,
        /// Key sizes
        key_size: ParamRange,
        /// Digest sizes
        digest_size: ParamRange,
        /// IV sizes
        iv_size: ParamRange,
    },
}

/// Entry of a crypto capability list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CryptoCapability {
    /// Symmetric capability
    Symmetric(SymCapability),
    /// End-of-list marker
    Undefined,
}

/// Complete capability set of a security device
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SecurityCapability {
    /// Supported SA options (tunnel verify as the highest supported level)
    pub options: SaOptions,
    /// Supported crypto parameters
    pub crypto: Vec<CryptoCapability>,
}

impl SecurityCapability {
    /// Symmetric entries up to the end-of-list marker, in advertised order
    pub fn symmetric(&self) -> impl Iterator<Item = &SymCapability> + '_ {
        self.crypto
            .iter()
            .take_while(|cap| !matches!(cap, CryptoCapability::Undefined))
            .filter_map(|cap| match cap {
                CryptoCapability::Symmetric(sym) => Some(sym),
                CryptoCapability::Undefined => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_range() {
        let range = ParamRange::fixed(16);
        assert!(range.contains(16));
        assert!(!range.contains(15));
        assert!(!range.contains(17));
    }

    #[test]
    fn test_stepped_range() {
        let range = ParamRange::new(16, 32, 8);
        assert!(range.contains(16));
        assert!(range.contains(24));
        assert!(range.contains(32));
        assert!(!range.contains(20));
        assert!(!range.contains(40));
    }

    #[test]
    fn test_symmetric_stops_at_undefined() {
        let caps = SecurityCapability {
            options: SaOptions::default(),
            crypto: vec![
                CryptoCapability::Symmetric(SymCapability::Cipher {
                    algo: CipherAlgorithm::Null,
                    key_size: ParamRange::fixed(0),
                    iv_size: ParamRange::fixed(0),
                }),
                CryptoCapability::Undefined,
                CryptoCapability::Symmetric(SymCapability::Cipher {
                    algo: CipherAlgorithm::AesCbc,
                    key_size: ParamRange::fixed(16),
                    iv_size: ParamRange::fixed(16),
                }),
            ],
        };
        assert_eq!(caps.symmetric().count(), 1);
    }
}
