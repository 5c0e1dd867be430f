//! IV repetition tracking
//!
//! A fixed-capacity window over the last IVs a device produced for one SA.
//! Owned by whoever runs the SA under test; never shared between SAs.

use crate::catalog::IPSEC_TEST_PACKETS_MAX;
use crate::{Error, Result};

/// Longest IV a slot holds
pub const IV_SLOT_LEN: usize = 16;

/// Rolling window of the last [`IPSEC_TEST_PACKETS_MAX`] IVs
#[derive(Debug, Clone)]
pub struct IvHistory {
    slots: [[u8; IV_SLOT_LEN]; IPSEC_TEST_PACKETS_MAX],
    lens: [usize; IPSEC_TEST_PACKETS_MAX],
    head: usize,
    count: usize,
}

impl Default for IvHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl IvHistory {
    /// Empty history
    pub fn new() -> Self {
        IvHistory {
            slots: [[0u8; IV_SLOT_LEN]; IPSEC_TEST_PACKETS_MAX],
            lens: [0; IPSEC_TEST_PACKETS_MAX],
            head: 0,
            count: 0,
        }
    }

    /// Number of IVs currently remembered
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether `iv` is in the window
    pub fn contains(&self, iv: &[u8]) -> bool {
        (0..self.count).any(|i| &self.slots[i][..self.lens[i]] == iv)
    }

    /// Fail if `iv` was seen, otherwise remember it (evicting the oldest when full)
    ///
    /// # Errors
    ///
    /// - `IvTooLong` if `iv` exceeds [`IV_SLOT_LEN`]
    /// - `IvRepeated` if `iv` is in the window
    pub fn check_and_push(&mut self, iv: &[u8]) -> Result<()> {
        if iv.len() > IV_SLOT_LEN {
            return Err(Error::IvTooLong(iv.len()));
        }
        if self.contains(iv) {
            return Err(Error::IvRepeated);
        }

        let slot = &mut self.slots[self.head];
        slot.fill(0);
        slot[..iv.len()].copy_from_slice(iv);
        self.lens[self.head] = iv.len();
        self.head = (self.head + 1) % IPSEC_TEST_PACKETS_MAX;
        self.count = (self.count + 1).min(IPSEC_TEST_PACKETS_MAX);
        Ok(())
    }

    /// Forget every IV
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(n: u32) -> [u8; 8] {
        let mut iv = [0u8; 8];
        iv[4..].copy_from_slice(&n.to_be_bytes());
        iv
    }

    #[test]
    fn test_repeat_detected() {
        let mut history = IvHistory::new();
        history.check_and_push(&iv(1)).unwrap();
        history.check_and_push(&iv(2)).unwrap();
        assert_eq!(history.check_and_push(&iv(1)), Err(Error::IvRepeated));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_too_long() {
        let mut history = IvHistory::new();
        assert_eq!(history.check_and_push(&[0u8; 17]), Err(Error::IvTooLong(17)));
        assert!(history.is_empty());
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut history = IvHistory::new();
        for n in 0..IPSEC_TEST_PACKETS_MAX as u32 {
            history.check_and_push(&iv(n)).unwrap();
        }
        assert_eq!(history.len(), IPSEC_TEST_PACKETS_MAX);

        // Pushing one more evicts iv(0), so it is accepted again afterwards
        history.check_and_push(&iv(100)).unwrap();
        assert!(!history.contains(&iv(0)));
        assert!(history.contains(&iv(1)));
        history.check_and_push(&iv(0)).unwrap();
        assert_eq!(history.len(), IPSEC_TEST_PACKETS_MAX);
    }

    #[test]
    fn test_prefix_is_not_a_repeat() {
        let mut history = IvHistory::new();
        history.check_and_push(&[1, 2, 3, 4]).unwrap();
        history.check_and_push(&[1, 2, 3]).unwrap();
        history.clear();
        assert!(history.is_empty());
    }
}
