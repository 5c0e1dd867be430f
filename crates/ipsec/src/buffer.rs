//! Fixed-capacity byte buffers
//!
//! Test records carry keys and packets in buffers whose capacity is fixed at
//! compile time, so a scenario never grows memory mid-run. Storing more than
//! `CAP` bytes is a caller bug and panics; [`BoundedBuf::try_set`] is the
//! checked variant for data that comes from a device.

use crate::{Error, Result};
use std::fmt;

/// Byte buffer holding at most `CAP` bytes
#[derive(Clone, PartialEq, Eq)]
pub struct BoundedBuf<const CAP: usize> {
    data: [u8; CAP],
    len: usize,
}

impl<const CAP: usize> BoundedBuf<CAP> {
    /// Empty buffer
    pub const fn new() -> Self {
        BoundedBuf {
            data: [0u8; CAP],
            len: 0,
        }
    }

    /// Buffer holding a copy of `bytes`
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is longer than `CAP`
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buf = Self::new();
        buf.set(bytes);
        buf
    }

    /// Replace the contents with `bytes`
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is longer than `CAP`
    pub fn set(&mut self, bytes: &[u8]) {
        assert!(
            bytes.len() <= CAP,
            "{} bytes exceed buffer capacity {}",
            bytes.len(),
            CAP
        );
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.data[bytes.len()..].fill(0);
        self.len = bytes.len();
    }

    /// Replace the contents with `bytes`, failing if they do not fit
    pub fn try_set(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > CAP {
            return Err(Error::BufferTooShort {
                required: bytes.len(),
                available: CAP,
            });
        }
        self.set(bytes);
        Ok(())
    }

    /// Change the visible length
    ///
    /// Growing exposes the bytes already stored past the old length (zero
    /// unless written before).
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds `CAP`
    pub fn set_len(&mut self, len: usize) {
        assert!(len <= CAP, "length {} exceeds buffer capacity {}", len, CAP);
        self.len = len;
    }

    /// Visible bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Visible bytes, mutable
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    /// Number of visible bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no bytes are visible
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fixed capacity
    pub const fn capacity(&self) -> usize {
        CAP
    }
}

impl<const CAP: usize> Default for BoundedBuf<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> AsRef<[u8]> for BoundedBuf<CAP> {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl<const CAP: usize> fmt::Debug for BoundedBuf<CAP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoundedBuf<{}>({})", CAP, hex::encode(self.as_slice()))
    }
}
