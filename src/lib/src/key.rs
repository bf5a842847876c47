//! Wrapped-key value object and its wire-format transform.
//!
//! The block layer hands keys down either pre-wrapped by hardware or in
//! raw form. Hardware-wrapped keys are already in the byte order the
//! secure side expects; raw keys are supplied in host-native order and
//! every 32-bit word must be converted to big-endian before the key
//! crosses the trust boundary.

use crate::error::ProvisionError;
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// Maximum byte length of a wrapped key.
///
/// Shared with the block-layer collaborator that produces the keys; a
/// key longer than this never reaches the provisioning path.
pub const MAX_WRAPPED_KEY_SIZE: usize = 128;

/// A storage-encryption key as handed down by the block layer.
///
/// The caller owns the key; the provisioning path only borrows it for
/// the duration of one call. The backing buffer is wiped on drop.
pub struct WrappedKey {
    bytes: [u8; MAX_WRAPPED_KEY_SIZE],
    len: usize,
    hw_wrapped: bool,
}

impl WrappedKey {
    /// Wrap caller-supplied key bytes.
    ///
    /// Raw (non-hardware-wrapped) keys must be a whole number of 32-bit
    /// words: the wire transform is word-wise and a trailing partial
    /// word has no defined byte order.
    ///
    /// # Errors
    ///
    /// `ProvisionError::InvalidLength` if the key is empty, longer than
    /// [`MAX_WRAPPED_KEY_SIZE`], or a raw key is not word-aligned.
    pub fn new(raw: &[u8], hw_wrapped: bool) -> Result<Self, ProvisionError> {
        if raw.is_empty() || raw.len() > MAX_WRAPPED_KEY_SIZE {
            return Err(ProvisionError::InvalidLength);
        }
        if !hw_wrapped && raw.len() % 4 != 0 {
            return Err(ProvisionError::InvalidLength);
        }
        let mut bytes = [0u8; MAX_WRAPPED_KEY_SIZE];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(WrappedKey {
            bytes,
            len: raw.len(),
            hw_wrapped,
        })
    }

    /// Byte length of the key.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the key arrived pre-wrapped by hardware.
    pub fn is_hw_wrapped(&self) -> bool {
        self.hw_wrapped
    }

    /// The key bytes as supplied by the caller.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Produce the bytes that cross the trust boundary.
    ///
    /// Hardware-wrapped keys are copied unchanged; raw keys have every
    /// 32-bit word converted from host order to big-endian. The result
    /// is held in a buffer that is wiped on drop.
    pub fn wire_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut wire = Zeroizing::new(self.as_bytes().to_vec());
        if !self.hw_wrapped {
            for word in wire.chunks_exact_mut(4) {
                let be = u32::from_ne_bytes([word[0], word[1], word[2], word[3]]).to_be_bytes();
                word.copy_from_slice(&be);
            }
        }
        wire
    }
}

impl Drop for WrappedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

// Key bytes are deliberately left out of the debug output.
impl fmt::Debug for WrappedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedKey")
            .field("len", &self.len)
            .field("hw_wrapped", &self.hw_wrapped)
            .finish_non_exhaustive()
    }
}
