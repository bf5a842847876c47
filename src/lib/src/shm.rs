//! Secure shared-memory bridge.
//!
//! Key material crosses the trust boundary through a transient region
//! of memory visible to both the host and the secure monitor. A region
//! lives for exactly one privileged call: acquired immediately before
//! the call, consumed by [`ShareBridge::release`] immediately after,
//! regardless of the call's outcome, and never shared between
//! concurrent calls.

use crate::error::ProvisionError;
use zeroize::Zeroizing;

/// A transient secure-visible memory region sized to one key.
///
/// The physical address is meaningful input to a secure monitor call
/// only between the region's acquisition and its release. `release`
/// consumes the region, so a stale address cannot be produced once the
/// region has been given back.
///
/// The host-visible view is a staging buffer owned by the region; a
/// bridge implementation publishes it to the secure side in
/// [`ShareBridge::flush`]. The view is wiped when the region is
/// dropped.
pub struct ShareRegion {
    paddr: u64,
    host: Zeroizing<Vec<u8>>,
}

impl ShareRegion {
    /// Create a region over `len` zeroed bytes at `paddr`.
    ///
    /// Only bridge implementations should call this, with an address
    /// obtained from the platform's shared-memory allocator.
    pub fn new(paddr: u64, len: usize) -> Self {
        ShareRegion {
            paddr,
            host: Zeroizing::new(vec![0u8; len]),
        }
    }

    /// Physical address handed to the secure monitor.
    pub fn paddr(&self) -> u64 {
        self.paddr
    }

    pub fn len(&self) -> usize {
        self.host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }

    /// Host-visible view of the region.
    pub fn as_slice(&self) -> &[u8] {
        &self.host
    }

    /// Mutable host-visible view.
    ///
    /// Writes become visible to the secure side only after
    /// [`ShareBridge::flush`].
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.host
    }
}

/// Scoped acquisition of secure-visible memory.
///
/// `flush` and `invalidate` are visibility barriers with no failure
/// mode on supported hardware. Allocation never retries: a failed
/// `acquire` is terminal for the call that needed the region.
pub trait ShareBridge: Send + Sync {
    /// Allocate a region of `len` bytes.
    ///
    /// # Errors
    ///
    /// `ProvisionError::OutOfMemory` if the platform cannot provide a
    /// region.
    fn acquire(&self, len: usize) -> Result<ShareRegion, ProvisionError>;

    /// Make host writes to the region visible to the secure side.
    fn flush(&self, region: &ShareRegion);

    /// Make secure-side writes to the region visible to the host.
    fn invalidate(&self, region: &ShareRegion);

    /// Give the region back.
    ///
    /// Consumes the region: once released, its physical address can no
    /// longer be referenced, and a double release does not compile.
    fn release(&self, region: ShareRegion);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_starts_zeroed() {
        let region = ShareRegion::new(0x1000, 32);
        assert_eq!(region.paddr(), 0x1000);
        assert_eq!(region.len(), 32);
        assert!(region.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_region_host_view_is_writable() {
        let mut region = ShareRegion::new(0x2000, 4);
        region.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(region.as_slice(), &[1, 2, 3, 4]);
    }
}
