//! Key-slot programming and invalidation.
//!
//! The orchestration layer: one call moves one key through the wire
//! transform, across the shared-memory bridge, into the secure monitor,
//! and releases the shared region again on every exit path.

use crate::engine::{CipherProfile, KeySlot, StorageEngine};
use crate::error::ProvisionError;
use crate::key::WrappedKey;
use crate::monitor::SecureMonitor;
use crate::shm::{ShareBridge, ShareRegion};

/// Programs and invalidates storage-encryption keys in a hardware
/// inline crypto engine through a secure monitor.
///
/// A stateless service object: it tracks no slot occupancy (the monitor
/// is the source of truth) and holds no locks across the privileged
/// call. Calls against different slots or engines may run concurrently
/// from different threads; calls against the same slot are not ordered
/// here and must be serialized by the caller.
pub struct KeySlotManager {
    monitor: Box<dyn SecureMonitor>,
    bridge: Box<dyn ShareBridge>,
}

/// Holds a share region for the duration of one privileged call.
///
/// Dropping the lease runs the invalidate + release pair, so every exit
/// path gives the region back exactly once, including unwinding.
struct ShareLease<'a> {
    bridge: &'a dyn ShareBridge,
    /// Some for the lease's whole lifetime; taken exactly once, in drop.
    region: Option<ShareRegion>,
}

impl<'a> ShareLease<'a> {
    fn acquire(bridge: &'a dyn ShareBridge, len: usize) -> Result<Self, ProvisionError> {
        let region = bridge.acquire(len)?;
        Ok(ShareLease {
            bridge,
            region: Some(region),
        })
    }

    fn region(&self) -> &ShareRegion {
        match &self.region {
            Some(region) => region,
            None => unreachable!("share region taken before drop"),
        }
    }

    fn region_mut(&mut self) -> &mut ShareRegion {
        match &mut self.region {
            Some(region) => region,
            None => unreachable!("share region taken before drop"),
        }
    }
}

impl Drop for ShareLease<'_> {
    fn drop(&mut self) {
        if let Some(region) = self.region.take() {
            self.bridge.invalidate(&region);
            self.bridge.release(region);
        }
    }
}

impl KeySlotManager {
    /// Build a manager over injected monitor and bridge implementations.
    pub fn new(monitor: Box<dyn SecureMonitor>, bridge: Box<dyn ShareBridge>) -> Self {
        KeySlotManager { monitor, bridge }
    }

    /// Install `key` into `slot` of `engine`.
    ///
    /// The key bytes travel through a transient secure-visible region:
    /// acquired here, written in wire order, flushed so the secure side
    /// observes them, and invalidated + released again before this
    /// function returns, on the success and failure branches alike.
    ///
    /// # Errors
    ///
    /// - [`ProvisionError::OutOfMemory`]: no region could be allocated;
    ///   nothing reached the monitor and there is nothing to unwind.
    /// - [`ProvisionError::SecureCallFailed`]: the monitor rejected the
    ///   call; the raw status is preserved for diagnostics.
    pub fn program_key(
        &self,
        key: &WrappedKey,
        slot: KeySlot,
        profile: &CipherProfile,
        engine: StorageEngine,
    ) -> Result<(), ProvisionError> {
        let wire = key.wire_bytes();
        let mut lease = ShareLease::acquire(self.bridge.as_ref(), wire.len())?;

        lease.region_mut().as_mut_slice().copy_from_slice(&wire);
        self.bridge.flush(lease.region());

        log::debug!(
            "programming key slot {} on engine tag {}",
            slot.0,
            engine.tag()
        );
        let status = self.monitor.call_program(
            slot.0,
            lease.region().paddr(),
            key.len() as u32,
            profile.mode() as u32,
            profile.data_unit_mask(),
            engine.tag(),
        );
        drop(lease);

        if status.is_ok() {
            Ok(())
        } else {
            log::error!(
                "secure monitor rejected key program: status {:#x}, slot {}",
                status.as_raw(),
                slot.0
            );
            Err(ProvisionError::SecureCallFailed(status.as_raw()))
        }
    }

    /// Invalidate whatever key material `slot` of `engine` currently
    /// holds.
    ///
    /// No shared memory is involved. Clearing a slot that was never
    /// programmed is not an error at this layer; the monitor is
    /// authoritative for slot state.
    ///
    /// # Errors
    ///
    /// [`ProvisionError::SecureCallFailed`] if the monitor rejected the
    /// call.
    pub fn invalidate_key(
        &self,
        slot: KeySlot,
        engine: StorageEngine,
    ) -> Result<(), ProvisionError> {
        let status = self.monitor.call_clear(slot.0, engine.tag());
        if status.is_ok() {
            Ok(())
        } else {
            log::error!(
                "secure monitor rejected key clear: status {:#x}, slot {}",
                status.as_raw(),
                slot.0
            );
            Err(ProvisionError::SecureCallFailed(status.as_raw()))
        }
    }

    /// Derive a raw secret from a wrapped key.
    ///
    /// On this platform the derivation is a truncating copy of the
    /// wrapped-key bytes. This is a deliberate placeholder boundary: a
    /// hardware-backed platform substitutes a real unwrap operation
    /// behind the same contract.
    ///
    /// # Errors
    ///
    /// [`ProvisionError::InvalidLength`] if `output_len` exceeds the
    /// wrapped key's length.
    pub fn derive_raw_secret(
        &self,
        wrapped_key: &[u8],
        output_len: usize,
    ) -> Result<Vec<u8>, ProvisionError> {
        if output_len > wrapped_key.len() {
            return Err(ProvisionError::InvalidLength);
        }
        Ok(wrapped_key[..output_len].to_vec())
    }
}
