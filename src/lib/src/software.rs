//! Software secure world (development and testing only).
//!
//! An in-process stand-in for the privileged side: a bridge and a
//! monitor wired over one simulated physical memory. The monitor only
//! ever reads bytes that [`ShareBridge::flush`] published, so code that
//! forgets the flush fails here the same way it would fail on hardware
//! with stale caches.
//!
//! # Security Warning
//!
//! **NOT SUITABLE FOR PRODUCTION USE**
//!
//! - Key material lives in process memory
//! - The "secure monitor" is this same process
//! - No hardware protection of any kind
//!
//! Use only for development, tests and CI.

use crate::engine::{CipherMode, KeySlot, StorageEngine};
use crate::error::ProvisionError;
use crate::monitor::{SecureMonitor, StatusCode};
use crate::shm::{ShareBridge, ShareRegion};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use zeroize::Zeroize;

/// Status returned when the submitted physical address names no
/// flushed, live region.
pub const STATUS_BAD_ADDRESS: i32 = 0x10;
/// Status returned when the submitted key size exceeds the region.
pub const STATUS_BAD_SIZE: i32 = 0x11;
/// Status returned for an unknown cipher mode or storage tag.
pub const STATUS_BAD_ARGUMENT: i32 = 0x12;

const REGION_ALIGN: u64 = 4096;

/// Simulated physical memory shared between the bridge and the monitor.
#[derive(Default)]
struct PhysMemory {
    next_paddr: u64,
    /// Live regions by physical address, with their sizes.
    live: HashMap<u64, usize>,
    /// Bytes made visible to the secure side by `flush`.
    published: HashMap<u64, Vec<u8>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One simulated secure world.
///
/// Hands out a [`SoftwareBridge`] / [`SoftwareMonitor`] pair over the
/// same simulated physical memory, and exposes inspection hooks for
/// tests and for the development CLI.
pub struct SoftwareSecureWorld {
    mem: Arc<Mutex<PhysMemory>>,
    slots: Arc<Mutex<HashMap<(u32, u32), Vec<u8>>>>,
}

impl SoftwareSecureWorld {
    pub fn new() -> Self {
        log::warn!(
            "Creating software secure world - NOT SUITABLE FOR PRODUCTION. \
             Key material is held in process memory without hardware protection."
        );

        SoftwareSecureWorld {
            mem: Arc::new(Mutex::new(PhysMemory::default())),
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// A bridge backed by this world's simulated physical memory.
    pub fn bridge(&self) -> SoftwareBridge {
        SoftwareBridge {
            mem: Arc::clone(&self.mem),
        }
    }

    /// A monitor observing this world's simulated physical memory.
    pub fn monitor(&self) -> SoftwareMonitor {
        SoftwareMonitor {
            mem: Arc::clone(&self.mem),
            slots: Arc::clone(&self.slots),
        }
    }

    /// Key bytes currently installed in `slot` of `engine`, if any.
    pub fn programmed(&self, engine: StorageEngine, slot: KeySlot) -> Option<Vec<u8>> {
        lock(&self.slots).get(&(engine.tag(), slot.0)).cloned()
    }

    /// Number of acquired regions not yet released.
    ///
    /// Zero after every completed provisioning call; anything else is a
    /// leak.
    pub fn outstanding_regions(&self) -> usize {
        lock(&self.mem).live.len()
    }
}

impl Default for SoftwareSecureWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Share bridge over simulated physical memory.
#[derive(Clone)]
pub struct SoftwareBridge {
    mem: Arc<Mutex<PhysMemory>>,
}

impl ShareBridge for SoftwareBridge {
    fn acquire(&self, len: usize) -> Result<ShareRegion, ProvisionError> {
        // Zero-length regions are never handed out.
        if len == 0 {
            return Err(ProvisionError::OutOfMemory);
        }
        let mut mem = lock(&self.mem);
        let paddr = mem.next_paddr + REGION_ALIGN;
        mem.next_paddr = paddr + (len as u64).next_multiple_of(REGION_ALIGN);
        mem.live.insert(paddr, len);
        Ok(ShareRegion::new(paddr, len))
    }

    fn flush(&self, region: &ShareRegion) {
        let mut mem = lock(&self.mem);
        if mem.live.contains_key(&region.paddr()) {
            mem.published
                .insert(region.paddr(), region.as_slice().to_vec());
        }
    }

    fn invalidate(&self, _region: &ShareRegion) {
        // Nothing in the provisioning protocol writes back from the
        // secure side, so the host view is already current.
    }

    fn release(&self, region: ShareRegion) {
        let mut mem = lock(&self.mem);
        mem.live.remove(&region.paddr());
        if let Some(mut published) = mem.published.remove(&region.paddr()) {
            published.zeroize();
        }
    }
}

/// Secure monitor over simulated physical memory.
///
/// Authoritative for slot state, like the real monitor: programming
/// validates the call arguments and the submitted address, clearing an
/// empty slot succeeds.
#[derive(Clone)]
pub struct SoftwareMonitor {
    mem: Arc<Mutex<PhysMemory>>,
    slots: Arc<Mutex<HashMap<(u32, u32), Vec<u8>>>>,
}

impl SoftwareMonitor {
    fn known_tag(storage_tag: u32) -> bool {
        storage_tag == StorageEngine::Ufs.tag()
            || storage_tag == StorageEngine::Sdcc.tag()
            || storage_tag == StorageEngine::UfsCard.tag()
    }
}

impl SecureMonitor for SoftwareMonitor {
    fn call_program(
        &self,
        slot: u32,
        phys_addr: u64,
        key_size: u32,
        cipher_mode: u32,
        data_unit_mask: u32,
        storage_tag: u32,
    ) -> StatusCode {
        if cipher_mode != CipherMode::XtsAes256 as u32
            || data_unit_mask == 0
            || !Self::known_tag(storage_tag)
        {
            return StatusCode::from_raw(STATUS_BAD_ARGUMENT);
        }

        let mem = lock(&self.mem);
        if !mem.live.contains_key(&phys_addr) {
            return StatusCode::from_raw(STATUS_BAD_ADDRESS);
        }
        // Only flushed bytes are visible on this side of the boundary.
        let Some(published) = mem.published.get(&phys_addr) else {
            return StatusCode::from_raw(STATUS_BAD_ADDRESS);
        };
        if key_size as usize > published.len() {
            return StatusCode::from_raw(STATUS_BAD_SIZE);
        }

        let key = published[..key_size as usize].to_vec();
        drop(mem);

        if let Some(mut old) = lock(&self.slots).insert((storage_tag, slot), key) {
            old.zeroize();
        }
        StatusCode::OK
    }

    fn call_clear(&self, slot: u32, storage_tag: u32) -> StatusCode {
        if !Self::known_tag(storage_tag) {
            return StatusCode::from_raw(STATUS_BAD_ARGUMENT);
        }
        if let Some(mut old) = lock(&self.slots).remove(&(storage_tag, slot)) {
            old.zeroize();
        }
        StatusCode::OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program_args(region: &ShareRegion, len: u32) -> (u32, u64, u32, u32, u32, u32) {
        (7, region.paddr(), len, 3, 0x8, StorageEngine::Ufs.tag())
    }

    #[test]
    fn test_unflushed_writes_are_invisible() {
        let world = SoftwareSecureWorld::new();
        let bridge = world.bridge();
        let monitor = world.monitor();

        let mut region = bridge.acquire(4).unwrap();
        region.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);

        // No flush: the monitor must not observe the host write.
        let (slot, paddr, len, mode, mask, tag) = program_args(&region, 4);
        let status = monitor.call_program(slot, paddr, len, mode, mask, tag);
        assert_eq!(status.as_raw(), STATUS_BAD_ADDRESS);

        bridge.flush(&region);
        let status = monitor.call_program(slot, paddr, len, mode, mask, tag);
        assert!(status.is_ok());
        assert_eq!(
            world.programmed(StorageEngine::Ufs, KeySlot(7)),
            Some(vec![1, 2, 3, 4])
        );

        bridge.release(region);
        assert_eq!(world.outstanding_regions(), 0);
    }

    #[test]
    fn test_released_address_is_dead() {
        let world = SoftwareSecureWorld::new();
        let bridge = world.bridge();
        let monitor = world.monitor();

        let region = bridge.acquire(4).unwrap();
        let (slot, paddr, len, mode, mask, tag) = program_args(&region, 4);
        bridge.flush(&region);
        bridge.release(region);

        let status = monitor.call_program(slot, paddr, len, mode, mask, tag);
        assert_eq!(status.as_raw(), STATUS_BAD_ADDRESS);
    }

    #[test]
    fn test_bad_arguments_are_rejected() {
        let world = SoftwareSecureWorld::new();
        let bridge = world.bridge();
        let monitor = world.monitor();

        let region = bridge.acquire(8).unwrap();
        bridge.flush(&region);

        // Unknown cipher mode.
        let status = monitor.call_program(1, region.paddr(), 8, 2, 0x8, 10);
        assert_eq!(status.as_raw(), STATUS_BAD_ARGUMENT);
        // Unknown storage tag.
        let status = monitor.call_program(1, region.paddr(), 8, 3, 0x8, 11);
        assert_eq!(status.as_raw(), STATUS_BAD_ARGUMENT);
        // Size beyond the region.
        let status = monitor.call_program(1, region.paddr(), 64, 3, 0x8, 10);
        assert_eq!(status.as_raw(), STATUS_BAD_SIZE);

        bridge.release(region);
    }

    #[test]
    fn test_clearing_an_empty_slot_succeeds() {
        let world = SoftwareSecureWorld::new();
        let monitor = world.monitor();
        assert!(monitor.call_clear(42, StorageEngine::Sdcc.tag()).is_ok());
    }

    #[test]
    fn test_clear_removes_programmed_key() {
        let world = SoftwareSecureWorld::new();
        let bridge = world.bridge();
        let monitor = world.monitor();

        let mut region = bridge.acquire(4).unwrap();
        region.as_mut_slice().copy_from_slice(&[9, 9, 9, 9]);
        bridge.flush(&region);
        let (slot, paddr, len, mode, mask, tag) = program_args(&region, 4);
        assert!(monitor.call_program(slot, paddr, len, mode, mask, tag).is_ok());
        bridge.release(region);

        assert!(world.programmed(StorageEngine::Ufs, KeySlot(7)).is_some());
        assert!(monitor.call_clear(7, StorageEngine::Ufs.tag()).is_ok());
        assert!(world.programmed(StorageEngine::Ufs, KeySlot(7)).is_none());
    }
}
