//! Inline-crypto-engine addressing: key slots, storage engines and
//! cipher profiles.
//!
//! The wire values in this module are part of the secure monitor
//! protocol and stable across it; changing any of them breaks
//! compatibility with the privileged side.

/// Hardware key register index inside an inline crypto engine.
///
/// A slot is a capability handed in by the caller; it is only ever
/// referenced here, never allocated, and is only unique within one
/// storage engine's namespace. The secure monitor is the source of
/// truth for which slots exist, so no range check is applied on this
/// side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySlot(pub u32);

/// Storage controller whose inline crypto engine owns a slot namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum StorageEngine {
    /// Primary flash controller.
    Ufs = 10,
    /// Secondary / SD card controller.
    Sdcc = 20,
    /// Removable-card controller.
    UfsCard = 30,
}

impl StorageEngine {
    /// Wire tag carried in every secure monitor call.
    pub fn tag(self) -> u32 {
        self as u32
    }
}

/// Cipher mode understood by the inline crypto engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CipherMode {
    /// AES in XTS mode with a 256-bit effective key.
    XtsAes256 = 3,
}

/// Cipher mode plus the data-unit granularities a programmed key
/// applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherProfile {
    mode: CipherMode,
    data_unit_mask: u32,
}

impl CipherProfile {
    /// XTS-AES-256 profile for the given data-unit-size mask.
    ///
    /// Build the mask with [`data_unit_mask`] from data-unit sizes in
    /// bytes.
    pub fn xts_aes_256(data_unit_mask: u32) -> Self {
        CipherProfile {
            mode: CipherMode::XtsAes256,
            data_unit_mask,
        }
    }

    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    pub fn data_unit_mask(&self) -> u32 {
        self.data_unit_mask
    }
}

/// Build a data-unit-size mask from data-unit sizes in bytes.
///
/// Bit `n` of the mask stands for a data unit of `512 << n` bytes, so a
/// key programmed with sizes `[512, 4096]` applies to both 512-byte and
/// 4096-byte I/O units. Sizes that are not a power of two of at least
/// 512 bytes contribute nothing to the mask.
pub fn data_unit_mask(sizes: &[u32]) -> u32 {
    let mut mask = 0;
    for &size in sizes {
        if size >= 512 && size.is_power_of_two() {
            mask |= size >> 9;
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_engine_tags() {
        assert_eq!(StorageEngine::Ufs.tag(), 10);
        assert_eq!(StorageEngine::Sdcc.tag(), 20);
        assert_eq!(StorageEngine::UfsCard.tag(), 30);
    }

    #[test]
    fn test_xts_mode_wire_value() {
        assert_eq!(CipherMode::XtsAes256 as u32, 3);
        let profile = CipherProfile::xts_aes_256(0x8);
        assert_eq!(profile.mode(), CipherMode::XtsAes256);
        assert_eq!(profile.data_unit_mask(), 0x8);
    }

    #[test]
    fn test_data_unit_mask() {
        assert_eq!(data_unit_mask(&[512]), 0x1);
        assert_eq!(data_unit_mask(&[4096]), 0x8);
        assert_eq!(data_unit_mask(&[512, 4096]), 0x9);
        // Not representable: too small or not a power of two.
        assert_eq!(data_unit_mask(&[256, 520, 0]), 0);
    }
}
