//! The secure monitor call seam.
//!
//! The secure monitor is a privileged, isolated execution environment
//! reachable only through this narrow interface. Calls block the
//! calling thread until the privileged environment returns; there is no
//! retry, no timeout and no partial success. Every call produces
//! exactly one status code.

/// Status code returned by a secure monitor call.
///
/// Zero is success. Nonzero values are carried through for diagnostics
/// and are not interpreted further on this side of the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(i32);

impl StatusCode {
    /// The success status.
    pub const OK: StatusCode = StatusCode(0);

    /// Wrap a raw status value obtained from the platform.
    pub fn from_raw(raw: i32) -> Self {
        StatusCode(raw)
    }

    /// The raw status value, for diagnostics.
    pub fn as_raw(&self) -> i32 {
        self.0
    }

    pub fn is_ok(&self) -> bool {
        self.0 == 0
    }
}

/// Opaque RPC primitive for the two privileged key operations.
///
/// The argument shape below is part of the platform protocol and must
/// be reproduced bit-exact by implementations. Implementations perform
/// no internal retries and report exactly one status per call.
pub trait SecureMonitor: Send + Sync {
    /// Install the key material at `phys_addr` into `slot` of the
    /// engine named by `storage_tag`.
    ///
    /// `phys_addr` must point at `key_size` bytes of flushed,
    /// secure-visible memory for the duration of the call.
    fn call_program(
        &self,
        slot: u32,
        phys_addr: u64,
        key_size: u32,
        cipher_mode: u32,
        data_unit_mask: u32,
        storage_tag: u32,
    ) -> StatusCode;

    /// Invalidate whatever key material `slot` of the engine named by
    /// `storage_tag` currently holds.
    fn call_clear(&self, slot: u32, storage_tag: u32) -> StatusCode;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_ok() {
        assert!(StatusCode::OK.is_ok());
        assert_eq!(StatusCode::OK.as_raw(), 0);
        assert_eq!(StatusCode::from_raw(0), StatusCode::OK);
    }

    #[test]
    fn test_status_code_failure() {
        let status = StatusCode::from_raw(0x3);
        assert!(!status.is_ok());
        assert_eq!(status.as_raw(), 0x3);
    }
}
