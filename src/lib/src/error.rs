/// The icekey error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    #[error("Secure shared memory allocation failed")]
    OutOfMemory,

    #[error("Secure monitor call failed with status {0:#x}")]
    SecureCallFailed(i32),

    #[error("Invalid length")]
    InvalidLength,
}
