//! Fuzz target for the wrapped-key wire transform
//!
//! This target drives `WrappedKey` construction and the wire transform
//! with arbitrary input.
//!
//! Security concerns:
//! - Length-bound bypass in key construction
//! - Out-of-bounds access when swapping 4-byte words
//! - Key material silently changed on the hardware-wrapped path
//! - The raw-key swap must be an involution (double swap = identity)

#![no_main]

use icekey::{WrappedKey, MAX_WRAPPED_KEY_SIZE};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Raw keys: the constructor admits only word-multiple lengths
    // within bounds, and the transform preserves length.
    match WrappedKey::new(data, false) {
        Ok(key) => {
            assert!(!data.is_empty());
            assert!(data.len() <= MAX_WRAPPED_KEY_SIZE);
            assert_eq!(data.len() % 4, 0);

            let wire = key.wire_bytes();
            assert_eq!(wire.len(), data.len());

            // Swapping twice restores the input.
            let back = WrappedKey::new(&wire, false)
                .expect("wire bytes are word-aligned")
                .wire_bytes();
            assert_eq!(&back[..], data);
        }
        Err(_) => {
            assert!(
                data.is_empty() || data.len() > MAX_WRAPPED_KEY_SIZE || data.len() % 4 != 0
            );
        }
    }

    // Hardware-wrapped keys pass through unchanged.
    if let Ok(key) = WrappedKey::new(data, true) {
        assert_eq!(key.as_bytes(), data);
        assert_eq!(&key.wire_bytes()[..], data);
    }
});
