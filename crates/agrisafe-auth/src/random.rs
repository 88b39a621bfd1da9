//! Injectable cryptographically secure random source.
//!
//! CSRF state values and email verification tokens are drawn from a
//! [`SecureRandom`] so tests can supply deterministic bytes.

use std::sync::atomic::{AtomicU8, Ordering};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;

/// Number of random bytes behind every opaque value (256 bits).
pub const OPAQUE_VALUE_BYTES: usize = 32;

/// A source of secure random bytes.
pub trait SecureRandom: Send + Sync {
    /// Fills `dest` with random bytes.
    fn fill(&self, dest: &mut [u8]);

    /// Returns 256 random bits encoded as URL-safe base64 without padding.
    fn opaque_base64(&self) -> String {
        let mut bytes = [0u8; OPAQUE_VALUE_BYTES];
        self.fill(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Returns 256 random bits encoded as lowercase hex.
    fn opaque_hex(&self) -> String {
        let mut bytes = [0u8; OPAQUE_VALUE_BYTES];
        self.fill(&mut bytes);
        hex::encode(bytes)
    }
}

/// Random source backed by the operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn fill(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// Deterministic random source for tests.
///
/// Every call fills the buffer with a single byte value, then bumps that value
/// so consecutive draws differ.
#[derive(Debug)]
pub struct FixedRandom {
    next: AtomicU8,
}

impl FixedRandom {
    /// Creates a source whose first draw is filled with `seed`.
    #[must_use]
    pub fn new(seed: u8) -> Self {
        Self {
            next: AtomicU8::new(seed),
        }
    }
}

impl SecureRandom for FixedRandom {
    fn fill(&self, dest: &mut [u8]) {
        let byte = self.next.fetch_add(1, Ordering::SeqCst);
        dest.fill(byte);
    }
}
