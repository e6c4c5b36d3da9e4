//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from system resources (time, randomness).
//! Production code uses [`StdEnv`]; tests use a simulated environment
//! with a virtual clock and seeded RNG so batching windows, reconnect
//! backoff, and presence throttling can be exercised without sleeping.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Abstract environment providing time and randomness.
///
/// # Invariants
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards within one execution context
/// - `random_bytes()` uses cryptographically secure entropy in
///   production
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; simulation
    /// environments use a virtual clock built on the same type.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Current wall-clock time as unix milliseconds.
    ///
    /// Used to stamp locally-created messages; inbound messages carry
    /// server-assigned timestamps instead.
    fn wall_clock_millis(&self) -> u64;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only
    /// be used by driver code, never by session logic.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a random `u128`.
    ///
    /// Used for client-local message temp ids.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }
}

/// Production environment backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdEnv;

impl StdEnv {
    /// Create a new production environment.
    pub fn new() -> Self {
        Self
    }
}

impl Environment for StdEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn wall_clock_millis(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis() as u64)
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        use rand::RngCore;
        rand::rngs::OsRng.fill_bytes(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonic() {
        let env = StdEnv::new();
        let a = env.now();
        let b = env.now();
        assert!(b >= a);
    }

    #[test]
    fn random_u128_varies() {
        let env = StdEnv::new();
        assert_ne!(env.random_u128(), env.random_u128());
    }
}
