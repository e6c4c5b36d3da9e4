//! Simulated environment with virtual time and seeded randomness.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use chatdeck_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

struct SimEnvInner {
    offset: Duration,
    rng: ChaCha8Rng,
}

/// Deterministic environment: a manually-advanced clock and a seeded
/// RNG. Clones share state, so the driver and the session observe the
/// same virtual time.
#[derive(Clone)]
pub struct SimEnv {
    base: Instant,
    inner: Arc<Mutex<SimEnvInner>>,
}

impl SimEnv {
    /// Create a simulated environment with a fixed default seed.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create a simulated environment with the given RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            base: Instant::now(),
            inner: Arc::new(Mutex::new(SimEnvInner {
                offset: Duration::ZERO,
                rng: ChaCha8Rng::seed_from_u64(seed),
            })),
        }
    }

    /// Advance the virtual clock.
    pub fn advance(&self, by: Duration) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).offset += by;
    }

    /// Elapsed virtual time since creation.
    pub fn elapsed(&self) -> Duration {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).offset
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    type Instant = Instant;

    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn wall_clock_millis(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        // Virtual time never blocks; tests advance the clock instead.
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).rng.fill_bytes(buffer);
    }
}
