//! Deterministic simulation harness for chatdeck orchestrator testing.
//!
//! Provides seeded, virtual-time implementations of the environment
//! and driver abstractions so the full orchestration loop (batching
//! windows, reconnect backoff, presence throttling, collaborator
//! failures) runs reproducibly without sockets or sleeps:
//!
//! - [`SimEnv`]: virtual clock + seeded RNG
//! - [`SimDriver`]: scripted collaborators and recorded effects
//! - [`ChaoticStore`]: failure-injecting persistence decorator

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod chaotic_store;
mod sim_driver;
mod sim_env;

pub use chaotic_store::ChaoticStore;
pub use sim_driver::SimDriver;
pub use sim_env::SimEnv;
