//! Timeout Module
//!
//! Per-request deadlines for RPCs to content nodes.
//!
//! - **`generator`**: Randomized, latency-padded timeouts within a configured
//!   percentage window of a maximum. Hot-reloadable.
//! - **`clock`**: Substitutable time source for measuring round trips.

pub mod clock;
pub mod generator;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use generator::RequestTimeoutGenerator;
pub use types::{MAX_TIMEOUT_MS, TimeoutConfig};
