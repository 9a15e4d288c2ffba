//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Heartbeat monitoring (heartbeat.rs):
//!     Per-member timer
//!     → Lock the member's pool
//!     → Count a missed interval
//!     → Update state.rs if threshold reached
//!     → Recompute weight (weighted strategies only)
//!
//! Telemetry (engine):
//!     Report received
//!     → Reset miss counter
//!     → Out-of-service member returns to service
//! ```
//!
//! # Design Decisions
//! - One cancellable task per member, bound to the member's lifetime
//! - Ticks and telemetry for a member serialize on the pool lock
//! - Health state is per-member; transitions never surface as errors

pub mod heartbeat;
pub mod state;

pub use heartbeat::{HeartbeatMonitor, HeartbeatSettings};
pub use state::{LivenessState, TickOutcome};
