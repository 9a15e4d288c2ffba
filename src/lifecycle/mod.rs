//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build engine → Apply pools/members
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → Stop heartbeat tasks → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then engine, then background tasks
//! - Heartbeat tasks are stopped before the runtime exits

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
