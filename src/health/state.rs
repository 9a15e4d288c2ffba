//! Member liveness state machine.
//!
//! # States
//! - InService: member may be selected (unless overloaded)
//! - OutOfService: member excluded from every eligible set
//!
//! # State Transitions
//! ```text
//! InService → OutOfService: missed heartbeats >= failure_threshold
//! OutOfService → InService: any telemetry report for the member
//! ```
//!
//! # Design Decisions
//! - The miss counter freezes at the threshold while out of service
//! - A transition is reported exactly once; repeated ticks are silent
//! - Recovery needs a single report, no hysteresis

use serde::Serialize;

/// Liveness of a member as seen by the heartbeat monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessState {
    InService,
    OutOfService,
}

impl LivenessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LivenessState::InService => "in_service",
            LivenessState::OutOfService => "out_of_service",
        }
    }
}

/// Result of one missed heartbeat interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still in service; carries the updated miss count.
    Missed(u32),
    /// The threshold was reached on this tick.
    WentOutOfService,
    /// Already out of service; nothing changed.
    AlreadyOutOfService,
}

impl TickOutcome {
    /// True only for the tick that performed the transition.
    pub fn is_transition(&self) -> bool {
        matches!(self, TickOutcome::WentOutOfService)
    }
}
