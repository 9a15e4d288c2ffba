//! Member (backend server) state.
//!
//! # Responsibilities
//! - Represent a single backend server behind a pool
//! - Hold live telemetry and the per-request impact estimates
//! - Track liveness (out-of-service, overloaded, missed heartbeats)
//! - Carry the capacity weight maintained by the weight adapter

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use crate::health::state::{LivenessState, TickOutcome};
use crate::load_balancer::pool::PoolId;

/// Share of cpu usage in the composite load score.
pub const CPU_LOAD_SHARE: f64 = 0.6;
/// Share of memory usage in the composite load score.
pub const MEMORY_LOAD_SHARE: f64 = 0.4;

/// Registry-assigned member identifier.
///
/// Ordering is meaningful: strategies break ties by ascending id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "member-{}", self.0)
    }
}

/// Administrative state set by the configuration layer.
///
/// Recorded for the presentation layer; eligibility is driven by liveness only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminState {
    #[default]
    Up,
    Down,
}

/// Speculative load added to a member when it is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactEstimates {
    /// Added to the response time (ms).
    pub response_time: u64,
    /// Added to cpu usage.
    pub cpu: f64,
    /// Added to memory usage.
    pub memory: f64,
}

impl Default for ImpactEstimates {
    fn default() -> Self {
        Self {
            response_time: 1,
            cpu: 0.5,
            memory: 0.5,
        }
    }
}

/// Parameters for a member being added to a pool.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberSpec {
    pub address: IpAddr,
    pub port: u16,
    /// Initial capacity weight.
    pub weight: f64,
    /// Scale factor applied when the weight is recomputed.
    pub process_capacity: f64,
    pub impact: ImpactEstimates,
}

impl MemberSpec {
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self {
            address,
            port,
            weight: 1.0,
            process_capacity: 1.0,
            impact: ImpactEstimates::default(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_process_capacity(mut self, capacity: f64) -> Self {
        self.process_capacity = capacity;
        self
    }

    pub fn with_impact(mut self, impact: ImpactEstimates) -> Self {
        self.impact = impact;
        self
    }

    /// Check the numeric invariants a member relies on.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.weight.is_finite() && self.weight > 0.0) {
            return Err(format!("weight must be positive, got {}", self.weight));
        }
        if !(self.process_capacity.is_finite() && self.process_capacity > 0.0) {
            return Err(format!(
                "process capacity must be positive, got {}",
                self.process_capacity
            ));
        }
        let impact = &self.impact;
        if !(impact.cpu.is_finite() && impact.cpu >= 0.0)
            || !(impact.memory.is_finite() && impact.memory >= 0.0)
        {
            return Err("impact estimates must be non-negative".to_string());
        }
        Ok(())
    }
}

/// A telemetry/heartbeat report from the external monitoring source.
///
/// Response time, cpu and memory are absolute values. Connections are a delta.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetryReport {
    pub response_time: Option<u64>,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub connection_delta: Option<i32>,
}

impl TelemetryReport {
    /// A bare heartbeat carrying no load figures.
    pub fn heartbeat() -> Self {
        Self::default()
    }

    pub fn with_response_time(mut self, ms: u64) -> Self {
        self.response_time = Some(ms);
        self
    }

    pub fn with_cpu_usage(mut self, cpu: f64) -> Self {
        self.cpu_usage = Some(cpu);
        self
    }

    pub fn with_memory_usage(mut self, memory: f64) -> Self {
        self.memory_usage = Some(memory);
        self
    }

    pub fn with_connection_delta(mut self, delta: i32) -> Self {
        self.connection_delta = Some(delta);
        self
    }
}

/// A single backend server.
#[derive(Debug, Clone)]
pub struct Member {
    pub id: MemberId,
    pub pool: PoolId,
    pub address: IpAddr,
    pub port: u16,

    /// Last reported response time (ms), plus speculative impacts.
    pub response_time: u64,
    /// Active connections, including anticipatory reservations.
    pub connections: u32,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub impact: ImpactEstimates,

    pub weight: f64,
    pub process_capacity: f64,
    pub admin_state: AdminState,

    out_of_service: bool,
    overloaded: bool,
    missed_heartbeats: u32,
    out_of_service_transitions: u64,
    /// Load observed when the weight was last recomputed.
    previous_load: Option<f64>,
}

impl Member {
    /// Create a member with zeroed telemetry.
    pub fn new(id: MemberId, pool: PoolId, spec: &MemberSpec) -> Self {
        Self {
            id,
            pool,
            address: spec.address,
            port: spec.port,
            response_time: 0,
            connections: 0,
            cpu_usage: 0.0,
            memory_usage: 0.0,
            impact: spec.impact,
            weight: spec.weight,
            process_capacity: spec.process_capacity,
            admin_state: AdminState::Up,
            out_of_service: false,
            overloaded: false,
            missed_heartbeats: 0,
            out_of_service_transitions: 0,
            previous_load: None,
        }
    }

    /// A member is eligible iff it is neither out of service nor overloaded.
    pub fn is_eligible(&self) -> bool {
        !self.out_of_service && !self.overloaded
    }

    pub fn is_out_of_service(&self) -> bool {
        self.out_of_service
    }

    pub fn is_overloaded(&self) -> bool {
        self.overloaded
    }

    pub fn missed_heartbeats(&self) -> u32 {
        self.missed_heartbeats
    }

    pub fn out_of_service_transitions(&self) -> u64 {
        self.out_of_service_transitions
    }

    pub fn liveness(&self) -> LivenessState {
        if self.out_of_service {
            LivenessState::OutOfService
        } else {
            LivenessState::InService
        }
    }

    /// Current load: 0.6 * cpu + 0.4 * memory.
    pub fn current_load(&self) -> f64 {
        CPU_LOAD_SHARE * self.cpu_usage + MEMORY_LOAD_SHARE * self.memory_usage
    }

    /// Load this member would carry after taking one more request.
    pub fn projected_load(&self) -> f64 {
        CPU_LOAD_SHARE * (self.cpu_usage + self.impact.cpu)
            + MEMORY_LOAD_SHARE * (self.memory_usage + self.impact.memory)
    }

    pub(crate) fn previous_load(&self) -> Option<f64> {
        self.previous_load
    }

    pub(crate) fn set_previous_load(&mut self, load: f64) {
        self.previous_load = Some(load);
    }

    /// Set the overloaded flag. Returns true if it changed.
    pub fn set_overloaded(&mut self, overloaded: bool) -> bool {
        let changed = self.overloaded != overloaded;
        self.overloaded = overloaded;
        changed
    }

    /// Reserve resources for a newly assigned flow.
    pub(crate) fn charge_cpu(&mut self) {
        self.cpu_usage += self.impact.cpu;
    }

    pub(crate) fn charge_composite(&mut self) {
        self.cpu_usage += self.impact.cpu;
        self.memory_usage += self.impact.memory;
    }

    pub(crate) fn charge_response_time(&mut self) {
        self.response_time = self.response_time.saturating_add(self.impact.response_time);
    }

    /// Release one connection. Never drops below zero.
    pub fn release_connection(&mut self) {
        self.connections = self.connections.saturating_sub(1);
    }

    /// Apply a telemetry report. Returns true if the member came back into service.
    pub fn apply_report(&mut self, report: &TelemetryReport) -> bool {
        if let Some(rt) = report.response_time {
            self.response_time = rt;
        }
        if let Some(cpu) = report.cpu_usage.filter(|v| v.is_finite()) {
            self.cpu_usage = cpu.max(0.0);
        }
        if let Some(memory) = report.memory_usage.filter(|v| v.is_finite()) {
            self.memory_usage = memory.max(0.0);
        }
        if let Some(delta) = report.connection_delta {
            self.connections = self.connections.saturating_add_signed(delta);
        }
        self.reset_heartbeat()
    }

    // --- Liveness ---

    /// Record one heartbeat interval without telemetry.
    ///
    /// The counter stops at `threshold`; the out-of-service transition fires once.
    pub fn record_missed_heartbeat(&mut self, threshold: u32) -> TickOutcome {
        if self.out_of_service {
            return TickOutcome::AlreadyOutOfService;
        }
        if self.missed_heartbeats < threshold {
            self.missed_heartbeats += 1;
        }
        if self.missed_heartbeats >= threshold {
            self.out_of_service = true;
            self.out_of_service_transitions += 1;
            return TickOutcome::WentOutOfService;
        }
        TickOutcome::Missed(self.missed_heartbeats)
    }

    /// Telemetry arrived: clear the miss counter and restore service.
    fn reset_heartbeat(&mut self) -> bool {
        self.missed_heartbeats = 0;
        let recovered = self.out_of_service;
        self.out_of_service = false;
        recovered
    }
}
