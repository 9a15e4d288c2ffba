//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::net::{AddrParseError, IpAddr};

use crate::load_balancer::{ImpactEstimates, LbMode, MemberSpec, PoolSpec, Strategy};

/// Root configuration for the balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Heartbeat monitoring settings.
    pub health: HealthConfig,

    /// Weight adapter tuning.
    pub weights: WeightConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Pool definitions.
    pub pools: Vec<PoolConfig>,

    /// Member definitions, each referencing a pool by name.
    pub members: Vec<MemberConfig>,
}

/// Heartbeat monitoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Run a heartbeat task per member.
    pub enabled: bool,

    /// Heartbeat interval in seconds.
    pub interval_secs: u64,

    /// Consecutive missed heartbeats before a member goes out of service.
    pub failure_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5,
            failure_threshold: 10,
        }
    }
}

/// Weight adapter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WeightConfig {
    /// Load movement that triggers a weight recompute.
    pub critical_value: f64,

    /// Constant added to the idle rate when recomputing.
    pub adjustment_factor: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            critical_value: 5.0,
            adjustment_factor: 5.0,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PoolConfig {
    /// Unique pool name.
    pub name: String,

    #[serde(default)]
    pub tenant_id: Option<String>,

    #[serde(default)]
    pub net_id: Option<String>,

    /// Virtual address this pool serves.
    #[serde(default)]
    pub vip_id: Option<String>,

    /// IP protocol number.
    #[serde(default)]
    pub protocol: u8,

    /// Selection strategy (default: least_response_time).
    #[serde(default)]
    pub strategy: Strategy,

    /// Forwarding mode (default: nat).
    #[serde(default)]
    pub mode: LbMode,
}

impl PoolConfig {
    pub fn to_spec(&self) -> PoolSpec {
        PoolSpec {
            name: self.name.clone(),
            tenant_id: self.tenant_id.clone(),
            net_id: self.net_id.clone(),
            vip_id: self.vip_id.clone(),
            protocol: self.protocol,
            strategy: self.strategy,
            mode: self.mode,
        }
    }
}

/// Member configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MemberConfig {
    /// Pool this member belongs to.
    pub pool: String,

    /// Member IP address (e.g., "10.0.0.1").
    pub address: String,

    pub port: u16,

    /// Initial capacity weight (default: 1).
    #[serde(default = "default_weight")]
    pub weight: f64,

    /// Capacity scale factor for weight recomputation (default: 1).
    #[serde(default = "default_process_capacity")]
    pub process_capacity: f64,

    /// Response time charged per new flow, in ms (default: 1).
    #[serde(default = "default_response_time_impact")]
    pub response_time_impact: u64,

    /// Cpu usage charged per new flow (default: 0.5).
    #[serde(default = "default_usage_impact")]
    pub cpu_impact: f64,

    /// Memory usage charged per new flow (default: 0.5).
    #[serde(default = "default_usage_impact")]
    pub memory_impact: f64,
}

fn default_weight() -> f64 {
    1.0
}

fn default_process_capacity() -> f64 {
    1.0
}

fn default_response_time_impact() -> u64 {
    1
}

fn default_usage_impact() -> f64 {
    0.5
}

impl MemberConfig {
    pub fn ip(&self) -> Result<IpAddr, AddrParseError> {
        self.address.parse()
    }

    pub fn to_spec(&self) -> Result<MemberSpec, AddrParseError> {
        Ok(MemberSpec::new(self.ip()?, self.port)
            .with_weight(self.weight)
            .with_process_capacity(self.process_capacity)
            .with_impact(ImpactEstimates {
                response_time: self.response_time_impact,
                cpu: self.cpu_impact,
                memory: self.memory_impact,
            }))
    }
}
