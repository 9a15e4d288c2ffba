//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (members reference existing pools)
//! - Validate value ranges (weights > 0, adjustment factor > 0, interval > 0)
//! - Detect duplicate pools and member endpoints
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::BalancerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("duplicate pool name `{0}`")]
    DuplicatePool(String),

    #[error("pool name must not be empty")]
    EmptyPoolName,

    #[error("member {endpoint} references unknown pool `{pool}`")]
    UnknownPool { pool: String, endpoint: String },

    #[error("member address `{0}` is not a valid IP address")]
    InvalidAddress(String),

    #[error("member {pool}/{endpoint} is declared more than once")]
    DuplicateMember { pool: String, endpoint: String },

    #[error("member {0} must have a positive weight")]
    NonPositiveWeight(String),

    #[error("member {0} must have a positive process capacity")]
    NonPositiveCapacity(String),

    #[error("member {0} has a negative impact estimate")]
    NegativeImpact(String),

    #[error("health interval must be greater than zero")]
    ZeroInterval,

    #[error("failure threshold must be greater than zero")]
    ZeroThreshold,

    #[error("weight critical value must be a non-negative number")]
    InvalidCriticalValue,

    #[error("weight adjustment factor must be a positive number")]
    InvalidAdjustmentFactor,

    #[error("metrics address `{0}` is not a valid socket address")]
    InvalidMetricsAddress(String),
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.health.interval_secs == 0 {
        errors.push(ValidationError::ZeroInterval);
    }
    if config.health.failure_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold);
    }
    if !non_negative(config.weights.critical_value) {
        errors.push(ValidationError::InvalidCriticalValue);
    }
    if !positive(config.weights.adjustment_factor) {
        errors.push(ValidationError::InvalidAdjustmentFactor);
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let mut pools = HashSet::new();
    for pool in &config.pools {
        if pool.name.trim().is_empty() {
            errors.push(ValidationError::EmptyPoolName);
        } else if !pools.insert(pool.name.as_str()) {
            errors.push(ValidationError::DuplicatePool(pool.name.clone()));
        }
    }

    let mut endpoints = HashSet::new();
    for member in &config.members {
        let endpoint = format!("{}:{}", member.address, member.port);

        if !pools.contains(member.pool.as_str()) {
            errors.push(ValidationError::UnknownPool {
                pool: member.pool.clone(),
                endpoint: endpoint.clone(),
            });
        }
        match member.ip() {
            Ok(ip) => {
                if !endpoints.insert((member.pool.as_str(), ip, member.port)) {
                    errors.push(ValidationError::DuplicateMember {
                        pool: member.pool.clone(),
                        endpoint: endpoint.clone(),
                    });
                }
            }
            Err(_) => errors.push(ValidationError::InvalidAddress(member.address.clone())),
        }
        if !positive(member.weight) {
            errors.push(ValidationError::NonPositiveWeight(endpoint.clone()));
        }
        if !positive(member.process_capacity) {
            errors.push(ValidationError::NonPositiveCapacity(endpoint.clone()));
        }
        if !non_negative(member.cpu_impact) || !non_negative(member.memory_impact) {
            errors.push(ValidationError::NegativeImpact(endpoint));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
