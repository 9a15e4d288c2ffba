//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_selections_total` (counter): selections by pool, strategy, outcome
//! - `balancer_member_in_service` (gauge): 1=in service, 0=out of service
//! - `balancer_health_transitions_total` (counter): liveness transitions by target state
//! - `balancer_member_weight` (gauge): current capacity weight
//! - `balancer_telemetry_reports_total` (counter): reports by outcome

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::health::LivenessState;
use crate::load_balancer::{MemberId, PoolId, Strategy};

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_selection(pool: PoolId, strategy: Strategy, chosen: bool) {
    let outcome = if chosen { "selected" } else { "unavailable" };
    metrics::counter!(
        "balancer_selections_total",
        "pool" => pool.to_string(),
        "strategy" => strategy.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_member_in_service(member: MemberId, in_service: bool) {
    metrics::gauge!("balancer_member_in_service", "member" => member.to_string())
        .set(if in_service { 1.0 } else { 0.0 });
}

pub fn record_health_transition(to: LivenessState) {
    metrics::counter!("balancer_health_transitions_total", "to" => to.as_str()).increment(1);
}

pub fn record_member_weight(member: MemberId, weight: f64) {
    metrics::gauge!("balancer_member_weight", "member" => member.to_string()).set(weight);
}

pub fn record_telemetry(accepted: bool) {
    let outcome = if accepted { "applied" } else { "not_found" };
    metrics::counter!("balancer_telemetry_reports_total", "outcome" => outcome).increment(1);
}
