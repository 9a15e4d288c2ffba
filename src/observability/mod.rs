//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Engine, pools and heartbeat tasks produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (pool, member, strategy) on every event
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
