//! Member selection and health engine for a software load balancer.
//!
//! For each new flow to a pool, the engine picks one eligible member using the
//! pool's strategy. It keeps member liveness and capacity weights current from
//! telemetry reports and missed heartbeats.

pub mod config;
pub mod engine;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::schema::BalancerConfig;
pub use engine::{Engine, EngineError, EngineSettings};
pub use lifecycle::Shutdown;
pub use load_balancer::{ClientDescriptor, MemberId, PoolId, Strategy, TelemetryReport};
