//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!     → reconcile.rs (create/delete pools, add/remove members)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → reconcile.rs applies the difference to the running engine
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Health and weight tunables are read once at startup; reloads only
//!   change pools and members

pub mod loader;
pub mod reconcile;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use reconcile::{apply_config, ReconcileReport};
pub use schema::{
    BalancerConfig, HealthConfig, LogFormat, MemberConfig, ObservabilityConfig, PoolConfig,
    WeightConfig,
};
pub use validation::ValidationError;
pub use watcher::ConfigWatcher;
