//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! New flow for a pool
//!     → pool.rs (lock pool, collect eligible members)
//!     → Apply the pool's strategy:
//!         - random.rs / round_robin.rs (rotation cursor)
//!         - least_conn.rs (connections, connections / weight)
//!         - response_time.rs (response time, cpu tie-break)
//!         - load.rs (cpu, composite, composite / weight)
//!     → member.rs (anticipatory charge on the chosen member)
//!     → Return member id, or None when nothing is eligible
//!
//! Heartbeat tick
//!     → weight.rs (recompute weight for weighted strategies)
//! ```
//!
//! # Design Decisions
//! - Strategy is a closed enum; the pool dispatches with one match
//! - Out-of-service and overloaded members are excluded from every strategy
//! - Ties are settled by ascending member id
//! - Minimum searches start from positive infinity

pub mod least_conn;
pub mod load;
pub mod member;
pub mod pool;
pub mod random;
pub mod response_time;
pub mod round_robin;
pub mod strategy;
pub mod weight;

pub use member::{AdminState, ImpactEstimates, Member, MemberId, MemberSpec, TelemetryReport};
pub use pool::{ClientDescriptor, LbMode, Pool, PoolId, PoolSpec, SharedPool};
pub use strategy::Strategy;
pub use weight::WeightAdapter;
