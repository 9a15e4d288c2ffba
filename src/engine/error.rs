//! Error types for engine operations.

use thiserror::Error;

use crate::load_balancer::{MemberId, PoolId};

/// Errors returned by the engine's mutation points.
///
/// Selection never fails; an unavailable member is `None`, not an error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// No pool with this id.
    #[error("Pool not found: {0}")]
    PoolNotFound(PoolId),

    /// No member with this id.
    #[error("Member not found: {0}")]
    MemberNotFound(MemberId),

    /// Member parameters rejected.
    #[error("Invalid member: {0}")]
    InvalidMember(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
