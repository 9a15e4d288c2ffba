//! Selection strategy tags and the shared minimum search.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::load_balancer::member::{Member, MemberId};
use crate::load_balancer::pool::MemberTable;

/// The selection algorithm configured on a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Uniform choice among eligible members.
    Random,
    /// Next eligible member after the rotation cursor.
    RoundRobin,
    /// Fewest active connections.
    LeastConnections,
    /// Lowest response time, ties settled by cpu usage.
    #[default]
    LeastResponseTime,
    /// Lowest cpu usage.
    CpuUsage,
    /// Lowest blended cpu/memory load.
    #[serde(alias = "integration")]
    Composite,
    /// Lowest blended load per unit of weight.
    #[serde(alias = "weighted_integration")]
    WeightedComposite,
    /// Fewest connections per unit of weight.
    #[serde(alias = "wlc")]
    WeightedLeastConnections,
}

impl Strategy {
    pub const ALL: [Strategy; 8] = [
        Strategy::Random,
        Strategy::RoundRobin,
        Strategy::LeastConnections,
        Strategy::LeastResponseTime,
        Strategy::CpuUsage,
        Strategy::Composite,
        Strategy::WeightedComposite,
        Strategy::WeightedLeastConnections,
    ];

    /// Numeric method code used by the management API.
    pub fn code(&self) -> u8 {
        match self {
            Strategy::Random => 0,
            Strategy::RoundRobin => 1,
            Strategy::LeastConnections => 2,
            Strategy::LeastResponseTime => 3,
            Strategy::CpuUsage => 4,
            Strategy::Composite => 5,
            Strategy::WeightedComposite => 6,
            Strategy::WeightedLeastConnections => 7,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Random => "random",
            Strategy::RoundRobin => "round_robin",
            Strategy::LeastConnections => "least_connections",
            Strategy::LeastResponseTime => "least_response_time",
            Strategy::CpuUsage => "cpu_usage",
            Strategy::Composite => "composite",
            Strategy::WeightedComposite => "weighted_composite",
            Strategy::WeightedLeastConnections => "weighted_least_connections",
        }
    }

    /// Whether the weight adapter maintains member weights under this strategy.
    pub fn is_weighted(&self) -> bool {
        matches!(
            self,
            Strategy::WeightedComposite | Strategy::WeightedLeastConnections
        )
    }

    /// Whether the strategy reads and writes the rotation cursor.
    pub fn uses_cursor(&self) -> bool {
        matches!(self, Strategy::Random | Strategy::RoundRobin)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognised strategy names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown load balancing strategy `{0}`")]
pub struct UnknownStrategy(pub String);

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase().replace('-', "_");
        match name.as_str() {
            "integration" => return Ok(Strategy::Composite),
            "weighted_integration" => return Ok(Strategy::WeightedComposite),
            "wlc" => return Ok(Strategy::WeightedLeastConnections),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == name)
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}

/// Pick the candidate with the smallest score.
///
/// Candidates are visited in ascending id order and only a strictly smaller
/// score replaces the running best, so ties go to the lowest id. The running
/// best starts at positive infinity and a NaN score counts as infinite, so it
/// can fill an empty slot but any finite score replaces it. A non-empty
/// candidate set always yields a member.
pub(crate) fn pick_min<F>(members: &MemberTable, candidates: &[MemberId], score: F) -> Option<MemberId>
where
    F: Fn(&Member) -> f64,
{
    let mut best = f64::INFINITY;
    let mut chosen = None;
    for id in candidates {
        let Some(member) = members.get(id) else {
            continue;
        };
        let value = match score(member) {
            v if v.is_nan() => f64::INFINITY,
            v => v,
        };
        if value < best || chosen.is_none() {
            best = value;
            chosen = Some(*id);
        }
    }
    chosen
}
