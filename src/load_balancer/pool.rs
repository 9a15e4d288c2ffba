//! Pool state and member dispatch.
//!
//! # Responsibilities
//! - Hold a pool's ordered member list and the member records it owns
//! - Run the configured strategy over the eligible subset
//! - Keep the rotation cursor valid across membership changes

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use crate::load_balancer::member::{Member, MemberId};
use crate::load_balancer::strategy::Strategy;
use crate::load_balancer::{least_conn, load, random, response_time, round_robin};

/// Member records keyed (and therefore iterated) by ascending id.
pub type MemberTable = BTreeMap<MemberId, Member>;

/// A pool behind one lock; every mutation of its members goes through it.
pub type SharedPool = Arc<Mutex<Pool>>;

/// Registry-assigned pool identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(pub u64);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool-{}", self.0)
    }
}

/// Forwarding mode recorded for the traffic-steering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LbMode {
    #[default]
    Nat,
    DirectRouting,
    Tunnel,
}

impl LbMode {
    pub fn code(&self) -> u8 {
        match self {
            LbMode::Nat => 0,
            LbMode::DirectRouting => 1,
            LbMode::Tunnel => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(LbMode::Nat),
            1 => Some(LbMode::DirectRouting),
            2 => Some(LbMode::Tunnel),
            _ => None,
        }
    }
}

/// The client side of a new flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientDescriptor {
    pub address: IpAddr,
    pub port: u16,
    /// IP protocol number (6 = TCP, 17 = UDP).
    pub protocol: u8,
}

impl ClientDescriptor {
    pub fn new(address: IpAddr, port: u16, protocol: u8) -> Self {
        Self {
            address,
            port,
            protocol,
        }
    }
}

/// Parameters for a pool being created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolSpec {
    pub name: String,
    pub tenant_id: Option<String>,
    pub net_id: Option<String>,
    pub vip_id: Option<String>,
    pub protocol: u8,
    pub strategy: Strategy,
    pub mode: LbMode,
}

impl PoolSpec {
    pub fn new(name: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            name: name.into(),
            strategy,
            ..Self::default()
        }
    }
}

/// A configured group of members behind one virtual address.
#[derive(Debug)]
pub struct Pool {
    pub id: PoolId,
    pub name: String,
    pub tenant_id: Option<String>,
    pub net_id: Option<String>,
    pub vip_id: Option<String>,
    pub protocol: u8,
    strategy: Strategy,
    mode: LbMode,
    /// Membership order used by the rotation strategies.
    order: Vec<MemberId>,
    members: MemberTable,
    /// Last selected slot in `order`; -1 before the first selection.
    last_index: isize,
    /// Set once the pool is drained for deletion.
    closed: bool,
}

impl Pool {
    /// Create an empty pool.
    pub fn new(id: PoolId, spec: PoolSpec) -> Self {
        Self {
            id,
            name: spec.name,
            tenant_id: spec.tenant_id,
            net_id: spec.net_id,
            vip_id: spec.vip_id,
            protocol: spec.protocol,
            strategy: spec.strategy,
            mode: spec.mode,
            order: Vec::new(),
            members: MemberTable::new(),
            last_index: -1,
            closed: false,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.strategy = strategy;
    }

    pub fn mode(&self) -> LbMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: LbMode) {
        self.mode = mode;
    }

    pub fn cursor(&self) -> isize {
        self.last_index
    }

    pub fn member_ids(&self) -> &[MemberId] {
        &self.order
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.order.iter().filter_map(|id| self.members.get(id))
    }

    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.get(&id)
    }

    pub fn member_mut(&mut self, id: MemberId) -> Option<&mut Member> {
        self.members.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// True once the pool has been drained for deletion.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn eligible_count(&self) -> usize {
        self.members.values().filter(|m| m.is_eligible()).count()
    }

    /// Append a member to the pool.
    pub fn add_member(&mut self, member: Member) {
        let id = member.id;
        if self.members.insert(id, member).is_none() {
            self.order.push(id);
        }
    }

    /// Remove a member, keeping the cursor on the slot it pointed at.
    pub fn remove_member(&mut self, id: MemberId) -> Option<Member> {
        let member = self.members.remove(&id)?;
        if let Some(index) = self.order.iter().position(|m| *m == id) {
            self.order.remove(index);
            if (index as isize) <= self.last_index {
                self.last_index -= 1;
            }
        }
        self.clamp_cursor();
        Some(member)
    }

    /// Remove every member and close the pool, returning the removed ids.
    pub fn drain_members(&mut self) -> Vec<MemberId> {
        self.closed = true;
        self.members.clear();
        self.last_index = -1;
        std::mem::take(&mut self.order)
    }

    fn clamp_cursor(&mut self) {
        let max = self.order.len() as isize - 1;
        self.last_index = self.last_index.clamp(-1, max);
    }

    /// Eligible member ids in ascending id order.
    fn eligible_ids(&self) -> Vec<MemberId> {
        self.members
            .values()
            .filter(|m| m.is_eligible())
            .map(|m| m.id)
            .collect()
    }

    /// Pick a member for a new flow and apply the strategy's side effects.
    ///
    /// `None` means no eligible member exists right now.
    pub fn select(&mut self) -> Option<MemberId> {
        if self.order.is_empty() {
            return None;
        }

        let strategy = self.strategy;
        let candidates = if strategy.uses_cursor() {
            Vec::new()
        } else {
            let eligible = self.eligible_ids();
            if eligible.is_empty() {
                return None;
            }
            eligible
        };

        let members = &mut self.members;
        match strategy {
            Strategy::Random => random::select(&self.order, members, &mut self.last_index),
            Strategy::RoundRobin => round_robin::select(&self.order, members, &mut self.last_index),
            Strategy::LeastConnections => least_conn::select(members, &candidates),
            Strategy::LeastResponseTime => response_time::select(members, &candidates),
            Strategy::CpuUsage => load::select_cpu(members, &candidates),
            Strategy::Composite => load::select_composite(members, &candidates),
            Strategy::WeightedComposite => load::select_weighted_composite(members, &candidates),
            Strategy::WeightedLeastConnections => least_conn::select_weighted(members, &candidates),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::member::MemberSpec;

    fn pool_with(strategy: Strategy, n: u64) -> Pool {
        let mut pool = Pool::new(PoolId(1), PoolSpec::new("web", strategy));
        for i in 1..=n {
            let spec = MemberSpec::new("192.168.0.10".parse().unwrap(), 8000 + i as u16);
            pool.add_member(Member::new(MemberId(i), PoolId(1), &spec));
        }
        pool
    }

    #[test]
    fn test_drain_closes_pool() {
        let mut pool = pool_with(Strategy::RoundRobin, 3);
        assert!(!pool.is_closed());
        assert_eq!(pool.drain_members(), vec![MemberId(1), MemberId(2), MemberId(3)]);
        assert!(pool.is_closed());
        assert!(pool.is_empty());
        assert_eq!(pool.cursor(), -1);
    }

    #[test]
    fn test_empty_pool_unavailable() {
        for strategy in Strategy::ALL {
            let mut pool = pool_with(strategy, 0);
            assert_eq!(pool.select(), None);
        }
    }

    #[test]
    fn test_all_ineligible_unavailable() {
        for strategy in Strategy::ALL {
            let mut pool = pool_with(strategy, 3);
            for i in 1..=3 {
                pool.member_mut(MemberId(i)).unwrap().set_overloaded(true);
            }
            assert_eq!(pool.select(), None, "{strategy}");
        }
    }

    #[test]
    fn test_non_rotation_strategies_leave_cursor() {
        let mut pool = pool_with(Strategy::LeastConnections, 3);
        pool.select();
        pool.select();
        assert_eq!(pool.cursor(), -1);
    }

    #[test]
    fn test_remove_before_cursor_shifts_cursor() {
        let mut pool = pool_with(Strategy::RoundRobin, 4);
        pool.select();
        pool.select();
        pool.select();
        assert_eq!(pool.cursor(), 2);

        pool.remove_member(MemberId(1));
        assert_eq!(pool.cursor(), 1);
        // still continues with member 4
        assert_eq!(pool.select(), Some(MemberId(4)));
    }

    #[test]
    fn test_remove_cursor_member_continues_with_successor() {
        let mut pool = pool_with(Strategy::RoundRobin, 3);
        pool.select();
        pool.select();
        assert_eq!(pool.cursor(), 1);

        pool.remove_member(MemberId(2));
        assert_eq!(pool.select(), Some(MemberId(3)));
    }

    #[test]
    fn test_remove_last_member_resets_cursor() {
        let mut pool = pool_with(Strategy::RoundRobin, 1);
        pool.select();
        assert_eq!(pool.cursor(), 0);
        pool.remove_member(MemberId(1));
        assert_eq!(pool.cursor(), -1);
        assert!(pool.is_empty());
        assert_eq!(pool.select(), None);
    }

    #[test]
    fn test_strategy_change_applies_to_next_selection() {
        let mut pool = pool_with(Strategy::RoundRobin, 2);
        assert_eq!(pool.select(), Some(MemberId(1)));
        pool.set_strategy(Strategy::LeastConnections);
        assert_eq!(pool.select(), Some(MemberId(1)));
        assert_eq!(pool.member(MemberId(1)).unwrap().connections, 1);
        assert_eq!(pool.select(), Some(MemberId(2)));
    }

    #[test]
    fn test_mode_codes() {
        assert_eq!(LbMode::from_code(LbMode::Tunnel.code()), Some(LbMode::Tunnel));
        assert_eq!(LbMode::from_code(9), None);
    }
}
