//! Least-connections strategies.
//!
//! Plain least-connections reserves a connection on the chosen member; the
//! traffic layer releases it on close. The weighted variant ranks by
//! connections per unit of weight and charges cpu/memory instead.

use crate::load_balancer::member::MemberId;
use crate::load_balancer::pool::MemberTable;
use crate::load_balancer::strategy::pick_min;

/// Member with the fewest active connections; ties go to the lowest id.
pub(crate) fn select(members: &mut MemberTable, candidates: &[MemberId]) -> Option<MemberId> {
    let chosen = pick_min(members, candidates, |m| f64::from(m.connections))?;
    if let Some(member) = members.get_mut(&chosen) {
        member.connections = member.connections.saturating_add(1);
    }
    Some(chosen)
}

/// Member with the lowest connections / weight ratio.
pub(crate) fn select_weighted(members: &mut MemberTable, candidates: &[MemberId]) -> Option<MemberId> {
    let chosen = pick_min(members, candidates, |m| f64::from(m.connections) / m.weight)?;
    if let Some(member) = members.get_mut(&chosen) {
        member.charge_composite();
    }
    Some(chosen)
}
