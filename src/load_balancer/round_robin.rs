//! Round-robin load balancing strategy.

use crate::load_balancer::member::MemberId;
use crate::load_balancer::pool::MemberTable;

/// Advance the rotation cursor to the next eligible member.
///
/// The scan starts right after `cursor` and wraps once around `order`.
/// Ineligible slots are skipped without being consumed.
pub(crate) fn select(order: &[MemberId], members: &MemberTable, cursor: &mut isize) -> Option<MemberId> {
    let len = order.len();
    if len == 0 {
        return None;
    }

    let start = (*cursor + 1).rem_euclid(len as isize) as usize;
    for step in 0..len {
        let index = (start + step) % len;
        let id = order[index];
        if members.get(&id).is_some_and(|m| m.is_eligible()) {
            *cursor = index as isize;
            return Some(id);
        }
    }
    None
}
