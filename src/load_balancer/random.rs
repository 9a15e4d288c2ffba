//! Random load balancing strategy.

use rand::Rng;

use crate::load_balancer::member::MemberId;
use crate::load_balancer::pool::MemberTable;

/// Uniform choice among the eligible slots of `order`.
///
/// The cursor records the chosen slot for observability only.
pub(crate) fn select(order: &[MemberId], members: &MemberTable, cursor: &mut isize) -> Option<MemberId> {
    let eligible: Vec<usize> = order
        .iter()
        .enumerate()
        .filter(|(_, id)| members.get(id).is_some_and(|m| m.is_eligible()))
        .map(|(index, _)| index)
        .collect();

    if eligible.is_empty() {
        return None;
    }

    let index = eligible[rand::thread_rng().gen_range(0..eligible.len())];
    *cursor = index as isize;
    Some(order[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::member::{Member, MemberSpec};
    use crate::load_balancer::pool::PoolId;

    #[test]
    fn test_random_only_picks_eligible() {
        let mut members = MemberTable::new();
        let order: Vec<MemberId> = (1..=4).map(MemberId).collect();
        for id in &order {
            let spec = MemberSpec::new("127.0.0.1".parse().unwrap(), 9000 + id.0 as u16);
            let mut m = Member::new(*id, PoolId(1), &spec);
            m.set_overloaded(id.0 != 3);
            members.insert(*id, m);
        }

        let mut cursor = -1;
        for _ in 0..50 {
            assert_eq!(select(&order, &members, &mut cursor), Some(MemberId(3)));
            assert_eq!(cursor, 2);
        }
    }

    #[test]
    fn test_random_empty() {
        let mut cursor = -1;
        assert_eq!(select(&[], &MemberTable::new(), &mut cursor), None);
        assert_eq!(cursor, -1);
    }
}
