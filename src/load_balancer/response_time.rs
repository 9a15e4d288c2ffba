//! Least-response-time strategy.

use crate::load_balancer::load;
use crate::load_balancer::member::MemberId;
use crate::load_balancer::pool::MemberTable;

/// Member with the lowest response time + response-time impact.
///
/// Every member tied at the minimum is collected; more than one tied member is
/// settled by the cpu-usage strategy over that subset alone (which charges its
/// cpu impact). The winner is then charged its response-time impact.
pub(crate) fn select(members: &mut MemberTable, candidates: &[MemberId]) -> Option<MemberId> {
    let mut best = u64::MAX;
    let mut tied: Vec<MemberId> = Vec::new();

    for id in candidates {
        let Some(member) = members.get(id) else {
            continue;
        };
        let score = member.response_time.saturating_add(member.impact.response_time);
        if score < best || tied.is_empty() {
            best = score;
            tied.clear();
            tied.push(*id);
        } else if score == best {
            tied.push(*id);
        }
    }

    let chosen = match tied.as_slice() {
        [] => return None,
        [only] => *only,
        subset => load::select_cpu(members, subset)?,
    };

    if let Some(member) = members.get_mut(&chosen) {
        member.charge_response_time();
    }
    Some(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::member::{Member, MemberSpec};
    use crate::load_balancer::pool::PoolId;

    fn table(rows: &[(u64, f64)]) -> (MemberTable, Vec<MemberId>) {
        let mut members = MemberTable::new();
        let mut ids = Vec::new();
        for (i, (rt, cpu)) in rows.iter().enumerate() {
            let id = MemberId(i as u64 + 1);
            let spec = MemberSpec::new("127.0.0.1".parse().unwrap(), 6000 + i as u16);
            let mut m = Member::new(id, PoolId(1), &spec);
            m.response_time = *rt;
            m.cpu_usage = *cpu;
            members.insert(id, m);
            ids.push(id);
        }
        (members, ids)
    }

    #[test]
    fn test_lowest_response_time() {
        let (mut members, ids) = table(&[(30, 0.0), (10, 50.0), (20, 0.0)]);
        assert_eq!(select(&mut members, &ids), Some(MemberId(2)));
        assert_eq!(members[&MemberId(2)].response_time, 11);
        // no tie, so cpu is untouched
        assert_eq!(members[&MemberId(2)].cpu_usage, 50.0);
    }

    #[test]
    fn test_tie_broken_by_cpu_within_subset() {
        // 1 and 2 tie on response time; 3 is slower but idle on cpu
        let (mut members, ids) = table(&[(10, 40.0), (10, 20.0), (50, 0.0)]);
        assert_eq!(select(&mut members, &ids), Some(MemberId(2)));

        let winner = &members[&MemberId(2)];
        assert_eq!(winner.response_time, 11);
        assert_eq!(winner.cpu_usage, 20.5);
        assert_eq!(members[&MemberId(3)].cpu_usage, 0.0);
    }
}
