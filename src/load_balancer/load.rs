//! Resource-usage strategies: cpu usage, composite load and weighted composite load.
//!
//! All three rank members by the load they would carry after taking the
//! request (current usage plus the member's per-request impact).

use crate::load_balancer::member::MemberId;
use crate::load_balancer::pool::MemberTable;
use crate::load_balancer::strategy::pick_min;

/// Lowest cpu usage + cpu impact. Charges the cpu impact.
pub(crate) fn select_cpu(members: &mut MemberTable, candidates: &[MemberId]) -> Option<MemberId> {
    let chosen = pick_min(members, candidates, |m| m.cpu_usage + m.impact.cpu)?;
    if let Some(member) = members.get_mut(&chosen) {
        member.charge_cpu();
    }
    Some(chosen)
}

/// Lowest 0.6 * cpu + 0.4 * memory, both including impacts.
pub(crate) fn select_composite(members: &mut MemberTable, candidates: &[MemberId]) -> Option<MemberId> {
    let chosen = pick_min(members, candidates, |m| m.projected_load())?;
    if let Some(member) = members.get_mut(&chosen) {
        member.charge_composite();
    }
    Some(chosen)
}

/// Lowest composite load / weight.
pub(crate) fn select_weighted_composite(
    members: &mut MemberTable,
    candidates: &[MemberId],
) -> Option<MemberId> {
    let chosen = pick_min(members, candidates, |m| m.projected_load() / m.weight)?;
    if let Some(member) = members.get_mut(&chosen) {
        member.charge_composite();
    }
    Some(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::member::{Member, MemberSpec};
    use crate::load_balancer::pool::PoolId;

    fn table(rows: &[(f64, f64, f64)]) -> (MemberTable, Vec<MemberId>) {
        let mut members = MemberTable::new();
        let mut ids = Vec::new();
        for (i, (cpu, mem, weight)) in rows.iter().enumerate() {
            let id = MemberId(i as u64 + 1);
            let spec = MemberSpec::new("127.0.0.1".parse().unwrap(), 7000 + i as u16).with_weight(*weight);
            let mut m = Member::new(id, PoolId(1), &spec);
            m.cpu_usage = *cpu;
            m.memory_usage = *mem;
            members.insert(id, m);
            ids.push(id);
        }
        (members, ids)
    }

    #[test]
    fn test_cpu_usage() {
        let (mut members, ids) = table(&[(30.0, 0.0, 1.0), (10.0, 90.0, 1.0), (20.0, 0.0, 1.0)]);
        assert_eq!(select_cpu(&mut members, &ids), Some(MemberId(2)));
        assert_eq!(members[&MemberId(2)].cpu_usage, 10.5);
        assert_eq!(members[&MemberId(2)].memory_usage, 90.0);
    }

    #[test]
    fn test_composite_blends_cpu_and_memory() {
        // member 1: 0.6*10.5 + 0.4*80.5 = 38.5
        // member 2: 0.6*40.5 + 0.4*10.5 = 28.5
        let (mut members, ids) = table(&[(10.0, 80.0, 1.0), (40.0, 10.0, 1.0)]);
        assert_eq!(select_composite(&mut members, &ids), Some(MemberId(2)));
        assert_eq!(members[&MemberId(2)].cpu_usage, 40.5);
        assert_eq!(members[&MemberId(2)].memory_usage, 10.5);
    }

    #[test]
    fn test_weighted_composite_divides_by_weight() {
        // member 1: 28.5 / 1 ; member 2: 38.5 / 4
        let (mut members, ids) = table(&[(40.0, 10.0, 1.0), (10.0, 80.0, 4.0)]);
        assert_eq!(select_weighted_composite(&mut members, &ids), Some(MemberId(2)));
    }

    #[test]
    fn test_weighted_composite_single_member_any_load() {
        let (mut members, ids) = table(&[(100.0, 100.0, 1.0)]);
        assert_eq!(select_weighted_composite(&mut members, &ids), Some(MemberId(1)));
        assert_eq!(members[&MemberId(1)].cpu_usage, 100.5);
    }
}
