//! Read-only views of pool and member state for operators.

use serde::Serialize;
use std::net::IpAddr;

use crate::health::LivenessState;
use crate::load_balancer::{AdminState, LbMode, Member, MemberId, Pool, PoolId, Strategy};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberSnapshot {
    pub id: MemberId,
    pub pool: PoolId,
    pub address: IpAddr,
    pub port: u16,
    pub response_time: u64,
    pub connections: u32,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub weight: f64,
    pub process_capacity: f64,
    pub admin_state: AdminState,
    pub liveness: LivenessState,
    pub overloaded: bool,
    pub eligible: bool,
    pub missed_heartbeats: u32,
    pub out_of_service_transitions: u64,
}

impl From<&Member> for MemberSnapshot {
    fn from(m: &Member) -> Self {
        Self {
            id: m.id,
            pool: m.pool,
            address: m.address,
            port: m.port,
            response_time: m.response_time,
            connections: m.connections,
            cpu_usage: m.cpu_usage,
            memory_usage: m.memory_usage,
            weight: m.weight,
            process_capacity: m.process_capacity,
            admin_state: m.admin_state,
            liveness: m.liveness(),
            overloaded: m.is_overloaded(),
            eligible: m.is_eligible(),
            missed_heartbeats: m.missed_heartbeats(),
            out_of_service_transitions: m.out_of_service_transitions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolSnapshot {
    pub id: PoolId,
    pub name: String,
    pub tenant_id: Option<String>,
    pub net_id: Option<String>,
    pub vip_id: Option<String>,
    pub protocol: u8,
    pub strategy: Strategy,
    pub mode: LbMode,
    pub cursor: isize,
    /// Members in pool order.
    pub members: Vec<MemberSnapshot>,
}

impl PoolSnapshot {
    pub fn eligible_count(&self) -> usize {
        self.members.iter().filter(|m| m.eligible).count()
    }

    pub fn member(&self, id: MemberId) -> Option<&MemberSnapshot> {
        self.members.iter().find(|m| m.id == id)
    }
}

impl From<&Pool> for PoolSnapshot {
    fn from(pool: &Pool) -> Self {
        Self {
            id: pool.id,
            name: pool.name.clone(),
            tenant_id: pool.tenant_id.clone(),
            net_id: pool.net_id.clone(),
            vip_id: pool.vip_id.clone(),
            protocol: pool.protocol,
            strategy: pool.strategy(),
            mode: pool.mode(),
            cursor: pool.cursor(),
            members: pool.members().map(MemberSnapshot::from).collect(),
        }
    }
}
