//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use pool_balancer::engine::{Engine, EngineSettings};
use pool_balancer::health::HeartbeatSettings;
use pool_balancer::load_balancer::{ClientDescriptor, MemberId, MemberSpec, PoolId, PoolSpec, Strategy};

/// Engine without heartbeat tasks, usable outside a runtime.
pub fn quiet_engine() -> Engine {
    Engine::new(EngineSettings {
        heartbeat_enabled: false,
        ..EngineSettings::default()
    })
}

/// Engine with heartbeat tasks at the given cadence.
pub fn monitored_engine(interval: Duration, failure_threshold: u32) -> Engine {
    Engine::new(EngineSettings {
        heartbeat_enabled: true,
        heartbeat: HeartbeatSettings {
            interval,
            failure_threshold,
        },
        ..EngineSettings::default()
    })
}

pub fn client() -> ClientDescriptor {
    ClientDescriptor::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 20)), 40000, 6)
}

pub fn member_spec(n: u8) -> MemberSpec {
    MemberSpec::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, n)), 8080)
}

/// Create a pool with `count` members, returning ids in insertion order.
pub fn pool_with_members(engine: &Engine, strategy: Strategy, count: u8) -> (PoolId, Vec<MemberId>) {
    let pool = engine.create_pool(PoolSpec::new("web", strategy));
    let members = (1..=count)
        .map(|n| engine.add_member(pool, member_spec(n)).unwrap())
        .collect();
    (pool, members)
}
