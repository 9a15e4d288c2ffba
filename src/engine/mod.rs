//! Engine facade.
//!
//! # Responsibilities
//! - Single entry point for flow admission and telemetry ingestion
//! - Mutation points for the configuration layer (pools, members, strategy)
//! - Own the pool registry, the member index and the heartbeat monitor
//!
//! # Concurrency
//! ```text
//! pools:   PoolId   → Arc<Mutex<Pool>>   (one lock per pool)
//! members: MemberId → PoolId             (index only, no member state)
//! ```
//! Every read or write of member state happens under its pool's lock. Map
//! guards are never held across a pool lock; a pool lock may be held while
//! touching the member index or the monitor's task table.

pub mod error;
pub mod snapshot;

pub use error::{EngineError, EngineResult};
pub use snapshot::{MemberSnapshot, PoolSnapshot};

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::BalancerConfig;
use crate::health::{HeartbeatMonitor, HeartbeatSettings};
use crate::load_balancer::{
    AdminState, ClientDescriptor, LbMode, Member, MemberId, MemberSpec, Pool, PoolId, PoolSpec,
    SharedPool, Strategy, TelemetryReport, WeightAdapter,
};
use crate::observability::metrics;

/// Engine tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Spawn a heartbeat task for every member.
    pub heartbeat_enabled: bool,
    pub heartbeat: HeartbeatSettings,
    pub weights: WeightAdapter,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            heartbeat_enabled: true,
            heartbeat: HeartbeatSettings::default(),
            weights: WeightAdapter::default(),
        }
    }
}

impl From<&BalancerConfig> for EngineSettings {
    fn from(config: &BalancerConfig) -> Self {
        Self {
            heartbeat_enabled: config.health.enabled,
            heartbeat: HeartbeatSettings::from(&config.health),
            weights: WeightAdapter::from(&config.weights),
        }
    }
}

/// Member selection and health engine for a set of pools.
#[derive(Debug)]
pub struct Engine {
    settings: EngineSettings,
    pools: DashMap<PoolId, SharedPool>,
    members: DashMap<MemberId, PoolId>,
    next_pool_id: AtomicU64,
    next_member_id: AtomicU64,
    monitor: HeartbeatMonitor,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            pools: DashMap::new(),
            members: DashMap::new(),
            next_pool_id: AtomicU64::new(1),
            next_member_id: AtomicU64::new(1),
            monitor: HeartbeatMonitor::new(settings.heartbeat, settings.weights),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn pool(&self, id: PoolId) -> EngineResult<SharedPool> {
        self.pools
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(EngineError::PoolNotFound(id))
    }

    fn pool_of(&self, member: MemberId) -> EngineResult<SharedPool> {
        let pool_id = self
            .members
            .get(&member)
            .map(|entry| *entry.value())
            .ok_or(EngineError::MemberNotFound(member))?;
        self.pool(pool_id)
            .map_err(|_| EngineError::MemberNotFound(member))
    }

    /// Run `f` against `member` under its pool's lock.
    fn with_member<T>(&self, member: MemberId, f: impl FnOnce(&mut Member) -> T) -> EngineResult<T> {
        let pool = self.pool_of(member)?;
        let mut pool = pool.lock();
        let m = pool
            .member_mut(member)
            .ok_or(EngineError::MemberNotFound(member))?;
        Ok(f(m))
    }

    // --- Configuration layer ---

    /// Create an empty pool.
    pub fn create_pool(&self, spec: PoolSpec) -> PoolId {
        let id = PoolId(self.next_pool_id.fetch_add(1, Ordering::Relaxed));
        tracing::info!(pool = %id, name = %spec.name, strategy = %spec.strategy, "Pool created");
        self.pools.insert(id, Arc::new(Mutex::new(Pool::new(id, spec))));
        id
    }

    /// Delete a pool, removing its members and stopping their monitors.
    pub fn delete_pool(&self, id: PoolId) -> EngineResult<()> {
        let (_, pool) = self.pools.remove(&id).ok_or(EngineError::PoolNotFound(id))?;
        let removed = pool.lock().drain_members();
        for member in &removed {
            self.members.remove(member);
            self.monitor.stop(*member);
        }
        tracing::info!(pool = %id, members = removed.len(), "Pool deleted");
        Ok(())
    }

    /// Add a member to a pool and start its heartbeat task.
    ///
    /// With heartbeats enabled this must be called inside a Tokio runtime.
    pub fn add_member(&self, pool_id: PoolId, spec: MemberSpec) -> EngineResult<MemberId> {
        spec.validate().map_err(EngineError::InvalidMember)?;
        let pool = self.pool(pool_id)?;
        let id = MemberId(self.next_member_id.fetch_add(1, Ordering::Relaxed));

        // Index and monitor are registered under the pool lock so a concurrent
        // delete_pool or remove_member sees all of them or none.
        {
            let mut guard = pool.lock();
            if guard.is_closed() {
                return Err(EngineError::PoolNotFound(pool_id));
            }
            guard.add_member(Member::new(id, pool_id, &spec));
            self.members.insert(id, pool_id);
            if self.settings.heartbeat_enabled {
                self.monitor.start(id, Arc::clone(&pool));
            }
        }
        metrics::record_member_in_service(id, true);
        metrics::record_member_weight(id, spec.weight);

        tracing::info!(
            pool = %pool_id,
            member = %id,
            address = %spec.address,
            port = spec.port,
            "Member added"
        );
        Ok(id)
    }

    /// Remove a member and stop its heartbeat task.
    pub fn remove_member(&self, member: MemberId) -> EngineResult<()> {
        let pool = self.pool_of(member)?;
        let removed = pool.lock().remove_member(member);
        self.members.remove(&member);
        self.monitor.stop(member);
        match removed {
            Some(m) => {
                tracing::info!(pool = %m.pool, member = %member, "Member removed");
                Ok(())
            }
            None => Err(EngineError::MemberNotFound(member)),
        }
    }

    /// Change a pool's strategy; takes effect on the next selection.
    pub fn set_strategy(&self, pool_id: PoolId, strategy: Strategy) -> EngineResult<()> {
        let pool = self.pool(pool_id)?;
        let previous = {
            let mut pool = pool.lock();
            let previous = pool.strategy();
            pool.set_strategy(strategy);
            previous
        };
        tracing::info!(pool = %pool_id, from = %previous, to = %strategy, "Pool strategy changed");
        Ok(())
    }

    pub fn set_mode(&self, pool_id: PoolId, mode: LbMode) -> EngineResult<()> {
        self.pool(pool_id)?.lock().set_mode(mode);
        tracing::debug!(pool = %pool_id, mode = ?mode, "Pool mode changed");
        Ok(())
    }

    pub fn set_admin_state(&self, member: MemberId, state: AdminState) -> EngineResult<()> {
        self.with_member(member, |m| m.admin_state = state)?;
        tracing::debug!(member = %member, state = ?state, "Member admin state changed");
        Ok(())
    }

    // --- Load observer ---

    /// Mark a member overloaded (excluded from selection) or not.
    pub fn set_overloaded(&self, member: MemberId, overloaded: bool) -> EngineResult<()> {
        let changed = self.with_member(member, |m| m.set_overloaded(overloaded))?;
        if changed {
            tracing::info!(member = %member, overloaded, "Member overload state changed");
        }
        Ok(())
    }

    // --- Telemetry ---

    /// Apply a telemetry report; also counts as the member's heartbeat.
    pub fn report_telemetry(&self, member: MemberId, report: TelemetryReport) -> EngineResult<()> {
        let result = self.with_member(member, |m| m.apply_report(&report));
        metrics::record_telemetry(result.is_ok());

        let recovered = result?;
        if recovered {
            tracing::info!(member = %member, "Member back in service after telemetry report");
            metrics::record_health_transition(crate::health::LivenessState::InService);
            metrics::record_member_in_service(member, true);
        } else {
            tracing::trace!(member = %member, report = ?report, "Telemetry applied");
        }
        Ok(())
    }

    /// Release a connection reserved by least-connections selection.
    ///
    /// This is a traffic-layer signal, not a heartbeat.
    pub fn release_connection(&self, member: MemberId) -> EngineResult<()> {
        self.with_member(member, Member::release_connection)
    }

    // --- Flow admission ---

    /// Choose a member for a new flow.
    ///
    /// `None` means no eligible member is available (or the pool is unknown);
    /// callers treat it as a normal outcome.
    pub fn select_member(&self, pool_id: PoolId, client: &ClientDescriptor) -> Option<MemberId> {
        let Ok(pool) = self.pool(pool_id) else {
            tracing::debug!(pool = %pool_id, "Selection for unknown pool");
            return None;
        };
        let (strategy, chosen, size) = {
            let mut pool = pool.lock();
            let chosen = pool.select();
            (pool.strategy(), chosen, pool.len())
        };
        metrics::record_selection(pool_id, strategy, chosen.is_some());

        match chosen {
            Some(member) => tracing::trace!(
                pool = %pool_id,
                member = %member,
                strategy = %strategy,
                client = %client.address,
                client_port = client.port,
                "Member selected"
            ),
            None => tracing::debug!(
                pool = %pool_id,
                strategy = %strategy,
                members = size,
                client = %client.address,
                "No eligible member in pool"
            ),
        }
        chosen
    }

    // --- Weights ---

    /// Run the weight adapter over every member of a pool now.
    ///
    /// Returns the members whose weight was recomputed.
    pub fn adjust_weights(&self, pool_id: PoolId) -> EngineResult<Vec<(MemberId, f64)>> {
        let pool = self.pool(pool_id)?;
        let mut pool = pool.lock();
        let strategy = pool.strategy();
        let ids = pool.member_ids().to_vec();

        let mut changed = Vec::new();
        for id in ids {
            if let Some(member) = pool.member_mut(id) {
                if let Some(weight) = self.settings.weights.adjust(strategy, member) {
                    metrics::record_member_weight(id, weight);
                    changed.push((id, weight));
                }
            }
        }
        if !changed.is_empty() {
            tracing::debug!(pool = %pool_id, updated = changed.len(), "Weights recomputed");
        }
        Ok(changed)
    }

    // --- Presentation ---

    pub fn pool_snapshot(&self, pool_id: PoolId) -> Option<PoolSnapshot> {
        let pool = self.pool(pool_id).ok()?;
        let guard = pool.lock();
        Some(PoolSnapshot::from(&*guard))
    }

    pub fn member_snapshot(&self, member: MemberId) -> Option<MemberSnapshot> {
        self.with_member(member, |m| MemberSnapshot::from(&*m)).ok()
    }

    /// Snapshots of every pool, ordered by id.
    pub fn snapshots(&self) -> Vec<PoolSnapshot> {
        let mut ids = self.pool_ids();
        ids.sort();
        ids.into_iter().filter_map(|id| self.pool_snapshot(id)).collect()
    }

    pub fn pool_ids(&self) -> Vec<PoolId> {
        self.pools.iter().map(|entry| *entry.key()).collect()
    }

    pub fn pool_by_name(&self, name: &str) -> Option<PoolId> {
        let pools: Vec<SharedPool> = self.pools.iter().map(|e| Arc::clone(e.value())).collect();
        pools.iter().find_map(|pool| {
            let pool = pool.lock();
            (pool.name == name).then_some(pool.id)
        })
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Members with a running heartbeat task.
    pub fn monitored_members(&self) -> usize {
        self.monitor.active()
    }

    /// Stop every heartbeat task. Pools and members stay in place.
    pub fn shutdown(&self) {
        self.monitor.stop_all();
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn engine() -> Engine {
        Engine::new(EngineSettings {
            heartbeat_enabled: false,
            ..EngineSettings::default()
        })
    }

    fn client() -> ClientDescriptor {
        ClientDescriptor::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)), 51000, 6)
    }

    fn spec(last: u8) -> MemberSpec {
        MemberSpec::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)), 80)
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let engine = engine();
        assert_eq!(
            engine.report_telemetry(MemberId(42), TelemetryReport::heartbeat()),
            Err(EngineError::MemberNotFound(MemberId(42)))
        );
        assert_eq!(
            engine.set_overloaded(MemberId(42), true),
            Err(EngineError::MemberNotFound(MemberId(42)))
        );
        assert_eq!(engine.member_count(), 0);
        assert_eq!(engine.select_member(PoolId(9), &client()), None);
    }

    #[test]
    fn test_add_select_remove() {
        let engine = engine();
        let pool = engine.create_pool(PoolSpec::new("web", Strategy::LeastConnections));
        let a = engine.add_member(pool, spec(1)).unwrap();
        let b = engine.add_member(pool, spec(2)).unwrap();

        assert_eq!(engine.select_member(pool, &client()), Some(a));
        assert_eq!(engine.select_member(pool, &client()), Some(b));

        engine.remove_member(a).unwrap();
        assert_eq!(engine.select_member(pool, &client()), Some(b));
        assert_eq!(engine.remove_member(a), Err(EngineError::MemberNotFound(a)));
        assert_eq!(engine.member_snapshot(b).unwrap().connections, 2);
    }

    #[test]
    fn test_invalid_member_rejected() {
        let engine = engine();
        let pool = engine.create_pool(PoolSpec::new("web", Strategy::RoundRobin));
        let err = engine.add_member(pool, spec(1).with_weight(-1.0)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidMember(_)));
        assert_eq!(
            engine.add_member(PoolId(99), spec(1)),
            Err(EngineError::PoolNotFound(PoolId(99)))
        );
    }

    #[test]
    fn test_overloaded_member_skipped_until_cleared() {
        let engine = engine();
        let pool = engine.create_pool(PoolSpec::new("web", Strategy::CpuUsage));
        let a = engine.add_member(pool, spec(1)).unwrap();
        let b = engine.add_member(pool, spec(2)).unwrap();

        engine.set_overloaded(a, true).unwrap();
        for _ in 0..5 {
            assert_eq!(engine.select_member(pool, &client()), Some(b));
        }
        engine.set_overloaded(b, true).unwrap();
        assert_eq!(engine.select_member(pool, &client()), None);

        engine.set_overloaded(a, false).unwrap();
        assert_eq!(engine.select_member(pool, &client()), Some(a));
    }

    #[test]
    fn test_release_connection() {
        let engine = engine();
        let pool = engine.create_pool(PoolSpec::new("web", Strategy::LeastConnections));
        let a = engine.add_member(pool, spec(1)).unwrap();
        engine.select_member(pool, &client());
        engine.select_member(pool, &client());
        engine.release_connection(a).unwrap();
        assert_eq!(engine.member_snapshot(a).unwrap().connections, 1);
    }

    #[test]
    fn test_delete_pool_clears_index() {
        let engine = engine();
        let pool = engine.create_pool(PoolSpec::new("web", Strategy::Random));
        let a = engine.add_member(pool, spec(1)).unwrap();
        engine.delete_pool(pool).unwrap();

        assert_eq!(engine.member_count(), 0);
        assert_eq!(
            engine.report_telemetry(a, TelemetryReport::heartbeat()),
            Err(EngineError::MemberNotFound(a))
        );
        assert_eq!(engine.delete_pool(pool), Err(EngineError::PoolNotFound(pool)));
    }

    #[test]
    fn test_adjust_weights_only_for_weighted_pools() {
        let engine = engine();
        let pool = engine.create_pool(PoolSpec::new("web", Strategy::Composite));
        let a = engine.add_member(pool, spec(1)).unwrap();
        engine
            .report_telemetry(a, TelemetryReport::default().with_cpu_usage(50.0))
            .unwrap();

        assert!(engine.adjust_weights(pool).unwrap().is_empty());

        engine.set_strategy(pool, Strategy::WeightedComposite).unwrap();
        assert_eq!(engine.adjust_weights(pool).unwrap(), vec![(a, 75.0)]);
    }

    #[test]
    fn test_pool_lookup_and_snapshot() {
        let engine = engine();
        let web = engine.create_pool(PoolSpec::new("web", Strategy::RoundRobin));
        let api = engine.create_pool(PoolSpec::new("api", Strategy::Random));
        engine.set_mode(api, LbMode::Tunnel).unwrap();
        let m = engine.add_member(web, spec(3)).unwrap();
        engine.set_admin_state(m, AdminState::Down).unwrap();

        assert_eq!(engine.pool_by_name("api"), Some(api));
        assert_eq!(engine.pool_by_name("db"), None);

        let snapshots = engine.snapshots();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].id, web);
        assert_eq!(snapshots[0].members[0].admin_state, AdminState::Down);
        assert_eq!(snapshots[1].mode, LbMode::Tunnel);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_add_member_racing_pool_delete_leaves_nothing_behind() {
        let engine = Engine::new(EngineSettings::default());
        let handle = tokio::runtime::Handle::current();

        for round in 0..20u8 {
            let pool_id = engine.create_pool(PoolSpec::new(format!("race-{round}"), Strategy::RoundRobin));
            let pool = engine.pool(pool_id).unwrap();
            let guard = pool.lock();

            // both calls queue on the pool lock, in either order
            let added = std::thread::scope(|s| {
                let adder = s.spawn(|| {
                    let _rt = handle.enter();
                    engine.add_member(pool_id, spec(1))
                });
                std::thread::sleep(Duration::from_millis(5));
                let deleter = s.spawn(|| engine.delete_pool(pool_id));
                std::thread::sleep(Duration::from_millis(5));
                drop(guard);
                deleter.join().unwrap().unwrap();
                adder.join().unwrap()
            });

            match added {
                Ok(member) => assert!(engine.member_snapshot(member).is_none()),
                Err(e) => assert_eq!(e, EngineError::PoolNotFound(pool_id)),
            }
            assert_eq!(engine.member_count(), 0, "round {round}");
            assert_eq!(engine.monitored_members(), 0, "round {round}");
        }
    }
}
