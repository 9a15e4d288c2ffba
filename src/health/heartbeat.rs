//! Per-member heartbeat monitoring.
//!
//! # Responsibilities
//! - Run one periodic task per member
//! - Count intervals that pass without telemetry and take the member out
//!   of service at the threshold
//! - Drive the weight adapter on the same cadence
//! - Stop a member's task when the member is removed

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthConfig;
use crate::health::state::TickOutcome;
use crate::load_balancer::{MemberId, SharedPool, WeightAdapter};
use crate::observability::metrics;

/// Heartbeat timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatSettings {
    /// Time between ticks.
    pub interval: Duration,
    /// Consecutive missed ticks before a member goes out of service.
    pub failure_threshold: u32,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            failure_threshold: 10,
        }
    }
}

impl From<&HealthConfig> for HeartbeatSettings {
    fn from(config: &HealthConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            failure_threshold: config.failure_threshold,
        }
    }
}

/// Owns the heartbeat tasks of every monitored member.
///
/// Each task holds the receiving half of a stop channel. Dropping the sender
/// (on `stop`, `stop_all` or when the monitor itself is dropped) ends the task.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    settings: HeartbeatSettings,
    adapter: WeightAdapter,
    tasks: Mutex<HashMap<MemberId, watch::Sender<bool>>>,
}

impl HeartbeatMonitor {
    pub fn new(settings: HeartbeatSettings, adapter: WeightAdapter) -> Self {
        Self {
            settings,
            adapter,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> HeartbeatSettings {
        self.settings
    }

    /// Start the heartbeat task for `member`. Must be called inside a Tokio runtime.
    pub fn start(&self, member: MemberId, pool: SharedPool) {
        let (stop_tx, stop_rx) = watch::channel(false);
        if let Some(previous) = self.tasks.lock().insert(member, stop_tx) {
            let _ = previous.send(true);
        }

        let settings = self.settings;
        let adapter = self.adapter;
        tokio::spawn(run(member, pool, settings, adapter, stop_rx));

        tracing::debug!(
            member = %member,
            interval_ms = settings.interval.as_millis() as u64,
            threshold = settings.failure_threshold,
            "Heartbeat monitor started"
        );
    }

    /// Stop the task for `member`. Returns false if none was running.
    pub fn stop(&self, member: MemberId) -> bool {
        match self.tasks.lock().remove(&member) {
            Some(stop_tx) => {
                let _ = stop_tx.send(true);
                tracing::debug!(member = %member, "Heartbeat monitor stopped");
                true
            }
            None => false,
        }
    }

    /// Stop every task.
    pub fn stop_all(&self) {
        let tasks: Vec<_> = self.tasks.lock().drain().collect();
        let count = tasks.len();
        for (_, stop_tx) in tasks {
            let _ = stop_tx.send(true);
        }
        tracing::info!(count, "Heartbeat monitors stopped");
    }

    /// Number of members with a running task.
    pub fn active(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_monitoring(&self, member: MemberId) -> bool {
        self.tasks.lock().contains_key(&member)
    }
}

async fn run(
    member: MemberId,
    pool: SharedPool,
    settings: HeartbeatSettings,
    adapter: WeightAdapter,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = time::interval_at(Instant::now() + settings.interval, settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !tick(member, &pool, settings.failure_threshold, &adapter) {
                    tracing::debug!(member = %member, "Member gone, heartbeat task exiting");
                    break;
                }
            }
            _ = stop.changed() => {
                break;
            }
        }
    }
}

/// One heartbeat interval for `member`, under the pool lock.
///
/// Returns false once the member no longer exists.
pub(crate) fn tick(member: MemberId, pool: &SharedPool, threshold: u32, adapter: &WeightAdapter) -> bool {
    let mut pool = pool.lock();
    let pool_id = pool.id;
    let strategy = pool.strategy();
    let Some(m) = pool.member_mut(member) else {
        return false;
    };

    let outcome = m.record_missed_heartbeat(threshold);
    if outcome.is_transition() {
        tracing::warn!(
            pool = %pool_id,
            member = %member,
            address = %m.address,
            port = m.port,
            missed = m.missed_heartbeats(),
            "Member out of service: heartbeat threshold reached"
        );
        metrics::record_health_transition(m.liveness());
        metrics::record_member_in_service(member, false);
    } else if let TickOutcome::Missed(missed) = outcome {
        tracing::trace!(member = %member, missed, "Heartbeat missed");
    }

    if let Some(weight) = adapter.adjust(strategy, m) {
        tracing::debug!(pool = %pool_id, member = %member, weight, "Member weight recomputed");
        metrics::record_member_weight(member, weight);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::{Member, MemberSpec, Pool, PoolId, PoolSpec, Strategy};
    use std::sync::Arc;

    fn shared_pool(strategy: Strategy) -> SharedPool {
        let mut pool = Pool::new(PoolId(1), PoolSpec::new("web", strategy));
        let spec = MemberSpec::new("10.0.0.5".parse().unwrap(), 80);
        pool.add_member(Member::new(MemberId(1), PoolId(1), &spec));
        Arc::new(Mutex::new(pool))
    }

    #[test]
    fn test_tick_transitions_at_threshold() {
        let pool = shared_pool(Strategy::RoundRobin);
        let adapter = WeightAdapter::default();
        for _ in 0..3 {
            assert!(tick(MemberId(1), &pool, 3, &adapter));
        }
        let guard = pool.lock();
        let m = guard.member(MemberId(1)).unwrap();
        assert!(m.is_out_of_service());
        assert_eq!(m.out_of_service_transitions(), 1);
    }

    #[test]
    fn test_tick_on_removed_member_stops() {
        let pool = shared_pool(Strategy::RoundRobin);
        pool.lock().remove_member(MemberId(1));
        assert!(!tick(MemberId(1), &pool, 3, &WeightAdapter::default()));
    }

    #[test]
    fn test_tick_adjusts_weight_for_weighted_pool() {
        let pool = shared_pool(Strategy::WeightedComposite);
        pool.lock().member_mut(MemberId(1)).unwrap().cpu_usage = 50.0;
        tick(MemberId(1), &pool, 10, &WeightAdapter::default());
        // load 30, idle 70
        assert_eq!(pool.lock().member(MemberId(1)).unwrap().weight, 75.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_task() {
        let pool = shared_pool(Strategy::RoundRobin);
        let monitor = HeartbeatMonitor::new(
            HeartbeatSettings {
                interval: Duration::from_secs(1),
                failure_threshold: 2,
            },
            WeightAdapter::default(),
        );
        monitor.start(MemberId(1), pool.clone());
        assert!(monitor.is_monitoring(MemberId(1)));
        assert!(monitor.stop(MemberId(1)));
        assert!(!monitor.stop(MemberId(1)));
        assert_eq!(monitor.active(), 0);

        time::sleep(Duration::from_secs(10)).await;
        let guard = pool.lock();
        assert_eq!(guard.member(MemberId(1)).unwrap().missed_heartbeats(), 0);
    }
}
