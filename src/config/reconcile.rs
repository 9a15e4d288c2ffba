//! Apply a configuration to a running engine.
//!
//! Pools are matched by name, members by `(pool, address, port)`. Live
//! telemetry, weights and liveness of members that survive a reload are kept.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use crate::config::schema::BalancerConfig;
use crate::engine::{Engine, EngineError, EngineResult};

/// What a reconcile pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub pools_created: usize,
    pub pools_deleted: usize,
    pub pools_updated: usize,
    pub members_added: usize,
    pub members_removed: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Bring the engine's pools and members in line with `config`.
pub fn apply_config(engine: &Engine, config: &BalancerConfig) -> EngineResult<ReconcileReport> {
    let mut report = ReconcileReport::default();
    let wanted: HashSet<&str> = config.pools.iter().map(|p| p.name.as_str()).collect();

    let mut existing = HashMap::new();
    for snapshot in engine.snapshots() {
        if wanted.contains(snapshot.name.as_str()) {
            existing.insert(snapshot.name.clone(), snapshot);
        } else {
            engine.delete_pool(snapshot.id)?;
            report.pools_deleted += 1;
        }
    }

    for pool_config in &config.pools {
        let (pool_id, current) = match existing.remove(&pool_config.name) {
            Some(snapshot) => {
                if snapshot.strategy != pool_config.strategy || snapshot.mode != pool_config.mode {
                    engine.set_strategy(snapshot.id, pool_config.strategy)?;
                    engine.set_mode(snapshot.id, pool_config.mode)?;
                    report.pools_updated += 1;
                }
                let current: HashMap<(IpAddr, u16), _> = snapshot
                    .members
                    .iter()
                    .map(|m| ((m.address, m.port), m.id))
                    .collect();
                (snapshot.id, current)
            }
            None => {
                report.pools_created += 1;
                (engine.create_pool(pool_config.to_spec()), HashMap::new())
            }
        };

        let mut keep = HashSet::new();
        for member_config in config.members.iter().filter(|m| m.pool == pool_config.name) {
            let spec = member_config
                .to_spec()
                .map_err(|e| EngineError::InvalidMember(format!("{}: {e}", member_config.address)))?;
            let key = (spec.address, spec.port);
            if !keep.insert(key) || current.contains_key(&key) {
                continue;
            }
            engine.add_member(pool_id, spec)?;
            report.members_added += 1;
        }

        for (key, member) in &current {
            if !keep.contains(key) {
                engine.remove_member(*member)?;
                report.members_removed += 1;
            }
        }
    }

    if report.is_noop() {
        tracing::debug!("Config applied, nothing changed");
    } else {
        tracing::info!(
            pools_created = report.pools_created,
            pools_deleted = report.pools_deleted,
            pools_updated = report.pools_updated,
            members_added = report.members_added,
            members_removed = report.members_removed,
            "Config applied"
        );
    }
    Ok(report)
}
