//! Lock-free, read-mostly snapshot of the plan catalog.
//!
//! Readers call [`PlanCache::get`] / [`PlanCache::snapshot`], which load an `Arc` with no
//! locking. Writers call [`PlanCache::refresh`] after a sync to atomically swap in a new
//! snapshot. The cache is a value owned by whoever needs it (the HTTP state holds one),
//! not a process-wide global.

use std::sync::Arc;

use arc_swap::ArcSwap;
use diesel::SqliteConnection;
use indexmap::IndexMap;

use crate::models::Plan;

type Snapshot = IndexMap<String, Plan>;

/// Atomically swappable plan snapshot, ordered cheapest first.
pub struct PlanCache {
    inner: ArcSwap<Snapshot>,
}

impl Default for PlanCache {
    fn default() -> Self {
        Self {
            inner: ArcSwap::from_pointee(Snapshot::new()),
        }
    }
}

impl PlanCache {
    /// Empty cache; every lookup misses until [`PlanCache::refresh`] runs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reload all plans from the database and swap them in.
    pub fn refresh(&self, conn: &mut SqliteConnection) -> anyhow::Result<()> {
        let plans = crate::plans::list(conn)?;
        self.inner
            .store(Arc::new(plans.into_iter().map(|p| (p.code.clone(), p)).collect()));
        Ok(())
    }

    /// One plan by code.
    pub fn get(&self, code: &str) -> Option<Plan> {
        self.inner.load().get(code).cloned()
    }

    /// Current snapshot for iteration.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.load_full()
    }
}
