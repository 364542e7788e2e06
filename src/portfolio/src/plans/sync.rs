//! Plan catalog synchronization.
//!
//! ## What this does
//! - Takes a normalized [`PlanCatalog`] (desired) and the `plans` table (current).
//! - Computes a [`PlanDiff`]: plans to insert or update, and, when pruning, plans to delete.
//! - Applies the diff with UPSERTs in a single `BEGIN IMMEDIATE` transaction.
//!
//! ## Prune and subscriptions
//! `subscriptions.plan_code` is `ON DELETE RESTRICT`. A plan that is absent from the
//! catalog but still referenced by a subscription is reported in
//! [`PlanDiff::retained_in_use`] and left in place instead of failing the whole sync.
//!
//! ## Repricing
//! Every subscription on an upserted plan is passed through
//! [`crate::subscription::resync`] in the same transaction, so stored prices follow
//! catalog changes.
//!
//! ## Dry-run
//! With [`SyncOptions::dry_run`] the diff is computed and returned, nothing is written.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use diesel::SqliteConnection;
use diesel::prelude::*;
use tracing::info;

use crate::models::Plan;
use crate::money::format_cents;
use crate::plans::config::PlanCatalog;
use crate::schema::{plans, subscriptions};
use crate::subscription;

/// Options for plan synchronization.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Compute the diff only.
    pub dry_run: bool,
    /// Delete plans that are not present in the catalog.
    pub prune: bool,
}

/// What needs to change to make the table match the catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanDiff {
    /// New or changed plans, by code.
    pub upsert: BTreeMap<String, Plan>,
    /// Plans to delete (prune only).
    pub delete: BTreeSet<String>,
    /// Plans absent from the catalog but kept because a subscription uses them.
    pub retained_in_use: BTreeSet<String>,
}

impl PlanDiff {
    /// True if there is nothing to upsert or delete.
    pub fn is_noop(&self) -> bool {
        self.upsert.is_empty() && self.delete.is_empty()
    }
}

impl fmt::Display for PlanDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_noop() && self.retained_in_use.is_empty() {
            return write!(f, "No changes");
        }
        for (code, p) in &self.upsert {
            writeln!(
                f,
                "+ {code}  \"{}\"  {} + {}/property",
                p.name,
                format_cents(p.base_price_cents),
                format_cents(p.price_per_property_cents)
            )?;
        }
        for code in &self.delete {
            writeln!(f, "- {code}")?;
        }
        for code in &self.retained_in_use {
            writeln!(f, "! {code}  (in use, not deleted)")?;
        }
        Ok(())
    }
}

fn make_diff(
    conn: &mut SqliteConnection,
    want: &[Plan],
    prune: bool,
) -> anyhow::Result<PlanDiff> {
    let current: BTreeMap<String, Plan> = crate::plans::list(conn)?
        .into_iter()
        .map(|p| (p.code.clone(), p))
        .collect();

    let mut diff = PlanDiff::default();
    for p in want {
        if current.get(&p.code) != Some(p) {
            diff.upsert.insert(p.code.clone(), p.clone());
        }
    }

    if prune {
        let wanted: BTreeSet<&str> = want.iter().map(|p| p.code.as_str()).collect();
        let in_use: BTreeSet<String> = subscriptions::table
            .select(subscriptions::plan_code)
            .distinct()
            .load::<String>(conn)?
            .into_iter()
            .collect();

        for code in current.keys().filter(|c| !wanted.contains(c.as_str())) {
            if in_use.contains(code) {
                diff.retained_in_use.insert(code.clone());
            } else {
                diff.delete.insert(code.clone());
            }
        }
    }
    Ok(diff)
}

/// Apply `diff` and return how many subscriptions were resynced.
fn apply_diff(conn: &mut SqliteConnection, diff: &PlanDiff) -> anyhow::Result<usize> {
    for p in diff.upsert.values() {
        diesel::insert_into(plans::table)
            .values(p)
            .on_conflict(plans::code)
            .do_update()
            .set(p)
            .execute(conn)?;
    }
    for code in &diff.delete {
        diesel::delete(plans::table.find(code)).execute(conn)?;
    }

    let changed: Vec<&str> = diff.upsert.keys().map(String::as_str).collect();
    let subscribers: Vec<i32> = subscriptions::table
        .filter(subscriptions::plan_code.eq_any(changed))
        .select(subscriptions::user_id)
        .load(conn)?;
    for user_id in &subscribers {
        subscription::resync(conn, *user_id)?;
    }
    Ok(subscribers.len())
}

/// Sync the plan catalog into SQLite and return what changed (or would change).
pub fn sync_plans(
    conn: &mut SqliteConnection,
    cat: &PlanCatalog,
    opt: SyncOptions,
) -> anyhow::Result<PlanDiff> {
    let want = cat.to_rows()?;

    conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
        let diff = make_diff(conn, &want, opt.prune)?;
        if !opt.dry_run && !diff.is_noop() {
            let resynced = apply_diff(conn, &diff)?;
            info!(
                upserted = diff.upsert.len(),
                deleted = diff.delete.len(),
                resynced,
                "plan catalog synced"
            );
        }
        Ok(diff)
    })
}
