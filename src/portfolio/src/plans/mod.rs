//! Subscription plan catalog.
//!
//! Plans are static reference data described in TOML (see [`config`]), synced into the
//! `plans` table (see [`sync`]) and served from an in-memory snapshot (see [`cache`]).
//! A default catalog ships with the crate as [`DEFAULT_PLANS_TOML`].

mod cache;
pub mod config;
pub mod sync;

pub use cache::PlanCache;

use diesel::prelude::*;

use crate::models::Plan;
use crate::schema::plans;

/// Catalog used when no plan file is configured.
pub const DEFAULT_PLANS_TOML: &str = include_str!("../../plans.toml");

/// All plans, cheapest first.
pub fn list(conn: &mut SqliteConnection) -> QueryResult<Vec<Plan>> {
    plans::table
        .order((plans::base_price_cents.asc(), plans::code.asc()))
        .select(Plan::as_select())
        .load(conn)
}

/// One plan by code.
pub fn find(conn: &mut SqliteConnection, code: &str) -> QueryResult<Option<Plan>> {
    plans::table
        .find(code)
        .select(Plan::as_select())
        .first(conn)
        .optional()
}
