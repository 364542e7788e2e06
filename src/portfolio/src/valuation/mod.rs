//! Maintenance-driven valuation adjustment.
//!
//! ## The calculator
//! [`impact`] maps a maintenance category and cost to the value it adds to a property:
//! `cost × roi_factor(category)`. Factors are held as per-mille integers so the
//! arithmetic stays in cents:
//!
//! | category    | factor |
//! |-------------|--------|
//! | structural  | 1.1    |
//! | renovation  | 1.2    |
//! | plumbing    | 0.8    |
//! | cosmetic    | 0.5    |
//! | landscaping | 0.3    |
//! | other       | 0.4    |
//! | anything else | 0.5  |
//!
//! The calculator is total: unknown categories fall back to [`DEFAULT_ROI_PERMILLE`], and
//! results outside `i64` saturate. Services only feed it costs within
//! [`crate::money::MAX_AMOUNT`], where saturation cannot happen.
//!
//! ## When it applies
//! - On create, only if `cost > 1000.00` ([`creation_adjustment`]).
//! - On update, the difference between old and new impact, only if it exceeds
//!   `100.00` in either direction ([`update_adjustment`]).
//!
//! Persisting the result (reading the latest valuation and appending a new one) lives in
//! [`repo`] and is always run inside an immediate transaction by the caller.

pub mod repo;

use crate::money::{Cents, units};

/// Cost above which a new maintenance record adjusts the property value.
pub const ADJUSTMENT_COST_THRESHOLD: Cents = units(1000);

/// Minimum absolute impact change for an edited record to adjust the value again.
pub const MATERIAL_DELTA_THRESHOLD: Cents = units(100);

/// Factor (per mille) for categories without a table entry.
pub const DEFAULT_ROI_PERMILLE: i64 = 500;

/// ROI factor for `category` in per mille (1100 = 1.1×).
pub fn roi_factor_permille(category: &str) -> i64 {
    match category.trim().to_ascii_lowercase().as_str() {
        "structural" => 1100,
        "renovation" => 1200,
        "plumbing" => 800,
        "cosmetic" => 500,
        "landscaping" => 300,
        "other" => 400,
        _ => DEFAULT_ROI_PERMILLE,
    }
}

/// ROI factor for `category` as a ratio, for display.
pub fn roi_factor(category: &str) -> f64 {
    roi_factor_permille(category) as f64 / 1000.0
}

/// Value added by spending `cost` on `category` work.
///
/// Rounds half away from zero to the nearest cent.
pub fn impact(category: &str, cost: Cents) -> Cents {
    mul_permille(cost, roi_factor_permille(category))
}

fn mul_permille(amount: Cents, permille: i64) -> Cents {
    let n = i128::from(amount) * i128::from(permille);
    let rounded = if n >= 0 { (n + 500) / 1000 } else { (n - 500) / 1000 };
    Cents::try_from(rounded).unwrap_or(if rounded < 0 { Cents::MIN } else { Cents::MAX })
}

/// Adjustment for a newly created record, if its cost clears the threshold.
pub fn creation_adjustment(category: &str, cost: Cents) -> Option<Cents> {
    (cost > ADJUSTMENT_COST_THRESHOLD).then(|| impact(category, cost))
}

/// Adjustment for an edited record: the change in impact, if material.
pub fn update_adjustment(
    old_category: &str,
    old_cost: Cents,
    new_category: &str,
    new_cost: Cents,
) -> Option<Cents> {
    let delta = impact(new_category, new_cost).saturating_sub(impact(old_category, old_cost));
    (delta.abs() > MATERIAL_DELTA_THRESHOLD).then_some(delta)
}
