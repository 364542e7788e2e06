//! Valuation history storage.
//!
//! Valuations are append-only. After every append the owning property's
//! `current_value_cents` / `last_valuation_date` are re-derived from the latest row
//! (by `valued_at`, then `id`), so the property always mirrors its newest valuation even
//! when a back-dated valuation is recorded.
//!
//! An automated adjustment never takes a value below zero, and one that would leave
//! `i64` is rejected as a validation error on `cost_cents`.
//!
//! Callers run these inside `immediate_transaction` so that "read latest, append" is
//! atomic with respect to other writers.

use diesel::prelude::*;
use diesel::SqliteConnection;
use tracing::{info, warn};

use crate::error::{PortfolioError, PortfolioResult};
use crate::models::{NewValuation, Property, Valuation};
use crate::money::{Cents, format_cents, format_signed_cents};
use crate::schema::{properties, valuations};
use crate::tz;
use crate::types::ValuationMethod;

/// Newest valuation of a property, if any.
pub fn latest(conn: &mut SqliteConnection, property_id: i32) -> QueryResult<Option<Valuation>> {
    valuations::table
        .filter(valuations::property_id.eq(property_id))
        .order((valuations::valued_at.desc(), valuations::id.desc()))
        .select(Valuation::as_select())
        .first(conn)
        .optional()
}

/// Full history, newest first.
pub fn history(conn: &mut SqliteConnection, property_id: i32) -> QueryResult<Vec<Valuation>> {
    valuations::table
        .filter(valuations::property_id.eq(property_id))
        .order((valuations::valued_at.desc(), valuations::id.desc()))
        .select(Valuation::as_select())
        .load(conn)
}

/// Insert a valuation and bring the property's current value in line with the latest one.
pub fn append(conn: &mut SqliteConnection, row: &NewValuation) -> QueryResult<Valuation> {
    let inserted: Valuation = diesel::insert_into(valuations::table)
        .values(row)
        .returning(Valuation::as_returning())
        .get_result(conn)?;

    sync_property_current(conn, row.property_id)?;

    info!(
        property_id = row.property_id,
        valuation_id = inserted.id,
        method = %row.method,
        value = %format_cents(row.value_cents),
        "valuation appended"
    );
    Ok(inserted)
}

/// Copy the latest valuation onto the property row.
pub fn sync_property_current(conn: &mut SqliteConnection, property_id: i32) -> QueryResult<()> {
    if let Some(v) = latest(conn, property_id)? {
        diesel::update(properties::table.find(property_id))
            .set((
                properties::current_value_cents.eq(Some(v.value_cents)),
                properties::last_valuation_date.eq(Some(v.valued_at)),
                properties::updated_at.eq(tz::now_rfc3339()),
            ))
            .execute(conn)?;
    }
    Ok(())
}

/// Value an adjustment is applied on top of.
///
/// The latest valuation when there is one; otherwise the purchase price, recorded
/// first as a `manual` valuation so the history explains where the number came from.
/// `None` when the property has neither.
fn baseline(conn: &mut SqliteConnection, property: &Property) -> QueryResult<Option<Cents>> {
    if let Some(v) = latest(conn, property.id)? {
        return Ok(Some(v.value_cents));
    }
    let Some(purchase) = property.purchase_price_cents else {
        return Ok(None);
    };
    append(
        conn,
        &NewValuation {
            property_id: property.id,
            value_cents: purchase,
            method: ValuationMethod::Manual.as_str().to_string(),
            notes: Some("Baseline from purchase price".to_string()),
            valued_at: tz::now_rfc3339(),
        },
    )?;
    Ok(Some(purchase))
}

/// `base + delta`, floored at zero.
fn adjusted_value(base: Cents, delta: Cents) -> PortfolioResult<Cents> {
    base.checked_add(delta)
        .map(|v| v.max(0))
        .ok_or_else(|| PortfolioError::invalid("cost_cents", "adjustment exceeds the representable value"))
}

/// Append an `automated` valuation `baseline + delta` (at least zero) for `property`.
///
/// Returns `None` (and logs) when there is nothing to adjust from.
pub fn apply_adjustment(
    conn: &mut SqliteConnection,
    property: &Property,
    delta: Cents,
    reason: &str,
) -> PortfolioResult<Option<Valuation>> {
    let Some(base) = baseline(conn, property)? else {
        warn!(
            property_id = property.id,
            delta = %format_signed_cents(delta),
            "no valuation or purchase price to adjust; skipping"
        );
        return Ok(None);
    };
    let value = adjusted_value(base, delta)?;
    if value > base.saturating_add(delta) {
        warn!(property_id = property.id, "adjustment floored at zero");
    }

    let row = NewValuation {
        property_id: property.id,
        value_cents: value,
        method: ValuationMethod::Automated.as_str().to_string(),
        notes: Some(format!(
            "{reason}: {} -> {} ({})",
            format_cents(base),
            format_cents(value),
            format_signed_cents(delta)
        )),
        valued_at: tz::now_rfc3339(),
    };
    Ok(Some(append(conn, &row)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjusted_value_adds_delta() {
        assert_eq!(adjusted_value(50_000_000, 220_000).unwrap(), 50_220_000);
        assert_eq!(adjusted_value(50_000_000, -160_000).unwrap(), 49_840_000);
    }

    #[test]
    fn adjusted_value_floors_at_zero() {
        assert_eq!(adjusted_value(100_000, -160_000).unwrap(), 0);
    }

    #[test]
    fn adjusted_value_rejects_overflow() {
        let err = adjusted_value(50_000_000, Cents::MAX).unwrap_err();
        assert!(matches!(err, PortfolioError::Validation(ref f) if f[0].field == "cost_cents"));
    }
}
