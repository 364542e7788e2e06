//! Property CRUD and owner-entered valuations.
//!
//! Every write runs in an immediate transaction and ends with
//! [`crate::subscription::resync`] when the owner's property count can have changed.
//! `current_value_cents` is never written directly: a value supplied on create or update
//! becomes an `owner_estimate` valuation and the property mirrors the latest valuation.

use chrono::{Datelike, Utc};
use diesel::SqliteConnection;
use diesel::prelude::*;
use serde::Deserialize;
use tracing::info;

use crate::error::{FieldErrors, PortfolioError, PortfolioResult};
use crate::models::{NewProperty, NewValuation, Property, PropertyChanges, Valuation};
use crate::money::Cents;
use crate::schema::properties;
use crate::subscription;
use crate::types::{PropertyType, ValuationMethod};
use crate::users::Caller;
use crate::valuation::repo as valuation_repo;
use crate::{pricing, tz};

/// Create/update payload. On create, the address fields and `property_type` are required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyInput {
    /// Street address.
    pub street: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State or region.
    pub state: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Country code; defaults to "US" on create.
    pub country: Option<String>,
    /// One of [`PropertyType`].
    pub property_type: Option<String>,
    /// Bedrooms.
    pub bedrooms: Option<i32>,
    /// Bathrooms.
    pub bathrooms: Option<f64>,
    /// Square footage.
    pub square_feet: Option<i32>,
    /// Year built.
    pub year_built: Option<i32>,
    /// Lot size in square feet.
    pub lot_size_sqft: Option<i32>,
    /// Purchase price.
    pub purchase_price_cents: Option<Cents>,
    /// Purchase date (YYYY-MM-DD).
    pub purchase_date: Option<String>,
    /// Owner's estimate of the current value.
    pub current_value_cents: Option<Cents>,
}

fn trimmed(v: &Option<String>) -> Option<String> {
    v.as_deref().map(str::trim).map(str::to_string)
}

impl PropertyInput {
    fn validate(&self, creating: bool) -> PortfolioResult<()> {
        let mut errs = FieldErrors::new();

        for (field, value) in [
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
        ] {
            match trimmed(value) {
                None if creating => errs.push(field, "is required"),
                Some(s) if s.is_empty() => errs.push(field, "must not be empty"),
                _ => {}
            }
        }
        if let Some(c) = trimmed(&self.country) {
            errs.check(!c.is_empty(), "country", "must not be empty");
        }

        match &self.property_type {
            None if creating => errs.push("property_type", "is required"),
            Some(t) if t.parse::<PropertyType>().is_err() => errs.push(
                "property_type",
                "must be one of single_family, condominium, townhouse, multi_family, commercial",
            ),
            _ => {}
        }

        errs.check(self.bedrooms.is_none_or(|b| b >= 0), "bedrooms", "must not be negative");
        errs.check(
            self.bathrooms.is_none_or(|b| b.is_finite() && b >= 0.0),
            "bathrooms",
            "must not be negative",
        );
        errs.check(self.square_feet.is_none_or(|s| s > 0), "square_feet", "must be positive");
        errs.check(self.lot_size_sqft.is_none_or(|s| s >= 0), "lot_size_sqft", "must not be negative");
        let next_year = Utc::now().year() + 1;
        errs.check(
            self.year_built.is_none_or(|y| (1600..=next_year).contains(&y)),
            "year_built",
            format!("must be between 1600 and {next_year}"),
        );
        errs.amount("purchase_price_cents", self.purchase_price_cents);
        errs.amount("current_value_cents", self.current_value_cents);
        if let Some(d) = &self.purchase_date {
            match tz::parse_date(d.trim()) {
                Ok(date) => errs.check(
                    date <= Utc::now().date_naive(),
                    "purchase_date",
                    "must not be in the future",
                ),
                Err(_) => errs.push("purchase_date", "must be a YYYY-MM-DD date"),
            }
        }

        errs.finish()
    }

    fn property_type_code(&self) -> Option<String> {
        self.property_type
            .as_deref()
            .and_then(|t| t.parse::<PropertyType>().ok())
            .map(|t| t.as_str().to_string())
    }

    fn purchase_date_norm(&self) -> Option<String> {
        self.purchase_date.as_deref().map(|d| d.trim().to_string())
    }

    fn changes(&self) -> PropertyChanges {
        PropertyChanges {
            street: trimmed(&self.street),
            city: trimmed(&self.city),
            state: trimmed(&self.state),
            postal_code: trimmed(&self.postal_code),
            country: trimmed(&self.country).map(|c| c.to_uppercase()),
            property_type: self.property_type_code(),
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            square_feet: self.square_feet,
            year_built: self.year_built,
            lot_size_sqft: self.lot_size_sqft,
            purchase_price_cents: self.purchase_price_cents,
            purchase_date: self.purchase_date_norm(),
            updated_at: Some(tz::now_rfc3339()),
        }
    }
}

/// Owner-entered valuation payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValuationInput {
    /// Estimated value.
    pub value_cents: Cents,
    /// professional, manual or owner_estimate. `automated` is reserved.
    pub method: ValuationMethod,
    /// Optional notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Effective time (RFC3339); defaults to now. Must not be in the future.
    #[serde(default)]
    pub valued_at: Option<String>,
}

fn load(conn: &mut SqliteConnection, id: i32) -> PortfolioResult<Property> {
    properties::table
        .find(id)
        .select(Property::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| PortfolioError::not_found("property", id))
}

/// Load a property the caller may act on.
pub fn get(conn: &mut SqliteConnection, caller: &Caller, id: i32) -> PortfolioResult<Property> {
    let p = load(conn, id)?;
    caller.ensure_owns(p.owner_id)?;
    Ok(p)
}

/// Load a property without an ownership check (maintenance access rules differ).
pub(crate) fn load_unchecked(conn: &mut SqliteConnection, id: i32) -> PortfolioResult<Property> {
    load(conn, id)
}

/// The caller's properties; admins see everything.
pub fn list(conn: &mut SqliteConnection, caller: &Caller) -> PortfolioResult<Vec<Property>> {
    let mut q = properties::table.select(Property::as_select()).into_boxed();
    if !caller.is_admin() {
        q = q.filter(properties::owner_id.eq(caller.id));
    }
    Ok(q.order(properties::id.asc()).load(conn)?)
}

fn owner_estimate(property_id: i32, value: Cents, notes: &str) -> NewValuation {
    NewValuation {
        property_id,
        value_cents: value,
        method: ValuationMethod::OwnerEstimate.as_str().to_string(),
        notes: Some(notes.to_string()),
        valued_at: tz::now_rfc3339(),
    }
}

/// Create a property owned by the caller.
pub fn create(
    conn: &mut SqliteConnection,
    caller: &Caller,
    input: &PropertyInput,
) -> PortfolioResult<Property> {
    input.validate(true)?;

    conn.immediate_transaction::<_, PortfolioError, _>(|conn| {
        if let Some(plan) = subscription::live_plan(conn, caller.id)? {
            let count = subscription::property_count(conn, caller.id)?;
            if !pricing::within_allowance(&plan, count + 1) {
                return Err(PortfolioError::invalid(
                    "plan",
                    format!(
                        "plan '{}' allows at most {} properties",
                        plan.code,
                        plan.max_properties.unwrap_or_default()
                    ),
                ));
            }
        }

        let c = input.changes();
        let row = NewProperty {
            owner_id: caller.id,
            street: c.street.unwrap_or_default(),
            city: c.city.unwrap_or_default(),
            state: c.state.unwrap_or_default(),
            postal_code: c.postal_code.unwrap_or_default(),
            country: c.country.unwrap_or_else(|| "US".to_string()),
            property_type: c.property_type.unwrap_or_default(),
            bedrooms: c.bedrooms,
            bathrooms: c.bathrooms,
            square_feet: c.square_feet,
            year_built: c.year_built,
            lot_size_sqft: c.lot_size_sqft,
            purchase_price_cents: c.purchase_price_cents,
            purchase_date: c.purchase_date.clone(),
        };
        let property: Property = diesel::insert_into(properties::table)
            .values(&row)
            .returning(Property::as_returning())
            .get_result(conn)?;

        if let Some(value) = input.current_value_cents {
            valuation_repo::append(
                conn,
                &owner_estimate(property.id, value, "Initial value provided at creation"),
            )?;
        } else if let Some(price) = input.purchase_price_cents {
            let valued_at = c
                .purchase_date
                .as_deref()
                .and_then(|d| tz::parse_date(d).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| tz::to_rfc3339_millis(d.and_utc()))
                .unwrap_or_else(tz::now_rfc3339);
            valuation_repo::append(
                conn,
                &NewValuation {
                    property_id: property.id,
                    value_cents: price,
                    method: ValuationMethod::Manual.as_str().to_string(),
                    notes: Some("Purchase price".to_string()),
                    valued_at,
                },
            )?;
        }

        subscription::resync(conn, caller.id)?;
        info!(property_id = property.id, owner_id = caller.id, "property created");
        load(conn, property.id)
    })
}

/// Apply a partial update.
pub fn update(
    conn: &mut SqliteConnection,
    caller: &Caller,
    id: i32,
    input: &PropertyInput,
) -> PortfolioResult<Property> {
    input.validate(false)?;

    conn.immediate_transaction::<_, PortfolioError, _>(|conn| {
        let before = get(conn, caller, id)?;

        diesel::update(properties::table.find(id))
            .set(&input.changes())
            .execute(conn)?;

        if let Some(value) = input.current_value_cents {
            if before.current_value_cents != Some(value) {
                valuation_repo::append(conn, &owner_estimate(id, value, "Updated by owner"))?;
            }
        }

        info!(property_id = id, "property updated");
        load(conn, id)
    })
}

/// Delete a property; maintenance records and valuations go with it.
pub fn delete(conn: &mut SqliteConnection, caller: &Caller, id: i32) -> PortfolioResult<()> {
    conn.immediate_transaction::<_, PortfolioError, _>(|conn| {
        let p = get(conn, caller, id)?;
        diesel::delete(properties::table.find(id)).execute(conn)?;
        subscription::resync(conn, p.owner_id)?;
        info!(property_id = id, owner_id = p.owner_id, "property deleted");
        Ok(())
    })
}

/// Valuation history, newest first.
pub fn valuations(
    conn: &mut SqliteConnection,
    caller: &Caller,
    id: i32,
) -> PortfolioResult<Vec<Valuation>> {
    get(conn, caller, id)?;
    Ok(valuation_repo::history(conn, id)?)
}

/// Record a professional, manual or owner valuation.
pub fn add_valuation(
    conn: &mut SqliteConnection,
    caller: &Caller,
    id: i32,
    input: &ValuationInput,
) -> PortfolioResult<Valuation> {
    let mut errs = FieldErrors::new();
    errs.amount("value_cents", Some(input.value_cents));
    errs.check(
        input.method != ValuationMethod::Automated,
        "method",
        "automated valuations are produced by maintenance records",
    );
    let valued_at = match input.valued_at.as_deref().map(tz::parse_ts_to_utc) {
        None => Some(Utc::now()),
        Some(Ok(ts)) if ts <= Utc::now() => Some(ts),
        Some(Ok(_)) => {
            errs.push("valued_at", "must not be in the future");
            None
        }
        Some(Err(_)) => {
            errs.push("valued_at", "must be an RFC3339 timestamp");
            None
        }
    };
    errs.finish()?;
    let valued_at = tz::to_rfc3339_millis(valued_at.unwrap_or_else(Utc::now));

    conn.immediate_transaction::<_, PortfolioError, _>(|conn| {
        get(conn, caller, id)?;
        let notes = input
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        Ok(valuation_repo::append(
            conn,
            &NewValuation {
                property_id: id,
                value_cents: input.value_cents,
                method: input.method.as_str().to_string(),
                notes,
                valued_at,
            },
        )?)
    })
}
