//! Maintenance records and the valuation adjustments they trigger.
//!
//! Create and update run in one `BEGIN IMMEDIATE` transaction that covers the record
//! write, the latest-valuation read and the valuation append, so two concurrent writers
//! on the same property cannot both adjust from the same baseline.

use diesel::SqliteConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{FieldErrors, PortfolioError, PortfolioResult};
use crate::models::{
    MaintenanceChanges, MaintenanceRecord, NewMaintenanceRecord, Property, Valuation,
};
use crate::money::{Cents, format_cents};
use crate::schema::{maintenance_records, properties};
use crate::types::{MaintenanceCategory, Role};
use crate::users::Caller;
use crate::valuation::{self, repo as valuation_repo};
use crate::{property, tz};

/// Create/update payload. `property_id`, `title`, `category` and `cost_cents` are
/// required on create; `property_id` cannot be changed afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaintenanceInput {
    /// Property the work was done on.
    pub property_id: Option<i32>,
    /// Short title.
    pub title: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// One of [`MaintenanceCategory`].
    pub category: Option<String>,
    /// Cost of the work.
    pub cost_cents: Option<Cents>,
    /// Completion date (YYYY-MM-DD).
    pub completion_date: Option<String>,
    /// Contractor name.
    pub contractor_name: Option<String>,
    /// Contractor phone.
    pub contractor_phone: Option<String>,
    /// Contractor email.
    pub contractor_email: Option<String>,
    /// Attachment URLs; replaces the whole list on update.
    pub attachments: Option<Vec<String>>,
    /// Warranty expiry (YYYY-MM-DD).
    pub warranty_expires: Option<String>,
    /// Warranty terms.
    pub warranty_details: Option<String>,
}

/// A written record plus the valuation it produced, if any.
#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceOutcome {
    /// The stored record.
    pub record: MaintenanceRecord,
    /// Automated valuation appended by this write.
    pub valuation: Option<Valuation>,
}

/// Listing filter.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct MaintenanceFilter {
    /// Only records on this property.
    pub property_id: Option<i32>,
}

fn clean(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl MaintenanceInput {
    fn validate(&self, creating: bool) -> PortfolioResult<()> {
        let mut errs = FieldErrors::new();

        if creating {
            errs.check(self.property_id.is_some(), "property_id", "is required");
            errs.check(self.cost_cents.is_some(), "cost_cents", "is required");
        } else {
            errs.check(self.property_id.is_none(), "property_id", "cannot be changed");
        }
        match self.title.as_deref().map(str::trim) {
            None if creating => errs.push("title", "is required"),
            Some("") => errs.push("title", "must not be empty"),
            _ => {}
        }
        match &self.category {
            None if creating => errs.push("category", "is required"),
            Some(c) if c.parse::<MaintenanceCategory>().is_err() => {
                let allowed: Vec<&str> = MaintenanceCategory::ALL.iter().map(|c| c.as_str()).collect();
                errs.push("category", format!("must be one of {}", allowed.join(", ")));
            }
            _ => {}
        }
        errs.amount("cost_cents", self.cost_cents);

        for (field, value) in [
            ("completion_date", &self.completion_date),
            ("warranty_expires", &self.warranty_expires),
        ] {
            if let Some(d) = value {
                errs.check(tz::parse_date(d.trim()).is_ok(), field, "must be a YYYY-MM-DD date");
            }
        }
        if let Some(email) = clean(&self.contractor_email) {
            errs.check(email.contains('@'), "contractor_email", "must be a valid email address");
        }
        if let Some(urls) = &self.attachments {
            errs.check(
                urls.iter().all(|u| !u.trim().is_empty()),
                "attachments",
                "must not contain empty entries",
            );
        }

        errs.finish()
    }

    fn category_code(&self) -> Option<String> {
        self.category
            .as_deref()
            .and_then(|c| c.parse::<MaintenanceCategory>().ok())
            .map(|c| c.as_str().to_string())
    }

    fn attachments_json(&self) -> PortfolioResult<Option<String>> {
        self.attachments
            .as_ref()
            .map(|urls| {
                let trimmed: Vec<&str> = urls.iter().map(|u| u.trim()).collect();
                serde_json::to_string(&trimmed).map_err(|e| PortfolioError::Internal(e.into()))
            })
            .transpose()
    }

    fn changes(&self) -> PortfolioResult<MaintenanceChanges> {
        Ok(MaintenanceChanges {
            title: clean(&self.title),
            description: clean(&self.description),
            category: self.category_code(),
            cost_cents: self.cost_cents,
            completion_date: clean(&self.completion_date),
            contractor_name: clean(&self.contractor_name),
            contractor_phone: clean(&self.contractor_phone),
            contractor_email: clean(&self.contractor_email),
            attachments: self.attachments_json()?,
            warranty_expires: clean(&self.warranty_expires),
            warranty_details: clean(&self.warranty_details),
            updated_at: Some(tz::now_rfc3339()),
        })
    }
}

fn load(conn: &mut SqliteConnection, id: i32) -> PortfolioResult<(MaintenanceRecord, Property)> {
    let record: MaintenanceRecord = maintenance_records::table
        .find(id)
        .select(MaintenanceRecord::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| PortfolioError::not_found("maintenance record", id))?;
    let prop = property::load_unchecked(conn, record.property_id)?;
    Ok((record, prop))
}

/// Owner of the property, author of the record, or admin.
fn ensure_can_edit(caller: &Caller, record: &MaintenanceRecord, prop: &Property) -> PortfolioResult<()> {
    if record.created_by == Some(caller.id) {
        return Ok(());
    }
    caller.ensure_owns(prop.owner_id)
}

/// One record.
pub fn get(conn: &mut SqliteConnection, caller: &Caller, id: i32) -> PortfolioResult<MaintenanceRecord> {
    let (record, prop) = load(conn, id)?;
    ensure_can_edit(caller, &record, &prop)?;
    Ok(record)
}

/// Records the caller can see: on their properties or written by them. Admins see all.
///
/// Filtering on a property requires owning it, except for admins and tradespeople, who
/// may work on any property.
pub fn list(
    conn: &mut SqliteConnection,
    caller: &Caller,
    filter: MaintenanceFilter,
) -> PortfolioResult<Vec<MaintenanceRecord>> {
    if let Some(pid) = filter.property_id {
        if caller.is_admin() || caller.role == Role::Tradesperson {
            property::load_unchecked(conn, pid)?;
        } else {
            property::get(conn, caller, pid)?;
        }
    }

    let mut q = maintenance_records::table
        .inner_join(properties::table)
        .select(MaintenanceRecord::as_select())
        .into_boxed();
    if let Some(pid) = filter.property_id {
        q = q.filter(maintenance_records::property_id.eq(pid));
    }
    if !caller.is_admin() {
        q = q.filter(
            properties::owner_id
                .eq(caller.id)
                .or(maintenance_records::created_by.eq(caller.id)),
        );
    }
    Ok(q.order(maintenance_records::id.asc()).load(conn)?)
}

/// Log work on a property and apply its valuation impact.
pub fn create(
    conn: &mut SqliteConnection,
    caller: &Caller,
    input: &MaintenanceInput,
) -> PortfolioResult<MaintenanceOutcome> {
    input.validate(true)?;
    let property_id = input.property_id.unwrap_or_default();
    let cost = input.cost_cents.unwrap_or_default();
    let category = input.category_code().unwrap_or_default();
    let title = clean(&input.title).unwrap_or_default();
    let c = input.changes()?;

    conn.immediate_transaction::<_, PortfolioError, _>(|conn| {
        let prop = property::load_unchecked(conn, property_id)?;
        if caller.role != Role::Tradesperson {
            caller.ensure_owns(prop.owner_id)?;
        }

        let record: MaintenanceRecord = diesel::insert_into(maintenance_records::table)
            .values(&NewMaintenanceRecord {
                property_id,
                created_by: Some(caller.id),
                title: title.clone(),
                description: c.description,
                category: category.clone(),
                cost_cents: cost,
                completion_date: c.completion_date,
                contractor_name: c.contractor_name,
                contractor_phone: c.contractor_phone,
                contractor_email: c.contractor_email,
                attachments: c.attachments.unwrap_or_else(|| "[]".to_string()),
                warranty_expires: c.warranty_expires,
                warranty_details: c.warranty_details,
            })
            .returning(MaintenanceRecord::as_returning())
            .get_result(conn)?;

        let valuation = match valuation::creation_adjustment(&category, cost) {
            Some(delta) => {
                let reason = format!("Maintenance '{title}' ({category}, {})", format_cents(cost));
                valuation_repo::apply_adjustment(conn, &prop, delta, &reason)?
            }
            None => None,
        };

        info!(
            record_id = record.id,
            property_id,
            category = %category,
            cost = %format_cents(cost),
            adjusted = valuation.is_some(),
            "maintenance record created"
        );
        Ok(MaintenanceOutcome { record, valuation })
    })
}

/// Edit a record; a material change in impact adjusts the property value by the difference.
pub fn update(
    conn: &mut SqliteConnection,
    caller: &Caller,
    id: i32,
    input: &MaintenanceInput,
) -> PortfolioResult<MaintenanceOutcome> {
    input.validate(false)?;
    let changes = input.changes()?;

    conn.immediate_transaction::<_, PortfolioError, _>(|conn| {
        let (before, prop) = load(conn, id)?;
        ensure_can_edit(caller, &before, &prop)?;

        let record: MaintenanceRecord = diesel::update(maintenance_records::table.find(id))
            .set(&changes)
            .returning(MaintenanceRecord::as_returning())
            .get_result(conn)?;

        let delta = valuation::update_adjustment(
            &before.category,
            before.cost_cents,
            &record.category,
            record.cost_cents,
        );
        let valuation = match delta {
            Some(delta) => {
                let reason = format!(
                    "Maintenance '{}' updated ({} {} -> {} {})",
                    record.title,
                    before.category,
                    format_cents(before.cost_cents),
                    record.category,
                    format_cents(record.cost_cents)
                );
                valuation_repo::apply_adjustment(conn, &prop, delta, &reason)?
            }
            None => None,
        };

        info!(record_id = id, adjusted = valuation.is_some(), "maintenance record updated");
        Ok(MaintenanceOutcome { record, valuation })
    })
}

/// Remove a record. Valuations it produced stay in the history.
pub fn delete(conn: &mut SqliteConnection, caller: &Caller, id: i32) -> PortfolioResult<()> {
    conn.immediate_transaction::<_, PortfolioError, _>(|conn| {
        let (record, prop) = load(conn, id)?;
        ensure_can_edit(caller, &record, &prop)?;
        diesel::delete(maintenance_records::table.find(id)).execute(conn)?;
        info!(record_id = id, property_id = prop.id, "maintenance record deleted");
        Ok(())
    })
}
