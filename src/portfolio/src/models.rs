//! Diesel models for portfolio tables.
//!
//! Each table has a read model (Queryable/Selectable, Serialize for API responses) and an
//! Insertable form. Editable tables additionally get a changeset whose `None` fields are
//! left untouched by `UPDATE`.
//!
//! Tables:
//! - [`crate::schema::users`]: accounts and bearer-token digests
//! - [`crate::schema::plans`]: subscription plan catalog (synced from TOML)
//! - [`crate::schema::properties`]: owned properties
//! - [`crate::schema::maintenance_records`]: work done on a property
//! - [`crate::schema::valuations`]: append-only value history
//! - [`crate::schema::subscriptions`]: one per user
//! - [`crate::schema::receipts`]: immutable billing events
//!
//! See migrations for constraints (CHECKs on every vocabulary column, `updated_at`
//! triggers, and `ON DELETE CASCADE` foreign keys).

use diesel::prelude::*;
use serde::{Serialize, Serializer};

use crate::money::Cents;
use crate::schema::*;

/// Emit a TEXT column holding a JSON array as a real JSON array.
fn json_text<S: Serializer>(raw: &str, s: S) -> Result<S::Ok, S::Error> {
    let v: serde_json::Value =
        serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::Array(vec![]));
    v.serialize(s)
}

/// A row in [`crate::schema::users`].
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = users, check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    /// Primary key.
    pub id: i32,
    /// Unique login email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// One of [`crate::types::Role`].
    pub role: String,
    /// SHA-256 hex digest of the bearer token. Never serialized.
    #[serde(skip_serializing)]
    pub token_hash: String,
    /// Creation timestamp (RFC3339 UTC).
    pub created_at: String,
}

/// Insertable form of [`User`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    /// Unique login email.
    pub email: &'a str,
    /// Display name.
    pub name: &'a str,
    /// Role code.
    pub role: &'a str,
    /// Token digest.
    pub token_hash: &'a str,
}

/// A row in [`crate::schema::plans`].
#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = plans, primary_key(code), check_for_backend(diesel::sqlite::Sqlite))]
pub struct Plan {
    /// Lowercase plan code, e.g. "basic".
    pub code: String,
    /// Display name.
    pub name: String,
    /// Price including the first property.
    pub base_price_cents: Cents,
    /// Price of each property after the first.
    pub price_per_property_cents: Cents,
    /// Property allowance; `None` means unlimited.
    pub max_properties: Option<i32>,
    /// JSON array of feature strings.
    #[serde(serialize_with = "json_text")]
    pub features: String,
}

impl Plan {
    /// Decoded feature list.
    pub fn feature_list(&self) -> Vec<String> {
        serde_json::from_str(&self.features).unwrap_or_default()
    }
}

/// A row in [`crate::schema::properties`].
#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = properties, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Property {
    /// Primary key.
    pub id: i32,
    /// FK to [`User::id`].
    pub owner_id: i32,
    /// Street address.
    pub street: String,
    /// City.
    pub city: String,
    /// State or region.
    pub state: String,
    /// Postal code.
    pub postal_code: String,
    /// Country code.
    pub country: String,
    /// One of [`crate::types::PropertyType`].
    pub property_type: String,
    /// Bedrooms.
    pub bedrooms: Option<i32>,
    /// Bathrooms (halves allowed).
    pub bathrooms: Option<f64>,
    /// Interior square footage.
    pub square_feet: Option<i32>,
    /// Year of construction.
    pub year_built: Option<i32>,
    /// Lot size in square feet.
    pub lot_size_sqft: Option<i32>,
    /// Purchase price.
    pub purchase_price_cents: Option<Cents>,
    /// Purchase date (YYYY-MM-DD).
    pub purchase_date: Option<String>,
    /// Value of the most recent valuation.
    pub current_value_cents: Option<Cents>,
    /// Timestamp of the most recent valuation.
    pub last_valuation_date: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Update timestamp (maintained by trigger).
    pub updated_at: String,
}

/// Insertable form of [`Property`].
///
/// `current_value_cents` and `last_valuation_date` are absent on purpose: they are only
/// written by the valuation repository.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = properties)]
pub struct NewProperty {
    /// Owner.
    pub owner_id: i32,
    /// Street address.
    pub street: String,
    /// City.
    pub city: String,
    /// State or region.
    pub state: String,
    /// Postal code.
    pub postal_code: String,
    /// Country code.
    pub country: String,
    /// Property type code.
    pub property_type: String,
    /// Bedrooms.
    pub bedrooms: Option<i32>,
    /// Bathrooms.
    pub bathrooms: Option<f64>,
    /// Square footage.
    pub square_feet: Option<i32>,
    /// Year built.
    pub year_built: Option<i32>,
    /// Lot size.
    pub lot_size_sqft: Option<i32>,
    /// Purchase price.
    pub purchase_price_cents: Option<Cents>,
    /// Purchase date.
    pub purchase_date: Option<String>,
}

/// Partial update of a [`Property`]. `None` leaves the column as is.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = properties)]
pub struct PropertyChanges {
    /// Street address.
    pub street: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State or region.
    pub state: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Country code.
    pub country: Option<String>,
    /// Property type code.
    pub property_type: Option<String>,
    /// Bedrooms.
    pub bedrooms: Option<i32>,
    /// Bathrooms.
    pub bathrooms: Option<f64>,
    /// Square footage.
    pub square_feet: Option<i32>,
    /// Year built.
    pub year_built: Option<i32>,
    /// Lot size.
    pub lot_size_sqft: Option<i32>,
    /// Purchase price.
    pub purchase_price_cents: Option<Cents>,
    /// Purchase date.
    pub purchase_date: Option<String>,
    /// Set explicitly so an otherwise empty edit is still a valid `UPDATE`.
    pub updated_at: Option<String>,
}

/// A row in [`crate::schema::maintenance_records`].
#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Associations, Selectable, Serialize)]
#[diesel(table_name = maintenance_records, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(Property, foreign_key = property_id))]
pub struct MaintenanceRecord {
    /// Primary key.
    pub id: i32,
    /// FK to [`Property::id`].
    pub property_id: i32,
    /// FK to [`User::id`] of whoever logged the work.
    pub created_by: Option<i32>,
    /// Short title.
    pub title: String,
    /// Free-form description.
    pub description: Option<String>,
    /// One of [`crate::types::MaintenanceCategory`].
    pub category: String,
    /// Cost of the work.
    pub cost_cents: Cents,
    /// Completion date (YYYY-MM-DD).
    pub completion_date: Option<String>,
    /// Contractor name.
    pub contractor_name: Option<String>,
    /// Contractor phone.
    pub contractor_phone: Option<String>,
    /// Contractor email.
    pub contractor_email: Option<String>,
    /// JSON array of attachment URLs.
    #[serde(serialize_with = "json_text")]
    pub attachments: String,
    /// Warranty expiry (YYYY-MM-DD).
    pub warranty_expires: Option<String>,
    /// Warranty terms.
    pub warranty_details: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Update timestamp.
    pub updated_at: String,
}

/// Insertable form of [`MaintenanceRecord`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = maintenance_records)]
pub struct NewMaintenanceRecord {
    /// Property the work was done on.
    pub property_id: i32,
    /// Author.
    pub created_by: Option<i32>,
    /// Title.
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Category code.
    pub category: String,
    /// Cost.
    pub cost_cents: Cents,
    /// Completion date.
    pub completion_date: Option<String>,
    /// Contractor name.
    pub contractor_name: Option<String>,
    /// Contractor phone.
    pub contractor_phone: Option<String>,
    /// Contractor email.
    pub contractor_email: Option<String>,
    /// JSON array of attachment URLs.
    pub attachments: String,
    /// Warranty expiry.
    pub warranty_expires: Option<String>,
    /// Warranty terms.
    pub warranty_details: Option<String>,
}

/// Partial update of a [`MaintenanceRecord`].
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = maintenance_records)]
pub struct MaintenanceChanges {
    /// Title.
    pub title: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Category code.
    pub category: Option<String>,
    /// Cost.
    pub cost_cents: Option<Cents>,
    /// Completion date.
    pub completion_date: Option<String>,
    /// Contractor name.
    pub contractor_name: Option<String>,
    /// Contractor phone.
    pub contractor_phone: Option<String>,
    /// Contractor email.
    pub contractor_email: Option<String>,
    /// JSON array of attachment URLs.
    pub attachments: Option<String>,
    /// Warranty expiry.
    pub warranty_expires: Option<String>,
    /// Warranty terms.
    pub warranty_details: Option<String>,
    /// Set explicitly so the `updated_at` column moves on every edit.
    pub updated_at: Option<String>,
}

/// A row in [`crate::schema::valuations`]. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Associations, Selectable, Serialize)]
#[diesel(table_name = valuations, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(Property, foreign_key = property_id))]
pub struct Valuation {
    /// Primary key.
    pub id: i32,
    /// FK to [`Property::id`].
    pub property_id: i32,
    /// Estimated value.
    pub value_cents: Cents,
    /// One of [`crate::types::ValuationMethod`].
    pub method: String,
    /// Explanation, e.g. which maintenance record caused the change.
    pub notes: Option<String>,
    /// Effective timestamp; the latest one is the property's current value.
    pub valued_at: String,
}

/// Insertable form of [`Valuation`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = valuations)]
pub struct NewValuation {
    /// Property.
    pub property_id: i32,
    /// Value.
    pub value_cents: Cents,
    /// Method code.
    pub method: String,
    /// Notes.
    pub notes: Option<String>,
    /// Effective timestamp.
    pub valued_at: String,
}

/// A row in [`crate::schema::subscriptions`].
#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = subscriptions, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Subscription {
    /// Primary key.
    pub id: i32,
    /// FK to [`User::id`]; unique.
    pub user_id: i32,
    /// FK to [`Plan::code`].
    pub plan_code: String,
    /// Number of properties the user owned at the last resync.
    pub property_count: i32,
    /// `plan.base + max(0, property_count - 1) * plan.per_property`.
    pub current_price_cents: Cents,
    /// One of [`crate::types::SubscriptionStatus`].
    pub status: String,
    /// Billing period start.
    pub current_period_start: String,
    /// Billing period end.
    pub current_period_end: String,
    /// Payment processor's subscription id, used to route webhooks.
    pub processor_subscription_id: Option<String>,
    /// When the subscription was canceled.
    pub canceled_at: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Update timestamp.
    pub updated_at: String,
}

/// Insertable form of [`Subscription`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct NewSubscription {
    /// Subscriber.
    pub user_id: i32,
    /// Plan code.
    pub plan_code: String,
    /// Property count at creation.
    pub property_count: i32,
    /// Price at creation.
    pub current_price_cents: Cents,
    /// Status code.
    pub status: String,
    /// Period start.
    pub current_period_start: String,
    /// Period end.
    pub current_period_end: String,
    /// Processor id.
    pub processor_subscription_id: Option<String>,
}

/// A row in [`crate::schema::receipts`].
#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = receipts, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Receipt {
    /// Primary key.
    pub id: i32,
    /// Billed user.
    pub user_id: i32,
    /// Subscription the charge belongs to.
    pub subscription_id: Option<i32>,
    /// Amount charged.
    pub amount_cents: Cents,
    /// ISO currency code, lowercase as processors send it.
    pub currency: String,
    /// Line description.
    pub description: String,
    /// Processor event id; unique so webhook redelivery is harmless.
    pub processor_event_id: String,
    /// When the charge happened.
    pub issued_at: String,
}

/// Insertable form of [`Receipt`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = receipts)]
pub struct NewReceipt {
    /// Billed user.
    pub user_id: i32,
    /// Subscription.
    pub subscription_id: Option<i32>,
    /// Amount.
    pub amount_cents: Cents,
    /// Currency.
    pub currency: String,
    /// Description.
    pub description: String,
    /// Processor event id.
    pub processor_event_id: String,
    /// Issue timestamp.
    pub issued_at: String,
}
