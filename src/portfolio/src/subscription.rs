//! Subscriptions: one per user, priced from the plan and the user's property count.
//!
//! [`resync`] is the single place that recomputes `property_count` and
//! `current_price_cents`. Everything that can change either input (property create or
//! delete, subscribe, plan change) calls it inside the same transaction, so the stored
//! price always equals [`crate::pricing::price`] of the stored inputs.

use chrono::{Duration, Utc};
use diesel::SqliteConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PortfolioError, PortfolioResult};
use crate::models::{NewSubscription, Plan, Subscription};
use crate::money::Cents;
use crate::pricing::{self, PlanPricing};
use crate::schema::{properties, subscriptions};
use crate::types::SubscriptionStatus;
use crate::users::Caller;
use crate::{plans, tz};

/// Length of a billing period when the processor has not told us otherwise.
pub const DEFAULT_PERIOD_DAYS: i64 = 30;

/// Subscribe payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeInput {
    /// Plan code.
    pub plan: String,
    /// Payment processor subscription id, if checkout already happened.
    #[serde(default)]
    pub processor_subscription_id: Option<String>,
}

/// Result of a price calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    /// Plan code.
    pub plan: String,
    /// Property count the price is for.
    pub property_count: i64,
    /// Base price of the plan.
    pub base_price_cents: Cents,
    /// Per-additional-property price.
    pub price_per_property_cents: Cents,
    /// Total.
    pub price_cents: Cents,
    /// Whether the count fits in the plan allowance.
    pub within_allowance: bool,
}

/// Price `property_count` properties on `plan`.
pub fn quote_for(plan: &Plan, property_count: i64) -> PriceQuote {
    PriceQuote {
        plan: plan.code.clone(),
        property_count,
        base_price_cents: plan.base_price_cents,
        price_per_property_cents: plan.price_per_property_cents,
        price_cents: pricing::price(PlanPricing::from(plan), property_count),
        within_allowance: pricing::within_allowance(plan, property_count),
    }
}

fn require_plan(conn: &mut SqliteConnection, code: &str) -> PortfolioResult<Plan> {
    let code = code.trim().to_lowercase();
    plans::find(conn, &code)?.ok_or_else(|| PortfolioError::invalid("plan", format!("unknown plan '{code}'")))
}

/// Quote against the database catalog.
pub fn quote(conn: &mut SqliteConnection, plan_code: &str, property_count: i64) -> PortfolioResult<PriceQuote> {
    let plan = require_plan(conn, plan_code)?;
    Ok(quote_for(&plan, property_count))
}

/// Number of properties `user_id` owns.
pub fn property_count(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<i64> {
    properties::table
        .filter(properties::owner_id.eq(user_id))
        .count()
        .get_result(conn)
}

/// The user's subscription row, live or canceled.
pub fn for_user(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<Option<Subscription>> {
    subscriptions::table
        .filter(subscriptions::user_id.eq(user_id))
        .select(Subscription::as_select())
        .first(conn)
        .optional()
}

/// Lookup used to route processor webhooks.
pub fn by_processor_id(
    conn: &mut SqliteConnection,
    processor_id: &str,
) -> QueryResult<Option<Subscription>> {
    subscriptions::table
        .filter(subscriptions::processor_subscription_id.eq(processor_id))
        .select(Subscription::as_select())
        .first(conn)
        .optional()
}

/// The caller's subscription, or 404.
pub fn current(conn: &mut SqliteConnection, caller: &Caller) -> PortfolioResult<Subscription> {
    for_user(conn, caller.id)?.ok_or_else(|| PortfolioError::not_found("subscription", caller.id))
}

/// The plan governing `user_id`'s allowance: their live subscription's plan, if any.
pub fn live_plan(conn: &mut SqliteConnection, user_id: i32) -> PortfolioResult<Option<Plan>> {
    let Some(sub) = for_user(conn, user_id)? else {
        return Ok(None);
    };
    let live = sub
        .status
        .parse::<SubscriptionStatus>()
        .map(SubscriptionStatus::is_live)
        .unwrap_or(false);
    if !live {
        return Ok(None);
    }
    Ok(plans::find(conn, &sub.plan_code)?)
}

/// Recompute property count and price for `user_id`'s subscription.
///
/// Idempotent: writes only when something changed. Runs in the caller's transaction.
pub fn resync(conn: &mut SqliteConnection, user_id: i32) -> PortfolioResult<Option<Subscription>> {
    let Some(sub) = for_user(conn, user_id)? else {
        return Ok(None);
    };
    let plan = plans::find(conn, &sub.plan_code)?
        .ok_or_else(|| PortfolioError::not_found("plan", &sub.plan_code))?;

    let count = property_count(conn, user_id)?;
    let price = pricing::price(PlanPricing::from(&plan), count);
    let count_i32 = i32::try_from(count).unwrap_or(i32::MAX);

    if sub.property_count == count_i32 && sub.current_price_cents == price {
        debug!(user_id, subscription_id = sub.id, "subscription already in sync");
        return Ok(Some(sub));
    }

    let updated = diesel::update(subscriptions::table.find(sub.id))
        .set((
            subscriptions::property_count.eq(count_i32),
            subscriptions::current_price_cents.eq(price),
        ))
        .returning(Subscription::as_returning())
        .get_result(conn)?;

    info!(
        user_id,
        subscription_id = sub.id,
        property_count = count,
        price_cents = price,
        "subscription resynced"
    );
    Ok(Some(updated))
}

fn period_from_now() -> (String, String) {
    let start = Utc::now();
    let end = start + Duration::days(DEFAULT_PERIOD_DAYS);
    (tz::to_rfc3339_millis(start), tz::to_rfc3339_millis(end))
}

/// Subscribe the caller to a plan.
///
/// Rejected while a live subscription exists; a canceled one is replaced in place.
pub fn subscribe(
    conn: &mut SqliteConnection,
    caller: &Caller,
    input: &SubscribeInput,
) -> PortfolioResult<Subscription> {
    conn.immediate_transaction::<_, PortfolioError, _>(|conn| {
        let plan = require_plan(conn, &input.plan)?;
        let count = property_count(conn, caller.id)?;
        if !pricing::within_allowance(&plan, count) {
            return Err(PortfolioError::invalid(
                "plan",
                format!("plan '{}' allows fewer properties than the {count} you own", plan.code),
            ));
        }
        let processor_id = input
            .processor_subscription_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let (start, end) = period_from_now();

        if let Some(existing) = for_user(conn, caller.id)? {
            let live = existing
                .status
                .parse::<SubscriptionStatus>()
                .map(SubscriptionStatus::is_live)
                .unwrap_or(true);
            if live {
                return Err(PortfolioError::invalid("plan", "an active subscription already exists"));
            }
            diesel::update(subscriptions::table.find(existing.id))
                .set((
                    subscriptions::plan_code.eq(&plan.code),
                    subscriptions::status.eq(SubscriptionStatus::Active.as_str()),
                    subscriptions::current_period_start.eq(&start),
                    subscriptions::current_period_end.eq(&end),
                    subscriptions::processor_subscription_id.eq(&processor_id),
                    subscriptions::canceled_at.eq(None::<String>),
                ))
                .execute(conn)?;
        } else {
            diesel::insert_into(subscriptions::table)
                .values(&NewSubscription {
                    user_id: caller.id,
                    plan_code: plan.code.clone(),
                    property_count: 0,
                    current_price_cents: plan.base_price_cents,
                    status: SubscriptionStatus::Active.as_str().to_string(),
                    current_period_start: start,
                    current_period_end: end,
                    processor_subscription_id: processor_id,
                })
                .execute(conn)?;
        }

        info!(user_id = caller.id, plan = %plan.code, "subscribed");
        resync(conn, caller.id)?.ok_or_else(|| PortfolioError::not_found("subscription", caller.id))
    })
}

/// Move the caller's live subscription to another plan.
pub fn change_plan(
    conn: &mut SqliteConnection,
    caller: &Caller,
    plan_code: &str,
) -> PortfolioResult<Subscription> {
    conn.immediate_transaction::<_, PortfolioError, _>(|conn| {
        let sub = current(conn, caller)?;
        if sub.status == SubscriptionStatus::Canceled.as_str() {
            return Err(PortfolioError::invalid("plan", "subscription is canceled; subscribe again"));
        }
        let plan = require_plan(conn, plan_code)?;
        let count = property_count(conn, caller.id)?;
        if !pricing::within_allowance(&plan, count) {
            return Err(PortfolioError::invalid(
                "plan",
                format!("plan '{}' allows fewer properties than the {count} you own", plan.code),
            ));
        }
        diesel::update(subscriptions::table.find(sub.id))
            .set(subscriptions::plan_code.eq(&plan.code))
            .execute(conn)?;

        info!(user_id = caller.id, from = %sub.plan_code, to = %plan.code, "plan changed");
        resync(conn, caller.id)?.ok_or_else(|| PortfolioError::not_found("subscription", caller.id))
    })
}

/// Cancel the caller's subscription. Canceling twice is a no-op.
pub fn cancel(conn: &mut SqliteConnection, caller: &Caller) -> PortfolioResult<Subscription> {
    conn.immediate_transaction::<_, PortfolioError, _>(|conn| {
        let sub = current(conn, caller)?;
        if sub.status == SubscriptionStatus::Canceled.as_str() {
            return Ok(sub);
        }
        let updated = set_status(conn, sub.id, SubscriptionStatus::Canceled)?;
        info!(user_id = caller.id, subscription_id = sub.id, "subscription canceled");
        Ok(updated)
    })
}

/// Write a new status; entering `canceled` stamps `canceled_at`.
pub fn set_status(
    conn: &mut SqliteConnection,
    subscription_id: i32,
    status: SubscriptionStatus,
) -> QueryResult<Subscription> {
    let canceled_at = (status == SubscriptionStatus::Canceled).then(tz::now_rfc3339);
    diesel::update(subscriptions::table.find(subscription_id))
        .set((
            subscriptions::status.eq(status.as_str()),
            subscriptions::canceled_at.eq(canceled_at),
        ))
        .returning(Subscription::as_returning())
        .get_result(conn)
}

/// Replace the billing period (from a processor invoice).
pub fn set_period(
    conn: &mut SqliteConnection,
    subscription_id: i32,
    start: &str,
    end: &str,
) -> QueryResult<usize> {
    diesel::update(subscriptions::table.find(subscription_id))
        .set((
            subscriptions::current_period_start.eq(start),
            subscriptions::current_period_end.eq(end),
        ))
        .execute(conn)
}
