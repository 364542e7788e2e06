//! Payment-processor events.
//!
//! The HTTP layer verifies the signature; this module decodes the event envelope and
//! mirrors it onto the subscription and receipt tables. Every event is applied in one
//! immediate transaction and is safe to redeliver: status writes are absolute and
//! receipts are keyed by the processor's event id.

use diesel::SqliteConnection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PortfolioError, PortfolioResult};
use crate::models::{NewReceipt, Subscription};
use crate::money::Cents;
use crate::types::SubscriptionStatus;
use crate::{receipts, subscription, tz};

/// Event envelope as the processor posts it.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorEvent {
    /// Event id, unique per delivery target.
    pub id: String,
    /// Event type, e.g. `invoice.paid`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Unix seconds the event was created.
    #[serde(default)]
    pub created: Option<i64>,
    /// Payload.
    pub data: EventData,
}

/// `data` member of an event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    /// The invoice or subscription the event is about.
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    subscription: Option<String>,
    #[serde(default)]
    amount_paid: Cents,
    #[serde(default = "default_currency")]
    currency: String,
    #[serde(default)]
    description: Option<String>,
    period_start: Option<i64>,
    period_end: Option<i64>,
}

fn default_currency() -> String {
    "usd".to_string()
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    status: Option<String>,
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
}

/// What a webhook delivery did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum EventOutcome {
    /// The subscription was updated.
    Applied {
        /// Local subscription id.
        subscription_id: i32,
        /// Status after the event.
        status: String,
        /// Whether a new receipt was written.
        receipt_recorded: bool,
    },
    /// Nothing to do; the reason is logged and echoed back.
    Ignored {
        /// Why.
        reason: String,
    },
}

impl EventOutcome {
    fn ignored(reason: impl Into<String>) -> Self {
        Self::Ignored { reason: reason.into() }
    }
}

/// Decode a raw webhook body.
pub fn parse_event(body: &[u8]) -> PortfolioResult<ProcessorEvent> {
    serde_json::from_slice(body)
        .map_err(|e| PortfolioError::invalid("body", format!("malformed event: {e}")))
}

fn decode<T: for<'de> Deserialize<'de>>(event: &ProcessorEvent) -> PortfolioResult<T> {
    serde_json::from_value(event.data.object.clone()).map_err(|e| {
        PortfolioError::invalid("data.object", format!("malformed {} payload: {e}", event.kind))
    })
}

fn period(start: Option<i64>, end: Option<i64>) -> PortfolioResult<Option<(String, String)>> {
    match (start, end) {
        (Some(s), Some(e)) => Ok(Some((tz::from_unix_secs(s)?, tz::from_unix_secs(e)?))),
        _ => Ok(None),
    }
}

fn applied(sub: &Subscription, receipt_recorded: bool) -> EventOutcome {
    EventOutcome::Applied {
        subscription_id: sub.id,
        status: sub.status.clone(),
        receipt_recorded,
    }
}

/// Apply one processor event.
///
/// Unknown event types and unknown subscriptions are acknowledged as
/// [`EventOutcome::Ignored`] so the processor stops retrying.
pub fn apply_event(conn: &mut SqliteConnection, event: &ProcessorEvent) -> PortfolioResult<EventOutcome> {
    conn.immediate_transaction::<_, PortfolioError, _>(|conn| {
        let outcome = match event.kind.as_str() {
            "invoice.paid" => invoice_paid(conn, event)?,
            "invoice.payment_failed" => {
                let inv: InvoiceObject = decode(event)?;
                with_subscription(conn, inv.subscription.as_deref(), |conn, sub| {
                    let sub = subscription::set_status(conn, sub.id, SubscriptionStatus::PastDue)?;
                    Ok(applied(&sub, false))
                })?
            }
            "customer.subscription.updated" => {
                let obj: SubscriptionObject = decode(event)?;
                let status = match obj.status.as_deref().map(str::parse::<SubscriptionStatus>) {
                    Some(Ok(s)) => s,
                    Some(Err(e)) => return Ok(EventOutcome::ignored(e.to_string())),
                    None => return Ok(EventOutcome::ignored("no status in event")),
                };
                let window = period(obj.current_period_start, obj.current_period_end)?;
                with_subscription(conn, Some(&obj.id), |conn, sub| {
                    if let Some((start, end)) = &window {
                        subscription::set_period(conn, sub.id, start, end)?;
                    }
                    let sub = subscription::set_status(conn, sub.id, status)?;
                    Ok(applied(&sub, false))
                })?
            }
            "customer.subscription.deleted" => {
                let obj: SubscriptionObject = decode(event)?;
                with_subscription(conn, Some(&obj.id), |conn, sub| {
                    let sub = if sub.status == SubscriptionStatus::Canceled.as_str() {
                        sub
                    } else {
                        subscription::set_status(conn, sub.id, SubscriptionStatus::Canceled)?
                    };
                    Ok(applied(&sub, false))
                })?
            }
            other => EventOutcome::ignored(format!("unhandled event type {other}")),
        };

        match &outcome {
            EventOutcome::Applied { subscription_id, status, receipt_recorded } => info!(
                event_id = %event.id,
                kind = %event.kind,
                subscription_id,
                status = %status,
                receipt_recorded,
                "processor event applied"
            ),
            EventOutcome::Ignored { reason } => warn!(
                event_id = %event.id,
                kind = %event.kind,
                reason = %reason,
                "processor event ignored"
            ),
        }
        Ok(outcome)
    })
}

fn with_subscription(
    conn: &mut SqliteConnection,
    processor_id: Option<&str>,
    f: impl FnOnce(&mut SqliteConnection, Subscription) -> PortfolioResult<EventOutcome>,
) -> PortfolioResult<EventOutcome> {
    let Some(pid) = processor_id else {
        return Ok(EventOutcome::ignored("event carries no subscription id"));
    };
    match subscription::by_processor_id(conn, pid)? {
        Some(sub) => f(conn, sub),
        None => Ok(EventOutcome::ignored(format!("unknown subscription {pid}"))),
    }
}

fn invoice_paid(conn: &mut SqliteConnection, event: &ProcessorEvent) -> PortfolioResult<EventOutcome> {
    let inv: InvoiceObject = decode(event)?;
    let window = period(inv.period_start, inv.period_end)?;
    let issued_at = match event.created {
        Some(secs) => tz::from_unix_secs(secs)?,
        None => tz::now_rfc3339(),
    };

    with_subscription(conn, inv.subscription.as_deref(), |conn, sub| {
        if let Some((start, end)) = &window {
            subscription::set_period(conn, sub.id, start, end)?;
        }
        let sub = subscription::set_status(conn, sub.id, SubscriptionStatus::Active)?;
        let recorded = receipts::record(
            conn,
            &NewReceipt {
                user_id: sub.user_id,
                subscription_id: Some(sub.id),
                amount_cents: inv.amount_paid,
                currency: inv.currency.to_lowercase(),
                description: inv
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("Subscription: {} plan", sub.plan_code)),
                processor_event_id: event.id.clone(),
                issued_at,
            },
        )?;
        Ok(applied(&sub, recorded))
    })
}
