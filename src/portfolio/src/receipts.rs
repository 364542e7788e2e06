//! Billing receipts. Written only by processor webhooks, read by their owners.

use diesel::SqliteConnection;
use diesel::prelude::*;

use crate::error::{PortfolioError, PortfolioResult};
use crate::models::{NewReceipt, Receipt};
use crate::schema::receipts;
use crate::users::Caller;

/// The caller's receipts, newest first. Admins see everyone's.
pub fn list(conn: &mut SqliteConnection, caller: &Caller) -> PortfolioResult<Vec<Receipt>> {
    let mut q = receipts::table.select(Receipt::as_select()).into_boxed();
    if !caller.is_admin() {
        q = q.filter(receipts::user_id.eq(caller.id));
    }
    Ok(q.order((receipts::issued_at.desc(), receipts::id.desc())).load(conn)?)
}

/// One receipt.
pub fn get(conn: &mut SqliteConnection, caller: &Caller, id: i32) -> PortfolioResult<Receipt> {
    let r: Receipt = receipts::table
        .find(id)
        .select(Receipt::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| PortfolioError::not_found("receipt", id))?;
    caller.ensure_owns(r.user_id)?;
    Ok(r)
}

/// Insert unless a receipt for the same processor event exists. Returns whether a row
/// was written, so redelivered webhooks are harmless.
pub fn record(conn: &mut SqliteConnection, row: &NewReceipt) -> QueryResult<bool> {
    let n = diesel::insert_into(receipts::table)
        .values(row)
        .on_conflict(receipts::processor_event_id)
        .do_nothing()
        .execute(conn)?;
    Ok(n > 0)
}
