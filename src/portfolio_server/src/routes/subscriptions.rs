use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State as AxumState,
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use portfolio::PortfolioError;
use portfolio::billing::{self, EventOutcome};
use portfolio::models::{Plan, Subscription};
use portfolio::subscription::{self, PriceQuote, SubscribeInput};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::warn;

use crate::{
    auth::Auth,
    error::AppError,
    extract::{ApiJson, ApiQuery},
    state::State,
    webhook::{self, SIGNATURE_HEADER},
};

type AppState = AxumState<Arc<State>>;

/// Plan catalog, cheapest first. Public.
pub async fn plans(AxumState(state): AppState) -> Json<Vec<Plan>> {
    Json(state.plans.snapshot().values().cloned().collect())
}

pub async fn current(AxumState(state): AppState, Auth(caller): Auth) -> Result<Json<Subscription>, AppError> {
    Ok(Json(state.db(move |conn| subscription::current(conn, &caller)).await?))
}

pub async fn subscribe(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiJson(input): ApiJson<SubscribeInput>,
) -> Result<(StatusCode, Json<Subscription>), AppError> {
    let sub = state.db(move |conn| subscription::subscribe(conn, &caller, &input)).await?;
    Ok((StatusCode::CREATED, Json(sub)))
}

#[derive(Deserialize)]
pub struct ChangePlan {
    plan: String,
}

pub async fn change_plan(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiJson(body): ApiJson<ChangePlan>,
) -> Result<Json<Subscription>, AppError> {
    Ok(Json(
        state
            .db(move |conn| subscription::change_plan(conn, &caller, &body.plan))
            .await?,
    ))
}

pub async fn cancel(AxumState(state): AppState, Auth(caller): Auth) -> Result<Json<Subscription>, AppError> {
    Ok(Json(state.db(move |conn| subscription::cancel(conn, &caller)).await?))
}

#[derive(Deserialize)]
pub struct PriceQuery {
    plan: String,
    properties: Option<i64>,
}

/// Quote from the cached catalog. Without `properties`, prices the caller's current count.
pub async fn calculate_price(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiQuery(q): ApiQuery<PriceQuery>,
) -> Result<Json<PriceQuote>, AppError> {
    let code = q.plan.trim().to_lowercase();
    let plan = state
        .plans
        .get(&code)
        .ok_or_else(|| PortfolioError::invalid("plan", format!("unknown plan '{code}'")))?;
    let count = match q.properties {
        Some(n) => n,
        None => {
            state
                .db(move |conn| Ok(subscription::property_count(conn, caller.id)?))
                .await?
        }
    };
    Ok(Json(subscription::quote_for(&plan, count)))
}

/// Processor callback. Verifies the signature over the raw body before decoding it.
pub async fn webhook(
    AxumState(state): AppState,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<EventOutcome>, AppError> {
    let Some(secret) = &state.config.webhook_secret else {
        return Err(AppError::WebhookDisabled);
    };
    let header = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if let Err(e) = webhook::verify(
        secret.expose_secret().as_bytes(),
        header,
        &body,
        Utc::now().timestamp(),
        state.config.webhook_tolerance,
    ) {
        warn!(error = %e, "rejected webhook");
        return Err(e.into());
    }

    let event = billing::parse_event(&body)?;
    let outcome = state.db(move |conn| billing::apply_event(conn, &event)).await?;
    Ok(Json(outcome))
}
