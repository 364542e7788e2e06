use std::sync::Arc;

use axum::{Json, extract::State as AxumState, http::StatusCode};
use portfolio::maintenance::{self, MaintenanceFilter, MaintenanceInput, MaintenanceOutcome};
use portfolio::models::MaintenanceRecord;

use crate::{
    auth::Auth,
    error::AppError,
    extract::{ApiJson, ApiPath, ApiQuery},
    state::State,
};

type AppState = AxumState<Arc<State>>;

pub async fn list(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiQuery(filter): ApiQuery<MaintenanceFilter>,
) -> Result<Json<Vec<MaintenanceRecord>>, AppError> {
    Ok(Json(state.db(move |conn| maintenance::list(conn, &caller, filter)).await?))
}

/// Responds with the record and, when the cost crossed the threshold, the automated
/// valuation it produced.
pub async fn create(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiJson(input): ApiJson<MaintenanceInput>,
) -> Result<(StatusCode, Json<MaintenanceOutcome>), AppError> {
    let out = state.db(move |conn| maintenance::create(conn, &caller, &input)).await?;
    Ok((StatusCode::CREATED, Json(out)))
}

pub async fn get(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<MaintenanceRecord>, AppError> {
    Ok(Json(state.db(move |conn| maintenance::get(conn, &caller, id)).await?))
}

pub async fn update(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiPath(id): ApiPath<i32>,
    ApiJson(input): ApiJson<MaintenanceInput>,
) -> Result<Json<MaintenanceOutcome>, AppError> {
    Ok(Json(
        state
            .db(move |conn| maintenance::update(conn, &caller, id, &input))
            .await?,
    ))
}

pub async fn delete(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, AppError> {
    state.db(move |conn| maintenance::delete(conn, &caller, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
