use std::sync::Arc;

use axum::{Json, extract::State as AxumState, http::StatusCode};
use portfolio::models::{Property, Valuation};
use portfolio::property::{self, PropertyInput, ValuationInput};

use crate::{
    auth::Auth,
    error::AppError,
    extract::{ApiJson, ApiPath},
    state::State,
};

type AppState = AxumState<Arc<State>>;

pub async fn list(AxumState(state): AppState, Auth(caller): Auth) -> Result<Json<Vec<Property>>, AppError> {
    Ok(Json(state.db(move |conn| property::list(conn, &caller)).await?))
}

pub async fn create(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiJson(input): ApiJson<PropertyInput>,
) -> Result<(StatusCode, Json<Property>), AppError> {
    let p = state.db(move |conn| property::create(conn, &caller, &input)).await?;
    Ok((StatusCode::CREATED, Json(p)))
}

pub async fn get(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Property>, AppError> {
    Ok(Json(state.db(move |conn| property::get(conn, &caller, id)).await?))
}

pub async fn update(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiPath(id): ApiPath<i32>,
    ApiJson(input): ApiJson<PropertyInput>,
) -> Result<Json<Property>, AppError> {
    Ok(Json(state.db(move |conn| property::update(conn, &caller, id, &input)).await?))
}

pub async fn delete(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, AppError> {
    state.db(move |conn| property::delete(conn, &caller, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn valuations(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Vec<Valuation>>, AppError> {
    Ok(Json(state.db(move |conn| property::valuations(conn, &caller, id)).await?))
}

pub async fn add_valuation(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiPath(id): ApiPath<i32>,
    ApiJson(input): ApiJson<ValuationInput>,
) -> Result<(StatusCode, Json<Valuation>), AppError> {
    let v = state
        .db(move |conn| property::add_valuation(conn, &caller, id, &input))
        .await?;
    Ok((StatusCode::CREATED, Json(v)))
}
