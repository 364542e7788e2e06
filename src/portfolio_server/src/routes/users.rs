use std::sync::Arc;

use axum::{Json, extract::State as AxumState, http::StatusCode};
use portfolio::models::User;
use portfolio::types::Role;
use portfolio::users::{self, NewUserInput};
use serde::{Deserialize, Serialize};

use crate::{
    auth::Auth,
    error::AppError,
    extract::{ApiJson, ApiPath},
    state::State,
};

type AppState = AxumState<Arc<State>>;

#[derive(Serialize)]
pub struct Registered {
    user: User,
    /// Shown once; only its digest is stored.
    token: String,
}

pub async fn register(
    AxumState(state): AppState,
    ApiJson(input): ApiJson<NewUserInput>,
) -> Result<(StatusCode, Json<Registered>), AppError> {
    let (user, token) = state.db(move |conn| users::create(conn, &input, false)).await?;
    Ok((StatusCode::CREATED, Json(Registered { user, token })))
}

pub async fn me(AxumState(state): AppState, Auth(caller): Auth) -> Result<Json<User>, AppError> {
    Ok(Json(state.db(move |conn| users::get(conn, caller.id)).await?))
}

pub async fn list(AxumState(state): AppState, Auth(caller): Auth) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.db(move |conn| users::list(conn, &caller)).await?))
}

#[derive(Deserialize)]
pub struct SetRole {
    role: Role,
}

pub async fn set_role(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiPath(id): ApiPath<i32>,
    ApiJson(body): ApiJson<SetRole>,
) -> Result<Json<User>, AppError> {
    Ok(Json(
        state
            .db(move |conn| users::set_role(conn, &caller, id, body.role))
            .await?,
    ))
}

pub async fn delete(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, AppError> {
    state.db(move |conn| users::delete(conn, &caller, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
