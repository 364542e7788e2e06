use std::sync::Arc;

use axum::{Json, extract::State as AxumState};
use portfolio::models::Receipt;
use portfolio::receipts;

use crate::{auth::Auth, error::AppError, extract::ApiPath, state::State};

type AppState = AxumState<Arc<State>>;

pub async fn list(AxumState(state): AppState, Auth(caller): Auth) -> Result<Json<Vec<Receipt>>, AppError> {
    Ok(Json(state.db(move |conn| receipts::list(conn, &caller)).await?))
}

pub async fn get(
    AxumState(state): AppState,
    Auth(caller): Auth,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Receipt>, AppError> {
    Ok(Json(state.db(move |conn| receipts::get(conn, &caller, id)).await?))
}
