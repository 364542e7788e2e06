use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::State;

pub mod maintenance;
pub mod properties;
pub mod receipts;
pub mod subscriptions;
pub mod users;

async fn health() -> &'static str {
    "ok"
}

pub fn api() -> Router<Arc<State>> {
    Router::new()
        .route("/health", get(health))
        .route("/api/users/register", post(users::register))
        .route("/api/users/me", get(users::me))
        .route("/api/admin/users", get(users::list))
        .route("/api/admin/users/:id", axum::routing::delete(users::delete))
        .route("/api/admin/users/:id/role", put(users::set_role))
        .route("/api/properties", get(properties::list).post(properties::create))
        .route(
            "/api/properties/:id",
            get(properties::get)
                .put(properties::update)
                .delete(properties::delete),
        )
        .route(
            "/api/properties/:id/valuations",
            get(properties::valuations).post(properties::add_valuation),
        )
        .route("/api/maintenance", get(maintenance::list).post(maintenance::create))
        .route(
            "/api/maintenance/:id",
            get(maintenance::get)
                .put(maintenance::update)
                .delete(maintenance::delete),
        )
        .route(
            "/api/subscriptions",
            post(subscriptions::subscribe).put(subscriptions::change_plan),
        )
        .route("/api/subscriptions/plans", get(subscriptions::plans))
        .route("/api/subscriptions/current", get(subscriptions::current))
        .route("/api/subscriptions/cancel", put(subscriptions::cancel))
        .route("/api/subscriptions/calculate-price", get(subscriptions::calculate_price))
        .route("/api/subscriptions/webhook", post(subscriptions::webhook))
        .route("/api/receipts", get(receipts::list))
        .route("/api/receipts/:id", get(receipts::get))
}
