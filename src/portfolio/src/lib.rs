//! Property portfolio domain: storage, calculators and transactional services.
//!
//! Services take a `&mut SqliteConnection` and a [`users::Caller`]; the HTTP server and
//! the `portfolio` CLI are thin layers over them.

#![deny(missing_docs)]

pub mod billing;
pub mod db;
pub mod error;
pub mod maintenance;
pub mod models;
pub mod money;
pub mod plans;
pub mod pricing;
pub mod property;
pub mod receipts;
#[allow(missing_docs)]
pub mod schema;
pub mod subscription;
pub mod types;
pub mod tz;
pub mod users;
pub mod valuation;

pub use error::{FieldError, PortfolioError, PortfolioResult};
