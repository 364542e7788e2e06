//! Error type shared by services and repositories.

use serde::Serialize;

use crate::money::{Cents, MAX_AMOUNT, format_cents, in_range};

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name as it appears in the JSON payload.
    pub field: String,
    /// Human-readable reason.
    pub message: String,
}

/// Errors surfaced by portfolio operations.
///
/// The calculators in [`crate::valuation`] and [`crate::pricing`] are total and never
/// produce these; everything that touches storage or checks access can.
#[derive(Debug, thiserror::Error)]
pub enum PortfolioError {
    /// The referenced row does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity name, e.g. "property".
        entity: &'static str,
        /// Lookup key.
        id: String,
    },

    /// Caller is not authenticated, or does not own the resource and is not an admin.
    #[error("unauthorized")]
    Unauthorized,

    /// One or more input fields were missing or malformed.
    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    /// Storage failure.
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Anything else (serialization, connection setup).
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn summarize(errs: &[FieldError]) -> String {
    errs.iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl PortfolioError {
    /// Shorthand for [`PortfolioError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// A validation failure on a single field.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError {
            field: field.to_string(),
            message: message.into(),
        }])
    }
}

/// Result alias for service operations.
pub type PortfolioResult<T> = Result<T, PortfolioError>;

/// Accumulates field errors so a payload reports every problem at once.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    /// Empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem with `field`.
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Record `message` unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) {
        if !ok {
            self.push(field, message);
        }
    }

    /// Record a problem unless `value` is absent or a storable amount.
    pub fn amount(&mut self, field: &str, value: Option<Cents>) {
        match value {
            Some(v) if v < 0 => self.push(field, "must not be negative"),
            Some(v) if !in_range(v) => {
                self.push(field, format!("must be at most {}", format_cents(MAX_AMOUNT)))
            }
            _ => {}
        }
    }

    /// `Ok(())` when nothing was recorded.
    pub fn finish(self) -> PortfolioResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(PortfolioError::Validation(self.0))
        }
    }
}
