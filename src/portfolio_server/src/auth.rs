//! Bearer-token authentication.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use portfolio::PortfolioError;
use portfolio::users::{self, Caller};

use crate::{error::AppError, state::State};

/// The authenticated caller. Extracting it rejects the request with 401 when the
/// `Authorization: Bearer <token>` header is missing or unknown.
#[derive(Debug, Clone, Copy)]
pub struct Auth(pub Caller);

fn bearer(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

#[async_trait]
impl FromRequestParts<Arc<State>> for Auth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<State>) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or(PortfolioError::Unauthorized)?;
        let caller = state
            .db(move |conn| {
                let user = users::authenticate(conn, &token)?;
                Caller::try_from(&user)
            })
            .await?;
        Ok(Auth(caller))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut b = Request::builder().uri("/");
        if let Some(h) = header {
            b = b.header(AUTHORIZATION, h);
        }
        b.body(()).unwrap().into_parts().0
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer(&parts(Some("Bearer abc123"))).as_deref(), Some("abc123"));
        assert_eq!(bearer(&parts(Some("bearer   abc123 "))).as_deref(), Some("abc123"));
        assert_eq!(bearer(&parts(Some("Basic abc123"))), None);
        assert_eq!(bearer(&parts(Some("Bearer "))), None);
        assert_eq!(bearer(&parts(None)), None);
    }
}
