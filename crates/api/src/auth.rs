//! Token authentication extractor.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use domain::DomainError;
use store::{Store, User};

use crate::error::ApiError;
use crate::routes::AppState;

/// The user resolved from the request's `Authorization` header.
///
/// Accepts `Token <token>` and `Bearer <token>`.
pub struct CurrentUser(pub User);

impl<S: Store> FromRequestParts<Arc<AppState<S>>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| unauthenticated("Authentication credentials were not provided"))?;

        let token = bearer_token(header).ok_or_else(|| unauthenticated("Invalid token header"))?;

        let user = state
            .identity
            .authenticate(token)
            .await
            .map_err(DomainError::from)?
            .ok_or_else(|| unauthenticated("Invalid token"))?;

        Ok(CurrentUser(user))
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    let known = scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer");
    (known && !token.is_empty()).then_some(token)
}

fn unauthenticated(detail: &str) -> ApiError {
    ApiError::Domain(DomainError::Unauthenticated(detail.to_string()))
}
