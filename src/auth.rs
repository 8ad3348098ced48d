//! Identity gate capability.
//!
//! Token verification happens upstream; the gateway injects the resolved user
//! id as an `x-user-id` header. This extractor is the only place the rest of
//! the service learns who is calling.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{errors::AppError, models::UserId};

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, resolved by the upstream identity gate.
#[derive(Clone, Copy, Debug)]
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<UserId>().ok())
            .map(CurrentUser)
            .ok_or_else(|| AppError::unauthorized("missing or invalid user identity"))
    }
}
