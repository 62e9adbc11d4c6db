//! Custom Axum extractors

use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use super::error::ApiError;

/// Extract a user id from the path.
///
/// An id that is not a positive integer cannot name a stored user, so it is
/// rejected as not found.
pub struct UserId(pub u64);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::user_not_found(""))?;

        let id = raw
            .parse::<u64>()
            .map_err(|_| ApiError::user_not_found(raw.clone()))?;

        Ok(Self(id))
    }
}

/// JSON body whose rejections render as [`ApiError`] instead of plain text.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest {
                message: rejection.body_text(),
            })?;

        Ok(Self(value))
    }
}
