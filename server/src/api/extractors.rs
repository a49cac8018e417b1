//! Request extractors that reject with the JSON `ApiError` shape

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use super::types::ApiError;

/// Query extractor whose parse failures render as `ApiError`
///
/// Plain `Query` answers with a text/plain 400.
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                ApiError::bad_request("QUERY_PARSE_ERROR", rejection.body_text())
            })?;
        Ok(Self(value))
    }
}
