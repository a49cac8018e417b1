//! Gateway error types

use thiserror::Error;

use crate::domain::upstream::UpstreamError;

/// Terminal failure of a gateway request
///
/// Cache failures never appear here; they are absorbed as misses.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Missing or blank required parameter
    #[error("{0}")]
    Validation(String),

    /// The requested resource does not exist upstream
    #[error("{0}")]
    NotFound(String),

    /// Upstream failure that survived any retries
    #[error(transparent)]
    Upstream(UpstreamError),
}

impl From<UpstreamError> for GatewayError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::NotFound(_) => Self::NotFound(err.to_string()),
            other => Self::Upstream(other),
        }
    }
}
