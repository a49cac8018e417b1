//! Shared API types
//!
//! Every terminal failure leaves the API as `ApiError`, rendered as
//! `{"error": <kind>, "code": <CODE>, "message": <text>}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::domain::gateway::GatewayError;
use crate::domain::upstream::UpstreamError;

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: String, message: String },
    NotFound { code: String, message: String },
    /// Upstream answered with a failing status, which is passed on
    Upstream { status: StatusCode, message: String },
    BadGateway { message: String },
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::BadGateway {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Upstream { status, .. } => *status,
            Self::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Validation(message) => Self::bad_request("INVALID_PARAMETER", message),
            GatewayError::NotFound(message) => Self::not_found("NOT_FOUND", message),
            GatewayError::Upstream(e) => match e {
                UpstreamError::Status { status, .. } => match StatusCode::from_u16(status) {
                    Ok(status) => Self::Upstream {
                        status,
                        message: e.to_string(),
                    },
                    Err(_) => Self::bad_gateway(e.to_string()),
                },
                UpstreamError::Transport { .. } => Self::bad_gateway(e.to_string()),
                UpstreamError::NotFound(_) => Self::not_found("NOT_FOUND", e.to_string()),
                UpstreamError::Decode { .. } => {
                    tracing::error!(error = %e, "Unexpected upstream payload");
                    Self::internal(e.to_string())
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_type, code, message) = match self {
            Self::BadRequest { code, message } => ("bad_request", code, message),
            Self::NotFound { code, message } => ("not_found", code, message),
            Self::Upstream { message, .. } => {
                ("upstream_error", "UPSTREAM_ERROR".to_string(), message)
            }
            Self::BadGateway { message } => ("bad_gateway", "BAD_GATEWAY".to_string(), message),
            Self::Internal { message } => ("internal_error", "INTERNAL".to_string(), message),
        };
        (
            status,
            Json(serde_json::json!({
                "error": error_type,
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::upstream::UpstreamStage;

    fn status_of(err: GatewayError) -> StatusCode {
        ApiError::from(err).status()
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            status_of(GatewayError::Validation("city required".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(GatewayError::NotFound("City 'X' not found".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(GatewayError::Upstream(UpstreamError::Status {
                stage: UpstreamStage::Forecast,
                status: 503
            })),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(GatewayError::Upstream(UpstreamError::Transport {
                stage: UpstreamStage::Proxy,
                message: "connection refused".into()
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(GatewayError::Upstream(UpstreamError::Decode {
                stage: UpstreamStage::Geocode,
                message: "expected value".into()
            })),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let resp = ApiError::not_found("NOT_FOUND", "City 'X' not found").into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "error": "not_found",
                "code": "NOT_FOUND",
                "message": "City 'X' not found"
            })
        );
    }
}
