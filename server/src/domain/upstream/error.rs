//! Upstream error types

use std::fmt;

use thiserror::Error;

/// Which upstream call produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamStage {
    Geocode,
    Forecast,
    Proxy,
}

impl fmt::Display for UpstreamStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Geocode => write!(f, "geocoding"),
            Self::Forecast => write!(f, "forecast"),
            Self::Proxy => write!(f, "proxy target"),
        }
    }
}

#[derive(Error, Debug)]
pub enum UpstreamError {
    /// Non-2xx response
    #[error("Upstream {stage} returned HTTP {status}")]
    Status { stage: UpstreamStage, status: u16 },

    /// Connection failure, timeout or broken body
    #[error("Upstream {stage} request failed: {message}")]
    Transport {
        stage: UpstreamStage,
        message: String,
    },

    /// Geocoding returned no match for the city
    #[error("City '{0}' not found")]
    NotFound(String),

    /// 2xx response whose payload does not have the expected shape
    #[error("Upstream {stage} returned an unexpected payload: {message}")]
    Decode {
        stage: UpstreamStage,
        message: String,
    },
}

impl UpstreamError {
    /// Classify a reqwest failure for the given stage
    pub fn from_reqwest(stage: UpstreamStage, err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode {
                stage,
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::Status {
                stage,
                status: status.as_u16(),
            }
        } else {
            Self::Transport {
                stage,
                message: err.to_string(),
            }
        }
    }

    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Status { .. } | Self::Transport { .. })
    }
}
