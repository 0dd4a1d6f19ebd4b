use serde::Serialize;
use thiserror::Error;

/// How a failed outbound request is surfaced in its panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Parse,
}

/// Failure of one request to an external service. Terminal for that request; never retried.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{service} request failed: {detail}")]
    Request { service: &'static str, detail: String },

    #[error("{service} returned HTTP {status}")]
    Transport {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} response could not be used: {detail}")]
    Parse { service: &'static str, detail: String },
}

impl ServiceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ServiceError::Request { .. } | ServiceError::Transport { .. } => FailureKind::Transport,
            ServiceError::Parse { .. } => FailureKind::Parse,
        }
    }

    pub fn parse(service: &'static str, detail: impl std::fmt::Display) -> Self {
        ServiceError::Parse {
            service,
            detail: detail.to_string(),
        }
    }

    /// Passes a success body through; any other status becomes [`ServiceError::Transport`].
    pub fn check_status(
        service: &'static str,
        status: reqwest::StatusCode,
        body: String,
    ) -> Result<String, ServiceError> {
        if status.is_success() {
            Ok(body)
        } else {
            Err(ServiceError::Transport {
                service,
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Wraps a client error. The URL is dropped since it carries the API key.
    pub fn request(service: &'static str, err: reqwest::Error) -> Self {
        ServiceError::Request {
            service,
            detail: err.without_url().to_string(),
        }
    }
}

/// The model's free text did not contain a usable JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseParseError {
    #[error("no JSON object found in response")]
    NoJsonObject,
    #[error("embedded JSON is invalid: {0}")]
    InvalidJson(String),
    #[error("embedded JSON is not an object")]
    NotAnObject,
}
