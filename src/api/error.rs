use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("not found")]
    NotFound,

    #[error("session expired or missing")]
    Unauthorized,

    #[error("not allowed")]
    Forbidden,

    #[error("HTTP {0}")]
    Status(u16),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::NOT_FOUND => ApiError::NotFound,
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::FORBIDDEN => ApiError::Forbidden,
            other => ApiError::Status(other.as_u16()),
        }
    }
}
