//! Errors reported by the HTTP API

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::model::{auth, history, users};

/// Header missing, malformed, or not using the bearer scheme
pub const MISSING_AUTHORIZATION: &str = "Missing or invalid authorization header";
/// Token was presented, but not accepted
pub const INVALID_TOKEN: &str = "Invalid token";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Request shape or values are invalid
    #[error("{0}")]
    Validation(String),
    /// Resource with the same identity already exists
    #[error("{0}")]
    Conflict(String),
    /// Missing, invalid, expired credentials
    #[error("{0}")]
    Unauthorized(&'static str),
    /// Backing store failed
    #[error("Storage failure: {0}")]
    Storage(String),
    /// Anything unexpected
    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        HttpResponse::build(status).json(ErrorBody {
            detail: self.to_string(),
        })
    }
}

impl From<auth::Error> for ApiError {
    fn from(err: auth::Error) -> Self {
        use auth::Error::*;

        match err {
            EmailTaken => Self::Conflict(err.to_string()),
            InvalidCredentials => Self::Unauthorized("Invalid credentials"),
            MissingCredentials => Self::Validation(err.to_string()),
            Storage(_) => Self::Storage(err.to_string()),
            Hashing(_) | Token(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<users::Error> for ApiError {
    fn from(err: users::Error) -> Self {
        auth::Error::from(err).into()
    }
}

impl From<history::Error> for ApiError {
    fn from(err: history::Error) -> Self {
        match err {
            history::Error::Storage(_) => Self::Storage(err.to_string()),
            history::Error::Serialization(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<itinerary::Error> for ApiError {
    fn from(err: itinerary::Error) -> Self {
        match err {
            itinerary::Error::InvalidDate(_) => {
                Self::Validation(format!("Invalid date range: {err}"))
            }
            itinerary::Error::InvalidDateRange { .. } => Self::Validation(err.to_string()),
        }
    }
}
