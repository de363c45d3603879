//! HTTP-facing error mapping
//!
//! Handler failures are converted to plain-text responses here so the
//! handlers can use `?` on auth results.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors returned by the OAuth and token endpoints.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] streamlabs_auth::Error),

    #[error("no token")]
    NoToken,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(streamlabs_auth::Error::MissingCode) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NoToken => StatusCode::NOT_FOUND,
        }
    }

    /// Client-facing message. Upstream payloads stay in the logs.
    fn message(&self) -> &'static str {
        match self {
            ApiError::Auth(streamlabs_auth::Error::MissingCode) => "Missing authorization code",
            ApiError::Auth(_) => "Token exchange failed",
            ApiError::NoToken => "No token",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.message()).into_response()
    }
}
