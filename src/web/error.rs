//! Wire-facing error type: maps [`crate::error::Error`] variants to the HTTP
//! status codes and JSON body the API surface promises (spec §7). Grounded
//! on the teacher's `ApiError`/`ApiErrorCode` split in `web/error.rs`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::Error;

/// Machine-readable error code for API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    InvalidArgument,
    NotFound,
    Conflict,
    Internal,
    Unauthenticated,
}

/// Standardized error response for all API endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self.code {
            ApiErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::Conflict => StatusCode::CONFLICT,
            ApiErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidArgument(_) => ApiErrorCode::InvalidArgument,
            Error::NotFound(_) => ApiErrorCode::NotFound,
            Error::Conflict(_) => ApiErrorCode::Conflict,
            Error::Unauthenticated => ApiErrorCode::Unauthenticated,
            Error::Internal(_) => ApiErrorCode::Internal,
        };
        if matches!(code, ApiErrorCode::Internal) {
            tracing::error!(error = %err, "internal error");
        }
        Self { code, message: err.to_string() }
    }
}
