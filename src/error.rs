//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the error type of the query surface and the
//! persistence collaborator. Each variant maps to a specific HTTP status
//! code and structured JSON error response. Stream-side refusals are not
//! errors; see [`crate::domain::Rejection`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::IdentityError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "tenant not found: pyme_demo"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                 |
/// |-----------|-----------------|-----------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request             |
/// | 2000–2999 | Not Found       | 404 Not Found               |
/// | 3000–3999 | Server          | 500 / 503                   |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No state is held for the given tenant.
    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    /// No state is held for the given unit.
    #[error("unit not found: {tenant_id}/{unit_id}")]
    UnitNotFound {
        /// Tenant that was queried.
        tenant_id: String,
        /// Unit that was queried.
        unit_id: String,
    },

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// The durable store is not configured in this process.
    #[error("persistence is disabled")]
    PersistenceDisabled,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::TenantNotFound(_) => 2001,
            Self::UnitNotFound { .. } => 2002,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::PersistenceDisabled => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::TenantNotFound(_) | Self::UnitNotFound { .. } => StatusCode::NOT_FOUND,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PersistenceDisabled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<IdentityError> for GatewayError {
    fn from(err: IdentityError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_statuses() {
        let err = GatewayError::TenantNotFound("t1".to_string());
        assert_eq!(err.error_code(), 2001);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = GatewayError::PersistenceDisabled;
        assert_eq!(err.error_code(), 3002);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn unit_not_found_message() {
        let err = GatewayError::UnitNotFound {
            tenant_id: "t1".to_string(),
            unit_id: "u9".to_string(),
        };
        assert_eq!(err.to_string(), "unit not found: t1/u9");
    }

    #[test]
    fn blank_identity_is_invalid_request() {
        let err = GatewayError::from(IdentityError::EmptyTenant);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn into_response_sets_status() {
        let response = GatewayError::InvalidRequest("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
