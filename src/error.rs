/// Unified error types for Repair Desk
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to hand a one-time code to the mail transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// SMTP server rejected our credentials
    #[error("SMTP authentication failed: {0}")]
    Authentication(String),

    /// Connection, TLS or protocol level failure
    #[error("SMTP transport error: {0}")]
    Transport(String),

    /// Host, credentials or sender address missing from configuration
    #[error("Email settings are incomplete: {0}")]
    Misconfigured(String),

    /// Destination or sender address could not be parsed
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Main error type for the desk
#[derive(Error, Debug)]
pub enum DeskError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Expiring store errors (Redis or in-process)
    #[error("Cache error: {0}")]
    Cache(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown identifier or record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness violation (identifier or display name already taken)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The code could not be delivered; it has already been invalidated
    #[error("Delivery failed: {0}")]
    DeliveryFailed(#[from] DeliveryError),

    /// Verify called without a prior start on this connection
    #[error("No pending challenge, please start again")]
    NoPendingChallenge,

    /// Code TTL elapsed or the code was never issued
    #[error("Code expired or already used, request a new one")]
    Expired,

    /// Submitted code did not match; the code is burned
    #[error("Invalid code, request a new one")]
    InvalidCode,

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(String),
}

impl From<redis::RedisError> for DeskError {
    fn from(e: redis::RedisError) -> Self {
        DeskError::Cache(e.to_string())
    }
}

impl From<validator::ValidationErrors> for DeskError {
    fn from(e: validator::ValidationErrors) -> Self {
        DeskError::Validation(e.to_string())
    }
}

impl DeskError {
    /// Stable machine-readable error code used in response bodies
    pub fn code(&self) -> &'static str {
        match self {
            DeskError::Authentication(_) => "AuthenticationRequired",
            DeskError::Authorization(_) => "Forbidden",
            DeskError::Validation(_) => "InvalidRequest",
            DeskError::NotFound(_) => "NotFound",
            DeskError::Conflict(_) => "Conflict",
            DeskError::DeliveryFailed(_) => "DeliveryFailed",
            DeskError::NoPendingChallenge => "NoPendingChallenge",
            DeskError::Expired => "Expired",
            DeskError::InvalidCode => "InvalidCode",
            DeskError::RateLimitExceeded { .. } => "RateLimitExceeded",
            _ => "InternalServerError",
        }
    }
}

/// JSON error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert DeskError to HTTP response
impl IntoResponse for DeskError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            DeskError::Authentication(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            // Denials never say which role would have been enough
            DeskError::Authorization(_) => {
                (StatusCode::FORBIDDEN, "Access denied".to_string())
            }
            DeskError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            DeskError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            DeskError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            DeskError::DeliveryFailed(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            DeskError::NoPendingChallenge | DeskError::Expired | DeskError::InvalidCode => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            DeskError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
            ),
            DeskError::Database(_)
            | DeskError::Cache(_)
            | DeskError::Internal(_)
            | DeskError::Io(_)
            | DeskError::Jwt(_) => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(), // Don't leak details
                )
            }
        };

        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for desk operations
pub type DeskResult<T> = Result<T, DeskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_errors_are_client_errors() {
        for err in [
            DeskError::NoPendingChallenge,
            DeskError::Expired,
            DeskError::InvalidCode,
        ] {
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_delivery_failure_status() {
        let err: DeskError = DeliveryError::Misconfigured("missing host".to_string()).into();
        assert_eq!(err.code(), "DeliveryFailed");
        assert!(err.to_string().contains("missing host"));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_internal_errors_map_to_500() {
        let err = DeskError::Cache("connection refused".to_string());
        assert_eq!(err.code(), "InternalServerError");
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_conflict_and_forbidden() {
        assert_eq!(
            DeskError::Conflict("taken".into()).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            DeskError::Authorization("engineer".into())
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
    }
}
