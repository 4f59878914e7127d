use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One unsatisfiable line of a stock request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockShortage {
    #[serde(rename = "productId")]
    pub product_id: i32,

    #[serde(rename = "productName", skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,

    pub available: Decimal,

    pub required: Decimal,
}

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    // Authentication errors (401)
    #[error("Invalid or expired JWT token")]
    InvalidToken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    // Database errors (500)
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Duplicate identifier: {0}")]
    UniquenessConflict(String),

    // Validation errors (400)
    #[error("Validation error: {0}")]
    ValidationError(String),

    // Business logic errors (400/409)
    #[error("{0}")]
    LifecycleViolation(String),

    #[error("Insufficient stock for {} line item(s)", shortages.len())]
    InsufficientStock { shortages: Vec<StockShortage> },

    // Generic errors
    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Error response structure returned to API clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Error code (AUTH_*, DB_*, VALIDATION_*, BUSINESS_*)
    pub code: String,
    /// User-friendly error message
    pub message: String,
    /// Correlation ID for troubleshooting
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    /// Additional error context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    /// Convert AppError to (StatusCode, ErrorCode, Option<Details>)
    fn to_parts(&self) -> (StatusCode, String, Option<serde_json::Value>) {
        match self {
            // Authentication errors (401)
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN".to_string(),
                None,
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_CREDENTIALS".to_string(),
                None,
            ),

            // Database errors (500, 404, 408, 409)
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DB_QUERY_FAILED".to_string(),
                None,
            ),
            AppError::RecordNotFound(entity) => (
                StatusCode::NOT_FOUND,
                "DB_RECORD_NOT_FOUND".to_string(),
                Some(serde_json::json!({ "entity": entity })),
            ),
            AppError::TransactionFailed(step) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DB_TRANSACTION_FAILED".to_string(),
                Some(serde_json::json!({ "failedStep": step })),
            ),
            AppError::Timeout(operation) => (
                StatusCode::REQUEST_TIMEOUT,
                "DB_OPERATION_TIMEOUT".to_string(),
                Some(serde_json::json!({ "operation": operation })),
            ),
            AppError::UniquenessConflict(identifier) => (
                StatusCode::CONFLICT,
                "DB_UNIQUENESS_CONFLICT".to_string(),
                Some(serde_json::json!({ "identifier": identifier })),
            ),

            // Validation errors (400)
            AppError::ValidationError(_) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR".to_string(),
                None,
            ),

            // Business logic errors (400/409)
            AppError::LifecycleViolation(_) => (
                StatusCode::BAD_REQUEST,
                "BUSINESS_LIFECYCLE_VIOLATION".to_string(),
                None,
            ),
            AppError::InsufficientStock { shortages } => (
                StatusCode::CONFLICT,
                "BUSINESS_INSUFFICIENT_STOCK".to_string(),
                Some(serde_json::json!({ "shortages": shortages })),
            ),

            // Generic errors
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR".to_string(),
                None,
            ),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST".to_string(), None),
        }
    }

    /// True for errors the bounded retry layer is allowed to re-attempt:
    /// transient connection faults and identifier races resolved by remint.
    /// Everything else surfaces to the caller on first occurrence.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::UniquenessConflict(_) => true,
            AppError::DatabaseError(message) => {
                let message = message.to_lowercase();
                CONNECTION_ERROR_PATTERNS
                    .iter()
                    .any(|pattern| message.contains(pattern))
            }
            _ => false,
        }
    }
}

/// Connection-fault message fragments that indicate a dead or recycled
/// connection rather than a bad statement.
const CONNECTION_ERROR_PATTERNS: [&str; 5] = [
    "ssl connection has been closed",
    "connection already closed",
    "server closed the connection",
    "connection reset",
    "connection refused",
];

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let correlation_id = Uuid::new_v4().to_string();
        let message = self.to_string();
        let (status, code, details) = self.to_parts();

        // Log the error with correlation ID
        tracing::error!(
            correlation_id = %correlation_id,
            error_code = %code,
            error = %message,
            "Request failed"
        );

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code,
                message,
                correlation_id,
                details,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

// Conversion from common error types
impl From<tiberius::error::Error> for AppError {
    fn from(err: tiberius::error::Error) -> Self {
        // Unique constraint (2627) and unique index (2601) violations are the
        // safety net under identifier minting; the retry layer remints them.
        if let tiberius::error::Error::Server(token) = &err {
            if token.code() == 2601 || token.code() == 2627 {
                return AppError::UniquenessConflict(token.message().to_string());
            }
        }
        AppError::DatabaseError(err.to_string())
    }
}

impl From<bb8::RunError<tiberius::error::Error>> for AppError {
    fn from(err: bb8::RunError<tiberius::error::Error>) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<bb8::RunError<bb8_tiberius::Error>> for AppError {
    fn from(err: bb8::RunError<bb8_tiberius::Error>) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(_err: jsonwebtoken::errors::Error) -> Self {
        AppError::InvalidToken
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::InternalError(format!("Bcrypt error: {}", err))
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;
