/// Error handling for the API server
///
/// Every handler returns `Result<T, ApiError>`; the error renders as a JSON
/// body of the form
///
/// ```json
/// { "error": "User not authenticated", "code": "unauthorized" }
/// ```
///
/// Internal details are logged, never sent to the client.
///
/// # Example
///
/// ```
/// use printcrm_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler(found: bool) -> ApiResult<Json<serde_json::Value>> {
///     if !found {
///         return Err(ApiError::NotFound("Customer not found".to_string()));
///     }
///     Ok(Json(json!({ "ok": true })))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use printcrm_shared::account::deletion::DeletionError;
use printcrm_shared::auth::jwt::JwtError;
use printcrm_shared::auth::password::PasswordError;
use printcrm_shared::identity::{IdentityError, UNAUTHENTICATED_MESSAGE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Public message for an identity removal that did not go through
pub const DELETE_FAILED_MESSAGE: &str = "Failed to delete user account";

const INTERNAL_MESSAGE: &str = "Internal server error";

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Not found (404), also used for records owned by someone else
    NotFound(String),

    /// Conflict (409) - duplicate email, dependent records, deletion in flight
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal failure (500) with a fixed public message
    ///
    /// The first field goes to the client, the second only to the log.
    OperationFailed(&'static str, String),

    /// Internal server error (500), details are logged only
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,

    /// Machine-readable code (e.g. "unauthorized", "conflict")
    pub code: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// The 401 every unauthenticated request receives
    pub fn unauthenticated() -> Self {
        ApiError::Unauthorized(UNAUTHENTICATED_MESSAGE.to_string())
    }

    /// Single-field validation failure
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.to_string(),
            message: message.into(),
        }])
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::OperationFailed(..) | ApiError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::OperationFailed(public, detail) => write!(f, "{}: {}", public, detail),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (code, message, details) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::OperationFailed(public, detail) => {
                tracing::error!(error = %detail, "{}", public);
                ("operation_failed", public.to_string(), None)
            }
            ApiError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ("internal_error", INTERNAL_MESSAGE.to_string(), None)
            }
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg, None),
        };

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // foreign_key_violation: the row still has dependents, or
                // references a row that is gone
                Some("23503") => ApiError::Conflict(
                    "Record is still referenced by other records".to_string(),
                ),
                // unique_violation
                Some("23505") => {
                    if db_err.constraint().is_some_and(|c| c.contains("email")) {
                        ApiError::Conflict("Email already exists".to_string())
                    } else {
                        ApiError::Conflict("Record already exists".to_string())
                    }
                }
                // check_violation
                Some("23514") => check_violation(db_err.constraint()),
                _ => ApiError::InternalError(format!("Database error: {}", db_err)),
            },
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Maps a violated CHECK constraint to the field it guards
fn check_violation(constraint: Option<&str>) -> ApiError {
    match constraint {
        Some("orders_advance_within_total") => ApiError::invalid_field(
            "advance_paid_cents",
            "Advance cannot exceed the order total",
        ),
        Some(name) => ApiError::invalid_field(name, "Value is not allowed"),
        None => ApiError::BadRequest("Value is not allowed".to_string()),
    }
}

/// Convert identity errors to API errors
impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Unauthenticated(_) | IdentityError::NotFound => {
                ApiError::unauthenticated()
            }
            IdentityError::Backend(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Convert deletion errors to API errors
impl From<DeletionError> for ApiError {
    fn from(err: DeletionError) -> Self {
        match err {
            DeletionError::AlreadyInProgress => {
                ApiError::Conflict("Account deletion already in progress".to_string())
            }
            err @ DeletionError::TerminalFailure { .. } | err @ DeletionError::Halted { .. } => {
                ApiError::OperationFailed(DELETE_FAILED_MESSAGE, err.to_string())
            }
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

/// Convert `validator` failures to a 422 with per-field details
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(details)
    }
}
