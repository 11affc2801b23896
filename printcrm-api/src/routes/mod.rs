/// API route handlers
///
/// - `health`: liveness and database connectivity
/// - `auth`: registration, login, sessions and profile
/// - `account`: data export and account deletion
/// - `customers`, `orders`, `quotations`, `payments`, `leads`, `job_cards`:
///   ownership-scoped CRUD
/// - `reports`: dashboard summary

pub mod account;
pub mod auth;
pub mod customers;
pub mod health;
pub mod job_cards;
pub mod leads;
pub mod orders;
pub mod payments;
pub mod quotations;
pub mod reports;

use crate::error::ApiError;

/// 404 for a record that is missing or owned by someone else
pub(crate) fn not_found(resource: &str) -> ApiError {
    ApiError::NotFound(format!("{} not found", resource))
}

/// Rejects blank required text
pub(crate) fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::invalid_field(field, format!("{} is required", field)));
    }
    Ok(())
}

/// Rejects negative money amounts
pub(crate) fn require_non_negative(field: &str, cents: i64) -> Result<(), ApiError> {
    if cents < 0 {
        return Err(ApiError::invalid_field(field, "Amount must not be negative"));
    }
    Ok(())
}
