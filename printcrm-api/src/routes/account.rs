/// Account data export and account deletion
///
/// # Endpoints
///
/// - `GET /v1/auth/export-data` - everything the caller owns as a JSON download
/// - `DELETE /v1/auth/delete-account` - irreversible removal of the caller
///   and all their records
///
/// Both run behind identity resolution; an unauthenticated caller gets 401
/// and nothing is read or deleted.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Extension, Json,
};
use printcrm_shared::{
    account::{deletion::StepReport, export_account, export_filename},
    identity::Identity,
};
use serde::Serialize;

/// `complete` or `partial`, set on every export download
pub const EXPORT_STATUS_HEADER: &str = "x-export-status";

pub const ACCOUNT_DELETED_MESSAGE: &str =
    "Account and all associated data have been permanently deleted";

/// Successful deletion body
#[derive(Debug, Serialize)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub message: &'static str,

    /// Every cascade step in execution order; a `failed` step means some
    /// records could not be removed even though the identity is gone
    pub steps: Vec<StepReport>,
}

/// Exports the caller's data as a pretty-printed JSON attachment
///
/// ```text
/// GET /v1/auth/export-data
///
/// 200 OK
/// Content-Type: application/json
/// Content-Disposition: attachment; filename="printcrm-data-export-2024-06-12.json"
/// X-Export-Status: complete
/// ```
///
/// Sections whose read failed are returned empty and listed in
/// `export_info.incomplete_sections`; the response is still 200 with
/// `X-Export-Status: partial`.
pub async fn export_data(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Response> {
    let export = export_account(state.store.as_ref(), &identity).await;

    let body = export
        .to_pretty_json()
        .map_err(|e| ApiError::InternalError(format!("Failed to serialize export: {}", e)))?;

    let filename = export_filename(
        &state.config.account.export_filename_prefix,
        export.export_info.exported_at.date_naive(),
    );
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|e| ApiError::InternalError(format!("Invalid export filename: {}", e)))?;

    let status = if export.is_complete() { "complete" } else { "partial" };

    tracing::info!(
        user_id = %identity.user_id,
        records = export.export_info.total_records.total(),
        status,
        "Account data exported"
    );

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
            (
                HeaderName::from_static(EXPORT_STATUS_HEADER),
                HeaderValue::from_static(status),
            ),
        ],
        body,
    )
        .into_response())
}

/// Deletes the caller's account and everything it owns
///
/// ```text
/// DELETE /v1/auth/delete-account
///
/// 200 OK
/// { "success": true, "message": "Account and all associated data have been permanently deleted", "steps": [...] }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: no authenticated identity
/// - `409 Conflict`: a deletion for this account is already running
/// - `500 Internal Server Error`: the identity could not be removed, or the
///   cascade was halted before reaching it
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<DeleteAccountResponse>> {
    let report = state.deleter.delete_account(&identity).await?;

    if !report.is_clean() {
        tracing::warn!(
            user_id = %identity.user_id,
            failed_steps = ?report.failed_steps(),
            "Account deleted with failed steps"
        );
    }

    Ok(Json(DeleteAccountResponse {
        success: true,
        message: ACCOUNT_DELETED_MESSAGE,
        steps: report.steps,
    }))
}
