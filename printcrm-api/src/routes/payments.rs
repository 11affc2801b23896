/// Payment endpoints
///
/// - `GET /v1/payments?status=` - newest first, optional status filter
/// - `POST /v1/payments` - the order must belong to the caller
/// - `PATCH /v1/payments/:id`
/// - `DELETE /v1/payments/:id`

use super::{not_found, require_non_negative};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use printcrm_shared::{
    identity::Identity,
    models::payment::{CreatePayment, Payment, PaymentStatus, UpdatePayment},
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct PaymentListQuery {
    pub status: Option<String>,
}

pub async fn list_payments(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<PaymentListQuery>,
) -> ApiResult<Json<Vec<Payment>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<PaymentStatus>)
        .transpose()
        .map_err(|e| ApiError::invalid_field("status", e.to_string()))?;

    Ok(Json(Payment::list_for_user(&state.db, identity.user_id, status).await?))
}

pub async fn create_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreatePayment>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    if req.amount_cents <= 0 {
        return Err(ApiError::invalid_field("amount_cents", "Amount must be positive"));
    }

    let payment = Payment::create(&state.db, identity.user_id, req)
        .await?
        .ok_or_else(|| not_found("Order"))?;

    tracing::debug!(
        user_id = %identity.user_id,
        payment_id = %payment.id,
        amount_cents = payment.amount_cents,
        "Payment recorded"
    );

    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn update_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePayment>,
) -> ApiResult<Json<Payment>> {
    if let Some(amount) = req.amount_cents {
        require_non_negative("amount_cents", amount)?;
    }

    Payment::update(&state.db, id, identity.user_id, req)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Payment"))
}

pub async fn delete_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Payment::delete(&state.db, id, identity.user_id).await? {
        return Err(not_found("Payment"));
    }
    Ok(StatusCode::NO_CONTENT)
}
