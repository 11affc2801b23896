/// Quotation endpoints
///
/// The total is always the sum of the line items; clients never send it.
///
/// - `GET /v1/quotations`
/// - `POST /v1/quotations`
/// - `GET /v1/quotations/:id`
/// - `PATCH /v1/quotations/:id`
/// - `DELETE /v1/quotations/:id`

use super::{not_found, require_non_negative, require_text};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use printcrm_shared::{
    identity::Identity,
    models::quotation::{
        items_total_cents, CreateQuotation, Quotation, QuotationItem, UpdateQuotation,
    },
};
use uuid::Uuid;

fn check_items(items: &[QuotationItem]) -> ApiResult<()> {
    if items.is_empty() {
        return Err(ApiError::invalid_field("items", "At least one item is required"));
    }
    for item in items {
        require_text("items.product_type", &item.product_type)?;
        require_non_negative("items.unit_price_cents", item.unit_price_cents)?;
        if item.quantity < 1 {
            return Err(ApiError::invalid_field(
                "items.quantity",
                "Quantity must be at least 1",
            ));
        }
    }
    if items_total_cents(items).is_none() {
        return Err(ApiError::invalid_field("items", "Quotation total is too large"));
    }
    Ok(())
}

pub async fn list_quotations(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<Quotation>>> {
    Ok(Json(Quotation::list_owned_by(&state.db, identity.user_id).await?))
}

pub async fn create_quotation(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateQuotation>,
) -> ApiResult<(StatusCode, Json<Quotation>)> {
    check_items(&req.items)?;

    let quotation = Quotation::create(&state.db, identity.user_id, req)
        .await?
        .ok_or_else(|| not_found("Customer"))?;

    Ok((StatusCode::CREATED, Json(quotation)))
}

pub async fn get_quotation(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Quotation>> {
    Quotation::find_for_user(&state.db, id, identity.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Quotation"))
}

pub async fn update_quotation(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateQuotation>,
) -> ApiResult<Json<Quotation>> {
    if let Some(items) = &req.items {
        check_items(items)?;
    }

    Quotation::update(&state.db, id, identity.user_id, req)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Quotation"))
}

pub async fn delete_quotation(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Quotation::delete(&state.db, id, identity.user_id).await? {
        return Err(not_found("Quotation"));
    }
    Ok(StatusCode::NO_CONTENT)
}
