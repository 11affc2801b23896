/// Order endpoints
///
/// - `GET /v1/orders?status=` - newest first, optional status filter
/// - `POST /v1/orders` - the customer must belong to the caller; the order
///   number is generated
/// - `GET /v1/orders/:id`
/// - `PATCH /v1/orders/:id`
/// - `DELETE /v1/orders/:id` - 409 while payments or job cards remain

use super::{not_found, require_non_negative, require_text};
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
    models::order::{CreateOrder, Order, OrderStatus, UpdateOrder},
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
}

/// Request-level amount checks; an advance sent without a total is checked
/// against the stored total by the `orders_advance_within_total` constraint
fn check_amounts(total: Option<i64>, advance: Option<i64>, quantity: Option<i32>) -> ApiResult<()> {
    if let Some(total) = total {
        require_non_negative("total_amount_cents", total)?;
    }
    if let Some(advance) = advance {
        require_non_negative("advance_paid_cents", advance)?;
    }
    if let (Some(total), Some(advance)) = (total, advance) {
        if advance > total {
            return Err(ApiError::invalid_field(
                "advance_paid_cents",
                "Advance cannot exceed the order total",
            ));
        }
    }
    if quantity.is_some_and(|q| q < 1) {
        return Err(ApiError::invalid_field("quantity", "Quantity must be at least 1"));
    }
    Ok(())
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<Json<Vec<Order>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(|e| ApiError::invalid_field("status", e.to_string()))?;

    Ok(Json(Order::list_for_user(&state.db, identity.user_id, status).await?))
}

pub async fn create_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateOrder>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    require_text("product_type", &req.product_type)?;
    check_amounts(
        Some(req.total_amount_cents),
        Some(req.advance_paid_cents),
        Some(req.quantity),
    )?;

    let order = Order::create(&state.db, identity.user_id, req)
        .await?
        .ok_or_else(|| not_found("Customer"))?;

    tracing::debug!(
        user_id = %identity.user_id,
        order_number = %order.order_number,
        "Order created"
    );

    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    Order::find_for_user(&state.db, id, identity.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Order"))
}

pub async fn update_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrder>,
) -> ApiResult<Json<Order>> {
    if let Some(product_type) = &req.product_type {
        require_text("product_type", product_type)?;
    }
    check_amounts(req.total_amount_cents, req.advance_paid_cents, req.quantity)?;

    Order::update(&state.db, id, identity.user_id, req)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Order"))
}

pub async fn delete_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Order::delete(&state.db, id, identity.user_id).await? {
        return Err(not_found("Order"));
    }
    Ok(StatusCode::NO_CONTENT)
}
