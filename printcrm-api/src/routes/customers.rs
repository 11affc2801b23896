/// Customer endpoints
///
/// - `GET /v1/customers` - newest first
/// - `POST /v1/customers`
/// - `GET /v1/customers/:id`
/// - `PATCH /v1/customers/:id`
/// - `DELETE /v1/customers/:id` - 409 while orders, quotations or leads
///   still reference the customer

use super::{not_found, require_text};
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use printcrm_shared::{
    identity::Identity,
    models::customer::{CreateCustomer, Customer, UpdateCustomer},
};
use uuid::Uuid;

pub async fn list_customers(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(Customer::list_owned_by(&state.db, identity.user_id).await?))
}

pub async fn create_customer(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateCustomer>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    require_text("name", &req.name)?;

    let customer = Customer::create(&state.db, identity.user_id, req).await?;
    tracing::debug!(user_id = %identity.user_id, customer_id = %customer.id, "Customer created");

    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Customer>> {
    Customer::find_for_user(&state.db, id, identity.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Customer"))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCustomer>,
) -> ApiResult<Json<Customer>> {
    if let Some(name) = &req.name {
        require_text("name", name)?;
    }

    Customer::update(&state.db, id, identity.user_id, req)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Customer"))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Customer::delete(&state.db, id, identity.user_id).await? {
        return Err(not_found("Customer"));
    }
    Ok(StatusCode::NO_CONTENT)
}
