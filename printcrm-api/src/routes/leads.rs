/// Lead endpoints
///
/// - `GET /v1/leads`
/// - `POST /v1/leads` - the customer must belong to the caller
/// - `PATCH /v1/leads/:id`
/// - `DELETE /v1/leads/:id`

use super::{not_found, require_non_negative};
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use printcrm_shared::{
    identity::Identity,
    models::lead::{CreateLead, Lead, UpdateLead},
};
use uuid::Uuid;

pub async fn list_leads(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<Lead>>> {
    Ok(Json(Lead::list_owned_by(&state.db, identity.user_id).await?))
}

pub async fn create_lead(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateLead>,
) -> ApiResult<(StatusCode, Json<Lead>)> {
    if let Some(value) = req.estimated_value_cents {
        require_non_negative("estimated_value_cents", value)?;
    }

    let lead = Lead::create(&state.db, identity.user_id, req)
        .await?
        .ok_or_else(|| not_found("Customer"))?;

    Ok((StatusCode::CREATED, Json(lead)))
}

pub async fn update_lead(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateLead>,
) -> ApiResult<Json<Lead>> {
    if let Some(value) = req.estimated_value_cents {
        require_non_negative("estimated_value_cents", value)?;
    }

    Lead::update(&state.db, id, identity.user_id, req)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Lead"))
}

pub async fn delete_lead(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Lead::delete(&state.db, id, identity.user_id).await? {
        return Err(not_found("Lead"));
    }
    Ok(StatusCode::NO_CONTENT)
}
