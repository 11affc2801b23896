/// Job card endpoints
///
/// - `GET /v1/job-cards`
/// - `POST /v1/job-cards` - the order must belong to the caller
/// - `PATCH /v1/job-cards/:id`
/// - `DELETE /v1/job-cards/:id`

use super::{not_found, require_text};
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use printcrm_shared::{
    identity::Identity,
    models::job_card::{CreateJobCard, JobCard, UpdateJobCard},
};
use uuid::Uuid;

pub async fn list_job_cards(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<JobCard>>> {
    Ok(Json(JobCard::list_owned_by(&state.db, identity.user_id).await?))
}

pub async fn create_job_card(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateJobCard>,
) -> ApiResult<(StatusCode, Json<JobCard>)> {
    require_text("title", &req.title)?;

    let job_card = JobCard::create(&state.db, identity.user_id, req)
        .await?
        .ok_or_else(|| not_found("Order"))?;

    Ok((StatusCode::CREATED, Json(job_card)))
}

pub async fn update_job_card(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateJobCard>,
) -> ApiResult<Json<JobCard>> {
    if let Some(title) = &req.title {
        require_text("title", title)?;
    }

    JobCard::update(&state.db, id, identity.user_id, req)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Job card"))
}

pub async fn delete_job_card(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !JobCard::delete(&state.db, id, identity.user_id).await? {
        return Err(not_found("Job card"));
    }
    Ok(StatusCode::NO_CONTENT)
}
