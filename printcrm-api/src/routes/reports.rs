/// Dashboard report endpoint
///
/// ```text
/// GET /v1/reports/summary?period=this_month
/// ```
///
/// `period` is one of `today`, `this_week`, `this_month`, `last_month`,
/// `this_year`; omit it for all-time figures. Amounts are in cents.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;
use printcrm_shared::{
    identity::Identity,
    models::report::{DashboardSummary, ReportPeriod},
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub period: Option<String>,
}

pub async fn summary(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<DashboardSummary>> {
    let period = query
        .period
        .as_deref()
        .map(str::parse::<ReportPeriod>)
        .transpose()
        .map_err(|e| ApiError::invalid_field("period", e.to_string()))?;

    let summary = DashboardSummary::for_user(&state.db, identity.user_id, period, Utc::now()).await?;
    Ok(Json(summary))
}
