use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::bill::SummaryQuery;
use crate::dtos::ApiResponse;
use crate::services::reports::{summarize, BillSummary};
use crate::startup::AppState;

/// GET /reports/summary?from=&to=&status=
pub async fn summary(
    State(state): State<AppState>,
    query: Result<Query<SummaryQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<BillSummary>>, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(anyhow::anyhow!(e.body_text())))?;
    let filter = query.into_filter()?;

    let bills = state.store.list_bills().await?;
    Ok(Json(ApiResponse::data(summarize(&bills, &filter))))
}
