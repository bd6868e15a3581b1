//! Bill endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde_json::Value;
use service_core::error::AppError;
use tracing::instrument;

use crate::dtos::ApiResponse;
use crate::models::Bill;
use crate::services::billing;
use crate::startup::AppState;
use crate::utils::{JsonBody, PathParam};

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Bill not found"))
}

/// GET /bills
pub async fn list_bills(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Bill>>>, AppError> {
    let bills = state.store.list_bills().await?;
    Ok(Json(ApiResponse::data(bills)))
}

/// GET /bills/:id
pub async fn get_bill(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<ApiResponse<Bill>>, AppError> {
    let bill = state.store.get_bill(id).await?.ok_or_else(not_found)?;
    Ok(Json(ApiResponse::data(bill)))
}

/// POST /bills
///
/// Accepts `{customer_id, date?, is_paid?, items: [{service_id, quantity?, unit_price?}]}`
/// or the single-item shorthand with `service_id`/`quantity`/`unit_price` at the top level.
#[instrument(skip(state, body))]
pub async fn create_bill(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Value>,
) -> Result<(StatusCode, Json<ApiResponse<Bill>>), AppError> {
    let bill = billing::create_bill(state.store.as_ref(), &body).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Bill created successfully", bill)),
    ))
}

/// PUT /bills/:id
#[instrument(skip(state, body))]
pub async fn update_bill(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
    JsonBody(body): JsonBody<Value>,
) -> Result<Json<ApiResponse<Bill>>, AppError> {
    let bill = billing::update_bill(state.store.as_ref(), id, &body).await?;
    Ok(Json(ApiResponse::with_message("Bill updated successfully", bill)))
}

/// PATCH /bills/:id/toggle-paid
#[instrument(skip(state))]
pub async fn toggle_paid(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<ApiResponse<Bill>>, AppError> {
    let bill = state.store.toggle_bill_paid(id).await?.ok_or_else(not_found)?;
    let message = if bill.is_paid {
        "Bill marked as paid"
    } else {
        "Bill marked as unpaid"
    };
    Ok(Json(ApiResponse::with_message(message, bill)))
}

/// DELETE /bills/:id
#[instrument(skip(state))]
pub async fn delete_bill(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if !state.store.delete_bill(id).await? {
        return Err(not_found());
    }
    tracing::info!(bill_id = id, "Bill soft-deleted");
    Ok(Json(ApiResponse::message("Bill deleted successfully")))
}
