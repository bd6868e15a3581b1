//! Customer CRUD.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use tracing::instrument;

use crate::dtos::customer::{CreateCustomerRequest, UpdateCustomerRequest};
use crate::dtos::ApiResponse;
use crate::models::Customer;
use crate::startup::AppState;
use crate::utils::{JsonBody, PathParam, ValidatedJson};

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Customer not found"))
}

/// GET /customers
pub async fn list_customers(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Customer>>>, AppError> {
    let customers = state.store.list_customers().await?;
    Ok(Json(ApiResponse::data(customers)))
}

/// GET /customers/:id
pub async fn get_customer(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<ApiResponse<Customer>>, AppError> {
    let customer = state.store.get_customer(id).await?.ok_or_else(not_found)?;
    Ok(Json(ApiResponse::data(customer)))
}

/// POST /customers
#[instrument(skip(state, req))]
pub async fn create_customer(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Customer>>), AppError> {
    let customer = state.store.create_customer(&req.into_model()).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Customer created successfully",
            customer,
        )),
    ))
}

/// PUT /customers/:id
#[instrument(skip(state, req))]
pub async fn update_customer(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
    JsonBody(req): JsonBody<UpdateCustomerRequest>,
) -> Result<Json<ApiResponse<Customer>>, AppError> {
    let customer = state
        .store
        .update_customer(id, &req.into())
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(ApiResponse::with_message(
        "Customer updated successfully",
        customer,
    )))
}

/// DELETE /customers/:id
#[instrument(skip(state))]
pub async fn delete_customer(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if !state.store.delete_customer(id).await? {
        return Err(not_found());
    }
    Ok(Json(ApiResponse::message("Customer deleted successfully")))
}
