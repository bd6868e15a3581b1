//! Service catalog CRUD.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use tracing::instrument;

use crate::dtos::service::{CreateServiceRequest, UpdateServiceRequest};
use crate::dtos::ApiResponse;
use crate::models::Service;
use crate::startup::AppState;
use crate::utils::{JsonBody, PathParam, ValidatedJson};

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Service not found"))
}

/// GET /services
pub async fn list_services(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Service>>>, AppError> {
    let services = state.store.list_services().await?;
    Ok(Json(ApiResponse::data(services)))
}

/// GET /services/:id
pub async fn get_service(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<ApiResponse<Service>>, AppError> {
    let service = state.store.get_service(id).await?.ok_or_else(not_found)?;
    Ok(Json(ApiResponse::data(service)))
}

/// POST /services
#[instrument(skip(state, req))]
pub async fn create_service(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateServiceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Service>>), AppError> {
    let input = req.into_model()?;
    let service = state.store.create_service(&input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Service created successfully",
            service,
        )),
    ))
}

/// PUT /services/:id
#[instrument(skip(state, req))]
pub async fn update_service(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
    JsonBody(req): JsonBody<UpdateServiceRequest>,
) -> Result<Json<ApiResponse<Service>>, AppError> {
    let input = req.into_model()?;
    let service = state
        .store
        .update_service(id, &input)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(ApiResponse::with_message(
        "Service updated successfully",
        service,
    )))
}

/// DELETE /services/:id
#[instrument(skip(state))]
pub async fn delete_service(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if !state.store.delete_service(id).await? {
        return Err(not_found());
    }
    Ok(Json(ApiResponse::message("Service deleted successfully")))
}
