//! Part and task endpoints.

use crate::dtos::inventory::{CreatePartRequest, CreateTaskRequest};
use crate::middleware::OrgContext;
use crate::models::{Part, Task};
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

#[tracing::instrument(skip(state, request), fields(org_id = %org.org_id))]
pub async fn create_part(
    State(state): State<AppState>,
    org: OrgContext,
    Json(request): Json<CreatePartRequest>,
) -> Result<(StatusCode, Json<Part>), AppError> {
    request.validate()?;
    let part = state
        .reconciler
        .create_part(org.org_id, request.into())
        .await?;
    Ok((StatusCode::CREATED, Json(part)))
}

#[tracing::instrument(skip(state), fields(org_id = %org.org_id))]
pub async fn get_part(
    State(state): State<AppState>,
    org: OrgContext,
    Path(part_id): Path<Uuid>,
) -> Result<Json<Part>, AppError> {
    Ok(Json(state.reconciler.get_part(org.org_id, part_id).await?))
}

#[tracing::instrument(skip(state, request), fields(org_id = %org.org_id))]
pub async fn create_task(
    State(state): State<AppState>,
    org: OrgContext,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    request.validate()?;
    let task = state
        .reconciler
        .create_task(org.org_id, request.into())
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[tracing::instrument(skip(state), fields(org_id = %org.org_id))]
pub async fn get_task(
    State(state): State<AppState>,
    org: OrgContext,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Task>, AppError> {
    Ok(Json(state.reconciler.get_task(org.org_id, task_id).await?))
}
