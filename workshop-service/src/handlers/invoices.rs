use crate::dtos::invoices::{
    CreateInvoiceRequest, InvoiceListParams, InvoiceListResponse, InvoiceResponse,
    ReconciledResponse, UpdateInvoiceRequest,
};
use crate::middleware::OrgContext;
use crate::models::{InvoiceUpdate, NewInvoice};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

#[tracing::instrument(skip(state, request), fields(org_id = %org.org_id))]
pub async fn create_invoice(
    State(state): State<AppState>,
    org: OrgContext,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<ReconciledResponse>), AppError> {
    request.validate()?;
    let input = NewInvoice::try_from(request)?;

    let reconciled = state.reconciler.create_invoice(org.org_id, input).await?;

    Ok((StatusCode::CREATED, Json(reconciled.into())))
}

#[tracing::instrument(skip(state, params), fields(org_id = %org.org_id))]
pub async fn list_invoices(
    State(state): State<AppState>,
    org: OrgContext,
    Query(params): Query<InvoiceListParams>,
) -> Result<Json<InvoiceListResponse>, AppError> {
    let details = state
        .reconciler
        .list_invoices(org.org_id, &params.into())
        .await?;

    let invoices: Vec<InvoiceResponse> = details.into_iter().map(Into::into).collect();
    Ok(Json(InvoiceListResponse {
        total: invoices.len(),
        invoices,
    }))
}

#[tracing::instrument(skip(state), fields(org_id = %org.org_id))]
pub async fn get_invoice(
    State(state): State<AppState>,
    org: OrgContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let detail = state.reconciler.get_invoice(org.org_id, invoice_id).await?;
    Ok(Json(detail.into()))
}

#[tracing::instrument(skip(state, request), fields(org_id = %org.org_id))]
pub async fn update_invoice(
    State(state): State<AppState>,
    org: OrgContext,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<UpdateInvoiceRequest>,
) -> Result<Json<ReconciledResponse>, AppError> {
    request.validate()?;
    let update = InvoiceUpdate::try_from(request)?;

    let reconciled = state
        .reconciler
        .update_invoice(org.org_id, invoice_id, update)
        .await?;

    Ok(Json(reconciled.into()))
}

#[tracing::instrument(skip(state), fields(org_id = %org.org_id))]
pub async fn remove_invoice(
    State(state): State<AppState>,
    org: OrgContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .reconciler
        .remove_invoice(org.org_id, invoice_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
