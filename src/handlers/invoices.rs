// src/handlers/invoices.rs

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::AppError,
        extract::{JsonBody, PathParams, QueryParams},
        response::ApiResponse,
    },
    config::AppState,
    models::invoice::{
        AllocationOutcome, ApplyAdvancePayload, CreateInvoicePayload, Invoice, InvoiceDueDetail, InvoiceFilter,
        InvoiceStats, InvoiceWithSupplier, LinkPurchaseOrderPayload, UpdateInvoicePayload,
    },
};

// GET /api/invoices
#[utoipa::path(
    get,
    path = "/api/invoices",
    tag = "Invoices",
    params(InvoiceFilter),
    responses(
        (status = 200, description = "Lista paginada de faturas", body = [InvoiceWithSupplier]),
        (status = 400, description = "Parâmetros inválidos")
    )
)]
pub async fn list_invoices(
    State(app_state): State<AppState>,
    QueryParams(filter): QueryParams<InvoiceFilter>,
) -> Result<impl IntoResponse, AppError> {
    let page = app_state.invoice_service.list(&app_state.db_pool, &filter).await?;
    Ok((StatusCode::OK, Json(page)))
}

// GET /api/invoices/{id}
#[utoipa::path(
    get,
    path = "/api/invoices/{id}",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "ID da fatura")),
    responses(
        (status = 200, description = "Fatura", body = InvoiceWithSupplier),
        (status = 404, description = "Fatura não encontrada")
    )
)]
pub async fn get_invoice(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = app_state.invoice_service.get(&app_state.db_pool, id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(invoice))))
}

// POST /api/invoices
#[utoipa::path(
    post,
    path = "/api/invoices",
    tag = "Invoices",
    request_body = CreateInvoicePayload,
    responses(
        (status = 201, description = "Fatura criada com suas cuotas", body = Invoice),
        (status = 400, description = "Dados inválidos, cuotas não fecham com o total ou número duplicado"),
        (status = 404, description = "Fornecedor não encontrado")
    )
)]
pub async fn create_invoice(
    State(app_state): State<AppState>,
    JsonBody(payload): JsonBody<CreateInvoicePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let (invoice, message) = app_state.invoice_service.create(&app_state.db_pool, &payload).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::with_message(invoice, message))))
}

// PUT /api/invoices/{id}
#[utoipa::path(
    put,
    path = "/api/invoices/{id}",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "ID da fatura")),
    request_body = UpdateInvoicePayload,
    responses(
        (status = 200, description = "Fatura atualizada", body = Invoice),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Fatura não encontrada")
    )
)]
pub async fn update_invoice(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<UpdateInvoicePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let invoice = app_state.invoice_service.update(&app_state.db_pool, id, &payload).await?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::with_message(invoice, "Factura actualizada exitosamente")),
    ))
}

// DELETE /api/invoices/{id}
#[utoipa::path(
    delete,
    path = "/api/invoices/{id}",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "ID da fatura")),
    responses(
        (status = 200, description = "Fatura removida junto com cuotas e vínculos"),
        (status = 400, description = "Fatura com pagamentos ou anticipos aplicados"),
        (status = 404, description = "Fatura não encontrada")
    )
)]
pub async fn delete_invoice(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let message = app_state.invoice_service.delete(&app_state.db_pool, id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::message(message))))
}

// POST /api/invoices/{id}/link-oc
#[utoipa::path(
    post,
    path = "/api/invoices/{id}/link-oc",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "ID da fatura")),
    request_body = LinkPurchaseOrderPayload,
    responses(
        (status = 200, description = "Fatura vinculada à ordem"),
        (status = 400, description = "Fornecedores diferentes ou vínculo já existente"),
        (status = 404, description = "Fatura ou ordem não encontrada")
    )
)]
pub async fn link_purchase_order(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<LinkPurchaseOrderPayload>,
) -> Result<impl IntoResponse, AppError> {
    let message = app_state
        .invoice_service
        .link_purchase_order(&app_state.db_pool, id, payload.po_id)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::message(message))))
}

// POST /api/invoices/{id}/aplicar-anticipo
#[utoipa::path(
    post,
    path = "/api/invoices/{id}/aplicar-anticipo",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "ID da fatura")),
    request_body = ApplyAdvancePayload,
    responses(
        (status = 200, description = "Anticipo aplicado; devolve o novo saldo da fatura", body = AllocationOutcome),
        (status = 400, description = "Anticipo indisponível ou valor acima do saldo"),
        (status = 404, description = "Fatura, anticipo ou cuota não encontrada")
    )
)]
pub async fn apply_advance(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<ApplyAdvancePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let outcome = app_state.invoice_service.apply_advance(&app_state.db_pool, id, &payload).await?;
    let message = format!(
        "Anticipo aplicado exitosamente. Nuevo saldo: ${:.2}",
        outcome.nuevo_saldo_factura
    );

    Ok((StatusCode::OK, Json(ApiResponse::with_message(outcome, message))))
}

// GET /api/invoices/{id}/vencimientos
#[utoipa::path(
    get,
    path = "/api/invoices/{id}/vencimientos",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "ID da fatura")),
    responses(
        (status = 200, description = "Cuotas da fatura com as aplicações recebidas", body = [InvoiceDueDetail]),
        (status = 404, description = "Fatura não encontrada")
    )
)]
pub async fn get_invoice_dues(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let dues = app_state.invoice_service.dues(&app_state.db_pool, id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(dues))))
}

// GET /api/invoices/stats/resumen
#[utoipa::path(
    get,
    path = "/api/invoices/stats/resumen",
    tag = "Invoices",
    responses((status = 200, description = "Totais e saldos por estado e moeda", body = InvoiceStats))
)]
pub async fn get_invoice_stats(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let stats = app_state.invoice_service.stats(&app_state.db_pool).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(stats))))
}
