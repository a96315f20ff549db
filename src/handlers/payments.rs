// src/handlers/payments.rs

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
    models::payment::{
        CreatePaymentPayload, PaymentDetail, PaymentFilter, PaymentOutcome, PaymentStats, PaymentWithInvoice,
        PaymentsByInvoice, UpdatePaymentPayload,
    },
};

// GET /api/payments
#[utoipa::path(
    get,
    path = "/api/payments",
    tag = "Payments",
    params(PaymentFilter),
    responses(
        (status = 200, description = "Lista paginada de pagamentos", body = [PaymentWithInvoice]),
        (status = 400, description = "Parâmetros inválidos")
    )
)]
pub async fn list_payments(
    State(app_state): State<AppState>,
    QueryParams(filter): QueryParams<PaymentFilter>,
) -> Result<impl IntoResponse, AppError> {
    let page = app_state.payment_service.list(&app_state.db_pool, &filter).await?;
    Ok((StatusCode::OK, Json(page)))
}

// GET /api/payments/{id}
#[utoipa::path(
    get,
    path = "/api/payments/{id}",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "ID do pagamento")),
    responses(
        (status = 200, description = "Pagamento com as cuotas em que foi aplicado", body = PaymentDetail),
        (status = 404, description = "Pagamento não encontrado")
    )
)]
pub async fn get_payment(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let payment = app_state.payment_service.get(&app_state.db_pool, id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(payment))))
}

// POST /api/payments
#[utoipa::path(
    post,
    path = "/api/payments",
    tag = "Payments",
    request_body = CreatePaymentPayload,
    responses(
        (status = 201, description = "Pagamento registrado; devolve o novo saldo da fatura", body = PaymentOutcome),
        (status = 400, description = "Valor acima do saldo pendente"),
        (status = 404, description = "Fatura ou cuota não encontrada")
    )
)]
pub async fn create_payment(
    State(app_state): State<AppState>,
    JsonBody(payload): JsonBody<CreatePaymentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let outcome = app_state.payment_service.create(&app_state.db_pool, &payload).await?;
    let message = format!(
        "Pago registrado exitosamente. Nuevo saldo: ${:.2}",
        outcome.nuevo_saldo_factura
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::with_message(outcome, message))))
}

// PUT /api/payments/{id}
#[utoipa::path(
    put,
    path = "/api/payments/{id}",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "ID do pagamento")),
    request_body = UpdatePaymentPayload,
    responses(
        (status = 200, description = "Pagamento atualizado", body = PaymentOutcome),
        (status = 400, description = "Novo valor excederia o total da fatura"),
        (status = 404, description = "Pagamento não encontrado")
    )
)]
pub async fn update_payment(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<UpdatePaymentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let outcome = app_state.payment_service.update(&app_state.db_pool, id, &payload).await?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::with_message(outcome, "Pago actualizado exitosamente")),
    ))
}

// DELETE /api/payments/{id}
#[utoipa::path(
    delete,
    path = "/api/payments/{id}",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "ID do pagamento")),
    responses(
        (status = 200, description = "Pagamento removido e saldo devolvido à fatura"),
        (status = 404, description = "Pagamento não encontrado")
    )
)]
pub async fn delete_payment(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let message = app_state.payment_service.delete(&app_state.db_pool, id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::message(message))))
}

// GET /api/payments/por-factura/{invoice_id}
#[utoipa::path(
    get,
    path = "/api/payments/por-factura/{invoice_id}",
    tag = "Payments",
    params(("invoice_id" = Uuid, Path, description = "ID da fatura")),
    responses(
        (status = 200, description = "Pagamentos da fatura com resumo", body = PaymentsByInvoice),
        (status = 404, description = "Fatura não encontrada")
    )
)]
pub async fn get_payments_by_invoice(
    State(app_state): State<AppState>,
    PathParams(invoice_id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let payments = app_state.payment_service.by_invoice(&app_state.db_pool, invoice_id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(payments))))
}

// GET /api/payments/stats/resumen
#[utoipa::path(
    get,
    path = "/api/payments/stats/resumen",
    tag = "Payments",
    responses((status = 200, description = "Totais de pagamentos por método e mês", body = PaymentStats))
)]
pub async fn get_payment_stats(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let stats = app_state.payment_service.stats(&app_state.db_pool).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(stats))))
}
