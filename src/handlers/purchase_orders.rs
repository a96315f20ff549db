// src/handlers/purchase_orders.rs

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
    models::purchase_order::{
        CreatePurchaseOrderPayload, OrderAdvancesDashboard, PurchaseOrder, PurchaseOrderFilter,
        PurchaseOrderStats, PurchaseOrderWithSupplier, UpdatePurchaseOrderPayload,
    },
};

// GET /api/purchase-orders
#[utoipa::path(
    get,
    path = "/api/purchase-orders",
    tag = "Purchase Orders",
    params(PurchaseOrderFilter),
    responses(
        (status = 200, description = "Lista paginada de ordens de compra", body = [PurchaseOrderWithSupplier]),
        (status = 400, description = "Parâmetros inválidos")
    )
)]
pub async fn list_purchase_orders(
    State(app_state): State<AppState>,
    QueryParams(filter): QueryParams<PurchaseOrderFilter>,
) -> Result<impl IntoResponse, AppError> {
    let page = app_state.purchase_order_service.list(&app_state.db_pool, &filter).await?;
    Ok((StatusCode::OK, Json(page)))
}

// GET /api/purchase-orders/{id}
#[utoipa::path(
    get,
    path = "/api/purchase-orders/{id}",
    tag = "Purchase Orders",
    params(("id" = Uuid, Path, description = "ID da ordem")),
    responses(
        (status = 200, description = "Ordem de compra", body = PurchaseOrderWithSupplier),
        (status = 404, description = "Ordem não encontrada")
    )
)]
pub async fn get_purchase_order(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let order = app_state.purchase_order_service.get(&app_state.db_pool, id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(order))))
}

// POST /api/purchase-orders
#[utoipa::path(
    post,
    path = "/api/purchase-orders",
    tag = "Purchase Orders",
    request_body = CreatePurchaseOrderPayload,
    responses(
        (status = 201, description = "Ordem criada", body = PurchaseOrder),
        (status = 400, description = "Dados inválidos, número duplicado ou fornecedor inativo"),
        (status = 404, description = "Fornecedor não encontrado")
    )
)]
pub async fn create_purchase_order(
    State(app_state): State<AppState>,
    JsonBody(payload): JsonBody<CreatePurchaseOrderPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let (order, message) = app_state
        .purchase_order_service
        .create(&app_state.db_pool, &payload)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::with_message(order, message))))
}

// PUT /api/purchase-orders/{id}
#[utoipa::path(
    put,
    path = "/api/purchase-orders/{id}",
    tag = "Purchase Orders",
    params(("id" = Uuid, Path, description = "ID da ordem")),
    request_body = UpdatePurchaseOrderPayload,
    responses(
        (status = 200, description = "Ordem atualizada", body = PurchaseOrder),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Ordem não encontrada")
    )
)]
pub async fn update_purchase_order(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<UpdatePurchaseOrderPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let order = app_state
        .purchase_order_service
        .update(&app_state.db_pool, id, &payload)
        .await?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::with_message(order, "Orden de compra actualizada exitosamente")),
    ))
}

// DELETE /api/purchase-orders/{id}
#[utoipa::path(
    delete,
    path = "/api/purchase-orders/{id}",
    tag = "Purchase Orders",
    params(("id" = Uuid, Path, description = "ID da ordem")),
    responses(
        (status = 200, description = "Ordem removida"),
        (status = 400, description = "Ordem com anticipos ou faturas vinculadas"),
        (status = 404, description = "Ordem não encontrada")
    )
)]
pub async fn delete_purchase_order(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let message = app_state.purchase_order_service.delete(&app_state.db_pool, id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::message(message))))
}

// GET /api/purchase-orders/{id}/anticipos-dashboard
#[utoipa::path(
    get,
    path = "/api/purchase-orders/{id}/anticipos-dashboard",
    tag = "Purchase Orders",
    params(("id" = Uuid, Path, description = "ID da ordem")),
    responses(
        (status = 200, description = "Anticipos, faturas vinculadas e balanço da ordem", body = OrderAdvancesDashboard),
        (status = 404, description = "Ordem não encontrada")
    )
)]
pub async fn get_advances_dashboard(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let dashboard = app_state
        .purchase_order_service
        .advances_dashboard(&app_state.db_pool, id)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(dashboard))))
}

// GET /api/purchase-orders/stats/resumen
#[utoipa::path(
    get,
    path = "/api/purchase-orders/stats/resumen",
    tag = "Purchase Orders",
    responses((status = 200, description = "Totais por estado e moeda", body = PurchaseOrderStats))
)]
pub async fn get_purchase_order_stats(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let stats = app_state.purchase_order_service.stats(&app_state.db_pool).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(stats))))
}
