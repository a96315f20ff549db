// src/handlers/suppliers.rs

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
    models::supplier::{CreateSupplierPayload, Supplier, SupplierDashboard, SupplierFilter, UpdateSupplierPayload},
};

// GET /api/suppliers
#[utoipa::path(
    get,
    path = "/api/suppliers",
    tag = "Suppliers",
    params(SupplierFilter),
    responses(
        (status = 200, description = "Lista paginada de fornecedores", body = [Supplier]),
        (status = 400, description = "Parâmetros de paginação inválidos")
    )
)]
pub async fn list_suppliers(
    State(app_state): State<AppState>,
    QueryParams(filter): QueryParams<SupplierFilter>,
) -> Result<impl IntoResponse, AppError> {
    let page = app_state.supplier_service.list(&app_state.db_pool, &filter).await?;
    Ok((StatusCode::OK, Json(page)))
}

// GET /api/suppliers/{id}
#[utoipa::path(
    get,
    path = "/api/suppliers/{id}",
    tag = "Suppliers",
    params(("id" = Uuid, Path, description = "ID do fornecedor")),
    responses(
        (status = 200, description = "Fornecedor", body = Supplier),
        (status = 404, description = "Fornecedor não encontrado")
    )
)]
pub async fn get_supplier(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let supplier = app_state.supplier_service.get(&app_state.db_pool, id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(supplier))))
}

// POST /api/suppliers
#[utoipa::path(
    post,
    path = "/api/suppliers",
    tag = "Suppliers",
    request_body = CreateSupplierPayload,
    responses(
        (status = 201, description = "Fornecedor criado", body = Supplier),
        (status = 400, description = "Dados inválidos ou nome duplicado")
    )
)]
pub async fn create_supplier(
    State(app_state): State<AppState>,
    JsonBody(payload): JsonBody<CreateSupplierPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let supplier = app_state.supplier_service.create(&app_state.db_pool, &payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(supplier, "Proveedor creado exitosamente")),
    ))
}

// PUT /api/suppliers/{id}
#[utoipa::path(
    put,
    path = "/api/suppliers/{id}",
    tag = "Suppliers",
    params(("id" = Uuid, Path, description = "ID do fornecedor")),
    request_body = UpdateSupplierPayload,
    responses(
        (status = 200, description = "Fornecedor atualizado", body = Supplier),
        (status = 400, description = "Dados inválidos ou nome duplicado"),
        (status = 404, description = "Fornecedor não encontrado")
    )
)]
pub async fn update_supplier(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<UpdateSupplierPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let supplier = app_state.supplier_service.update(&app_state.db_pool, id, &payload).await?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::with_message(supplier, "Proveedor actualizado exitosamente")),
    ))
}

// DELETE /api/suppliers/{id}
// Com ordens ou faturas vinculadas o fornecedor só é desativado.
#[utoipa::path(
    delete,
    path = "/api/suppliers/{id}",
    tag = "Suppliers",
    params(("id" = Uuid, Path, description = "ID do fornecedor")),
    responses(
        (status = 200, description = "Fornecedor removido ou desativado"),
        (status = 404, description = "Fornecedor não encontrado")
    )
)]
pub async fn delete_supplier(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let message = app_state.supplier_service.delete(&app_state.db_pool, id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::message(message))))
}

// GET /api/suppliers/{id}/dashboard
#[utoipa::path(
    get,
    path = "/api/suppliers/{id}/dashboard",
    tag = "Suppliers",
    params(("id" = Uuid, Path, description = "ID do fornecedor")),
    responses(
        (status = 200, description = "Resumo de ordens, faturas e anticipos do fornecedor", body = SupplierDashboard),
        (status = 404, description = "Fornecedor não encontrado")
    )
)]
pub async fn get_supplier_dashboard(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let dashboard = app_state.supplier_service.dashboard(&app_state.db_pool, id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(dashboard))))
}
