// src/handlers/reports.rs

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        extract::{PathParams, QueryParams},
        response::ApiResponse,
    },
    config::AppState,
    models::report::{
        CashFlowParams, CashFlowProjection, ExecutiveDashboard, HorizonParams, ReconciliationReport,
        SupplierDetailReport, UpcomingDuesReport,
    },
};

// GET /api/reports/dashboard-ejecutivo
#[utoipa::path(
    get,
    path = "/api/reports/dashboard-ejecutivo",
    tag = "Reports",
    responses((status = 200, description = "Contagens, totais por moeda, top fornecedores e alertas", body = ExecutiveDashboard))
)]
pub async fn get_executive_dashboard(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let dashboard = app_state.report_service.executive_dashboard(&app_state.db_pool).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(dashboard))))
}

// GET /api/reports/conciliacion-ordenes
#[utoipa::path(
    get,
    path = "/api/reports/conciliacion-ordenes",
    tag = "Reports",
    responses((status = 200, description = "Ordem × faturas × anticipos, com estado de conciliação", body = ReconciliationReport))
)]
pub async fn get_order_reconciliation(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state.report_service.order_reconciliation(&app_state.db_pool).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(report))))
}

// GET /api/reports/flujo-caja-proyectado
#[utoipa::path(
    get,
    path = "/api/reports/flujo-caja-proyectado",
    tag = "Reports",
    params(CashFlowParams),
    responses(
        (status = 200, description = "Saídas semanais projetadas e cobertura por anticipos", body = CashFlowProjection),
        (status = 400, description = "Semanas fora de 1..=52")
    )
)]
pub async fn get_cash_flow(
    State(app_state): State<AppState>,
    QueryParams(params): QueryParams<CashFlowParams>,
) -> Result<impl IntoResponse, AppError> {
    let projection = app_state.report_service.cash_flow(&app_state.db_pool, params.semanas).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(projection))))
}

// GET /api/reports/vencimientos-proximos
#[utoipa::path(
    get,
    path = "/api/reports/vencimientos-proximos",
    tag = "Reports",
    params(HorizonParams),
    responses(
        (status = 200, description = "Cuotas abertas agrupadas por urgência", body = UpcomingDuesReport),
        (status = 400, description = "Dias fora de 1..=365")
    )
)]
pub async fn get_upcoming_dues(
    State(app_state): State<AppState>,
    QueryParams(params): QueryParams<HorizonParams>,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state.report_service.upcoming_dues(&app_state.db_pool, params.dias).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(report))))
}

// GET /api/reports/proveedor/{supplier_id}/detalle
#[utoipa::path(
    get,
    path = "/api/reports/proveedor/{supplier_id}/detalle",
    tag = "Reports",
    params(("supplier_id" = Uuid, Path, description = "ID do fornecedor")),
    responses(
        (status = 200, description = "Visão completa do fornecedor", body = SupplierDetailReport),
        (status = 404, description = "Fornecedor não encontrado")
    )
)]
pub async fn get_supplier_detail(
    State(app_state): State<AppState>,
    PathParams(supplier_id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state.report_service.supplier_detail(&app_state.db_pool, supplier_id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(report))))
}
