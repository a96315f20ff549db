// src/handlers/shipments.rs

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
    models::{
        report::HorizonParams,
        shipment::{
            CreateShipmentPayload, InTransitReport, LinkInvoicePayload, LinkSuppliersPayload, MarkArrivedParams,
            Shipment, ShipmentBalance, ShipmentDetail, ShipmentFilter, ShipmentListItem, ShipmentStats,
            ShipmentsBySupplier, UpcomingArrivals, UpdateAssignmentPayload, UpdateShipmentPayload,
        },
    },
};

// GET /api/shipments
#[utoipa::path(
    get,
    path = "/api/shipments",
    tag = "Shipments",
    params(ShipmentFilter),
    responses(
        (status = 200, description = "Lista paginada de embarques com fornecedores", body = [ShipmentListItem]),
        (status = 400, description = "Parâmetros inválidos")
    )
)]
pub async fn list_shipments(
    State(app_state): State<AppState>,
    QueryParams(filter): QueryParams<ShipmentFilter>,
) -> Result<impl IntoResponse, AppError> {
    let page = app_state.shipment_service.list(&app_state.db_pool, &filter).await?;
    Ok((StatusCode::OK, Json(page)))
}

// GET /api/shipments/{id}
#[utoipa::path(
    get,
    path = "/api/shipments/{id}",
    tag = "Shipments",
    params(("id" = Uuid, Path, description = "ID do embarque")),
    responses(
        (status = 200, description = "Embarque com fornecedores e faturas", body = ShipmentDetail),
        (status = 404, description = "Embarque não encontrado")
    )
)]
pub async fn get_shipment(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let shipment = app_state.shipment_service.get(&app_state.db_pool, id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(shipment))))
}

// POST /api/shipments
#[utoipa::path(
    post,
    path = "/api/shipments",
    tag = "Shipments",
    request_body = CreateShipmentPayload,
    responses(
        (status = 201, description = "Embarque criado", body = Shipment),
        (status = 400, description = "Dados inválidos ou código duplicado")
    )
)]
pub async fn create_shipment(
    State(app_state): State<AppState>,
    JsonBody(payload): JsonBody<CreateShipmentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let shipment = app_state.shipment_service.create(&app_state.db_pool, &payload).await?;
    let message = format!("Embarque {} creado exitosamente", shipment.codigo);

    Ok((StatusCode::CREATED, Json(ApiResponse::with_message(shipment, message))))
}

// PUT /api/shipments/{id}
#[utoipa::path(
    put,
    path = "/api/shipments/{id}",
    tag = "Shipments",
    params(("id" = Uuid, Path, description = "ID do embarque")),
    request_body = UpdateShipmentPayload,
    responses(
        (status = 200, description = "Embarque atualizado", body = Shipment),
        (status = 400, description = "Dados inválidos ou código duplicado"),
        (status = 404, description = "Embarque não encontrado")
    )
)]
pub async fn update_shipment(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<UpdateShipmentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let shipment = app_state.shipment_service.update(&app_state.db_pool, id, &payload).await?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::with_message(shipment, "Embarque actualizado exitosamente")),
    ))
}

// DELETE /api/shipments/{id}
#[utoipa::path(
    delete,
    path = "/api/shipments/{id}",
    tag = "Shipments",
    params(("id" = Uuid, Path, description = "ID do embarque")),
    responses(
        (status = 200, description = "Embarque removido"),
        (status = 400, description = "Embarque com faturas vinculadas"),
        (status = 404, description = "Embarque não encontrado")
    )
)]
pub async fn delete_shipment(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let message = app_state.shipment_service.delete(&app_state.db_pool, id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::message(message))))
}

// POST /api/shipments/{id}/proveedores
#[utoipa::path(
    post,
    path = "/api/shipments/{id}/proveedores",
    tag = "Shipments",
    params(("id" = Uuid, Path, description = "ID do embarque")),
    request_body = LinkSuppliersPayload,
    responses(
        (status = 200, description = "Conjunto de fornecedores substituído"),
        (status = 400, description = "Fornecedor inativo"),
        (status = 404, description = "Embarque ou fornecedor não encontrado")
    )
)]
pub async fn link_suppliers(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<LinkSuppliersPayload>,
) -> Result<impl IntoResponse, AppError> {
    let message = app_state
        .shipment_service
        .link_suppliers(&app_state.db_pool, id, &payload.supplier_ids)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::message(message))))
}

// POST /api/shipments/{id}/facturas
#[utoipa::path(
    post,
    path = "/api/shipments/{id}/facturas",
    tag = "Shipments",
    params(("id" = Uuid, Path, description = "ID do embarque")),
    request_body = LinkInvoicePayload,
    responses(
        (status = 200, description = "Fatura vinculada ao embarque"),
        (status = 400, description = "Fornecedor da fatura fora do embarque, vínculo duplicado ou valor inválido"),
        (status = 404, description = "Embarque ou fatura não encontrada")
    )
)]
pub async fn link_invoice(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<LinkInvoicePayload>,
) -> Result<impl IntoResponse, AppError> {
    let message = app_state.shipment_service.link_invoice(&app_state.db_pool, id, &payload).await?;
    Ok((StatusCode::OK, Json(ApiResponse::message(message))))
}

// PUT /api/shipments/{id}/facturas/{invoice_id}
#[utoipa::path(
    put,
    path = "/api/shipments/{id}/facturas/{invoice_id}",
    tag = "Shipments",
    params(
        ("id" = Uuid, Path, description = "ID do embarque"),
        ("invoice_id" = Uuid, Path, description = "ID da fatura")
    ),
    request_body = UpdateAssignmentPayload,
    responses(
        (status = 200, description = "Valor atribuído atualizado"),
        (status = 400, description = "Valor acima do total da fatura"),
        (status = 404, description = "Vínculo não encontrado")
    )
)]
pub async fn update_assignment(
    State(app_state): State<AppState>,
    PathParams((id, invoice_id)): PathParams<(Uuid, Uuid)>,
    JsonBody(payload): JsonBody<UpdateAssignmentPayload>,
) -> Result<impl IntoResponse, AppError> {
    let message = app_state
        .shipment_service
        .update_assignment(&app_state.db_pool, id, invoice_id, payload.monto_asignado)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::message(message))))
}

// DELETE /api/shipments/{id}/facturas/{invoice_id}
#[utoipa::path(
    delete,
    path = "/api/shipments/{id}/facturas/{invoice_id}",
    tag = "Shipments",
    params(
        ("id" = Uuid, Path, description = "ID do embarque"),
        ("invoice_id" = Uuid, Path, description = "ID da fatura")
    ),
    responses(
        (status = 200, description = "Fatura desvinculada"),
        (status = 404, description = "Vínculo não encontrado")
    )
)]
pub async fn unlink_invoice(
    State(app_state): State<AppState>,
    PathParams((id, invoice_id)): PathParams<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .shipment_service
        .unlink_invoice(&app_state.db_pool, id, invoice_id)
        .await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::message("Factura desvinculada exitosamente del embarque")),
    ))
}

// GET /api/shipments/{id}/cuadre
#[utoipa::path(
    get,
    path = "/api/shipments/{id}/cuadre",
    tag = "Shipments",
    params(("id" = Uuid, Path, description = "ID do embarque")),
    responses(
        (status = 200, description = "Cuadre financeiro por fornecedor", body = ShipmentBalance),
        (status = 404, description = "Embarque não encontrado")
    )
)]
pub async fn get_shipment_balance(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let balance = app_state.shipment_service.balance(&app_state.db_pool, id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(balance))))
}

// GET /api/shipments/por-proveedor/{supplier_id}
#[utoipa::path(
    get,
    path = "/api/shipments/por-proveedor/{supplier_id}",
    tag = "Shipments",
    params(("supplier_id" = Uuid, Path, description = "ID do fornecedor")),
    responses(
        (status = 200, description = "Embarques do fornecedor com suas faturas", body = ShipmentsBySupplier),
        (status = 404, description = "Fornecedor não encontrado")
    )
)]
pub async fn get_shipments_by_supplier(
    State(app_state): State<AppState>,
    PathParams(supplier_id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let shipments = app_state.shipment_service.by_supplier(&app_state.db_pool, supplier_id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(shipments))))
}

// GET /api/shipments/en-transito
#[utoipa::path(
    get,
    path = "/api/shipments/en-transito",
    tag = "Shipments",
    responses((status = 200, description = "Embarques em trânsito com urgência de chegada", body = InTransitReport))
)]
pub async fn get_in_transit(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state.shipment_service.in_transit(&app_state.db_pool).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(report))))
}

// GET /api/shipments/proximos-arribar
#[utoipa::path(
    get,
    path = "/api/shipments/proximos-arribar",
    tag = "Shipments",
    params(HorizonParams),
    responses(
        (status = 200, description = "Embarques com chegada prevista no horizonte", body = UpcomingArrivals),
        (status = 400, description = "Horizonte fora de 1..=365")
    )
)]
pub async fn get_upcoming_arrivals(
    State(app_state): State<AppState>,
    QueryParams(params): QueryParams<HorizonParams>,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state
        .shipment_service
        .upcoming_arrivals(&app_state.db_pool, params.dias)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(report))))
}

// POST /api/shipments/{id}/marcar-arribado
#[utoipa::path(
    post,
    path = "/api/shipments/{id}/marcar-arribado",
    tag = "Shipments",
    params(
        ("id" = Uuid, Path, description = "ID do embarque"),
        MarkArrivedParams
    ),
    responses(
        (status = 200, description = "Embarque marcado como arribado", body = Shipment),
        (status = 400, description = "Transição de estado inválida"),
        (status = 404, description = "Embarque não encontrado")
    )
)]
pub async fn mark_arrived(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    QueryParams(params): QueryParams<MarkArrivedParams>,
) -> Result<impl IntoResponse, AppError> {
    let shipment = app_state
        .shipment_service
        .mark_arrived(&app_state.db_pool, id, params.fecha_llegada_real)
        .await?;
    let message = format!("Embarque {} marcado como arribado", shipment.codigo);

    Ok((StatusCode::OK, Json(ApiResponse::with_message(shipment, message))))
}

// POST /api/shipments/{id}/marcar-despachado
#[utoipa::path(
    post,
    path = "/api/shipments/{id}/marcar-despachado",
    tag = "Shipments",
    params(("id" = Uuid, Path, description = "ID do embarque")),
    responses(
        (status = 200, description = "Embarque marcado como despachado", body = Shipment),
        (status = 400, description = "Embarque ainda não arribado"),
        (status = 404, description = "Embarque não encontrado")
    )
)]
pub async fn mark_dispatched(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let shipment = app_state.shipment_service.mark_dispatched(&app_state.db_pool, id).await?;
    let message = format!("Embarque {} marcado como despachado", shipment.codigo);

    Ok((StatusCode::OK, Json(ApiResponse::with_message(shipment, message))))
}

// GET /api/shipments/stats/resumen
#[utoipa::path(
    get,
    path = "/api/shipments/stats/resumen",
    tag = "Shipments",
    responses((status = 200, description = "Embarques por estado e valores vinculados", body = ShipmentStats))
)]
pub async fn get_shipment_stats(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let stats = app_state.shipment_service.stats(&app_state.db_pool).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(stats))))
}
