// src/handlers/advances.rs

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
    models::advance::{
        AdvanceDetail, AdvanceFilter, AdvancePayment, AdvanceStats, AdvanceWithOrder, AdvancesByOrder,
        AvailableAdvances, CreateAdvancePayload, ReleaseOutcome, ReturnAdvanceParams, UpdateAdvancePayload,
    },
};

// GET /api/advances
#[utoipa::path(
    get,
    path = "/api/advances",
    tag = "Advances",
    params(AdvanceFilter),
    responses(
        (status = 200, description = "Lista paginada de anticipos", body = [AdvanceWithOrder]),
        (status = 400, description = "Parâmetros inválidos")
    )
)]
pub async fn list_advances(
    State(app_state): State<AppState>,
    QueryParams(filter): QueryParams<AdvanceFilter>,
) -> Result<impl IntoResponse, AppError> {
    let page = app_state.advance_service.list(&app_state.db_pool, &filter).await?;
    Ok((StatusCode::OK, Json(page)))
}

// GET /api/advances/{id}
#[utoipa::path(
    get,
    path = "/api/advances/{id}",
    tag = "Advances",
    params(("id" = Uuid, Path, description = "ID do anticipo")),
    responses(
        (status = 200, description = "Anticipo com aplicações e saldo disponível", body = AdvanceDetail),
        (status = 404, description = "Anticipo não encontrado")
    )
)]
pub async fn get_advance(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let advance = app_state.advance_service.get(&app_state.db_pool, id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(advance))))
}

// POST /api/advances
#[utoipa::path(
    post,
    path = "/api/advances",
    tag = "Advances",
    request_body = CreateAdvancePayload,
    responses(
        (status = 201, description = "Anticipo registrado", body = AdvancePayment),
        (status = 400, description = "Soma dos anticipos excederia o total da ordem"),
        (status = 404, description = "Ordem não encontrada")
    )
)]
pub async fn create_advance(
    State(app_state): State<AppState>,
    JsonBody(payload): JsonBody<CreateAdvancePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let (advance, message) = app_state.advance_service.create(&app_state.db_pool, &payload).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::with_message(advance, message))))
}

// PUT /api/advances/{id}
#[utoipa::path(
    put,
    path = "/api/advances/{id}",
    tag = "Advances",
    params(("id" = Uuid, Path, description = "ID do anticipo")),
    request_body = UpdateAdvancePayload,
    responses(
        (status = 200, description = "Anticipo atualizado", body = AdvancePayment),
        (status = 400, description = "Anticipo já aplicado ou valor fora dos limites"),
        (status = 404, description = "Anticipo não encontrado")
    )
)]
pub async fn update_advance(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<UpdateAdvancePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let advance = app_state.advance_service.update(&app_state.db_pool, id, &payload).await?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::with_message(advance, "Anticipo actualizado exitosamente")),
    ))
}

// DELETE /api/advances/{id}
#[utoipa::path(
    delete,
    path = "/api/advances/{id}",
    tag = "Advances",
    params(("id" = Uuid, Path, description = "ID do anticipo")),
    responses(
        (status = 200, description = "Anticipo removido"),
        (status = 400, description = "Anticipo com aplicações"),
        (status = 404, description = "Anticipo não encontrado")
    )
)]
pub async fn delete_advance(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.advance_service.delete(&app_state.db_pool, id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::message("Anticipo eliminado exitosamente"))))
}

// POST /api/advances/{id}/devolver
#[utoipa::path(
    post,
    path = "/api/advances/{id}/devolver",
    tag = "Advances",
    params(
        ("id" = Uuid, Path, description = "ID do anticipo"),
        ReturnAdvanceParams
    ),
    responses(
        (status = 200, description = "Anticipo marcado como devolvido", body = AdvancePayment),
        (status = 400, description = "Anticipo não disponível ou já aplicado"),
        (status = 404, description = "Anticipo não encontrado")
    )
)]
pub async fn return_advance(
    State(app_state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    QueryParams(params): QueryParams<ReturnAdvanceParams>,
) -> Result<impl IntoResponse, AppError> {
    let advance = app_state
        .advance_service
        .return_advance(&app_state.db_pool, id, params.motivo.as_deref())
        .await?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::with_message(advance, "Anticipo marcado como devuelto")),
    ))
}

// DELETE /api/advances/{id}/aplicaciones/{allocation_id}
#[utoipa::path(
    delete,
    path = "/api/advances/{id}/aplicaciones/{allocation_id}",
    tag = "Advances",
    params(
        ("id" = Uuid, Path, description = "ID do anticipo"),
        ("allocation_id" = Uuid, Path, description = "ID da aplicação")
    ),
    responses(
        (status = 200, description = "Aplicação desfeita; saldo devolvido à fatura", body = ReleaseOutcome),
        (status = 404, description = "Aplicação não encontrada")
    )
)]
pub async fn release_allocation(
    State(app_state): State<AppState>,
    PathParams((id, allocation_id)): PathParams<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state
        .advance_service
        .release_allocation(&app_state.db_pool, id, allocation_id)
        .await?;
    let message = format!(
        "Aplicación liberada. Saldo de factura actualizado a ${:.2}",
        outcome.nuevo_saldo_factura
    );

    Ok((StatusCode::OK, Json(ApiResponse::with_message(outcome, message))))
}

// GET /api/advances/por-orden/{po_id}
#[utoipa::path(
    get,
    path = "/api/advances/por-orden/{po_id}",
    tag = "Advances",
    params(("po_id" = Uuid, Path, description = "ID da ordem")),
    responses(
        (status = 200, description = "Anticipos da ordem com resumo", body = AdvancesByOrder),
        (status = 404, description = "Ordem não encontrada")
    )
)]
pub async fn get_advances_by_order(
    State(app_state): State<AppState>,
    PathParams(po_id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let advances = app_state.advance_service.by_order(&app_state.db_pool, po_id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(advances))))
}

// GET /api/advances/disponibles/{po_id}
#[utoipa::path(
    get,
    path = "/api/advances/disponibles/{po_id}",
    tag = "Advances",
    params(("po_id" = Uuid, Path, description = "ID da ordem")),
    responses(
        (status = 200, description = "Anticipos com saldo aplicável", body = AvailableAdvances),
        (status = 404, description = "Ordem não encontrada")
    )
)]
pub async fn get_available_advances(
    State(app_state): State<AppState>,
    PathParams(po_id): PathParams<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let available = app_state.advance_service.available(&app_state.db_pool, po_id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(available))))
}

// GET /api/advances/stats/resumen
#[utoipa::path(
    get,
    path = "/api/advances/stats/resumen",
    tag = "Advances",
    responses((status = 200, description = "Totais de anticipos por estado e moeda", body = AdvanceStats))
)]
pub async fn get_advance_stats(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let stats = app_state.advance_service.stats(&app_state.db_pool).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(stats))))
}
