// src/handlers/system.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    common::{error::AppError, response::ApiResponse},
    config::AppState,
    models::{
        report::SystemStats,
        system::{ApiInfo, HealthStatus},
    },
};

// GET /
#[utoipa::path(
    get,
    path = "/",
    tag = "System",
    responses((status = 200, description = "Identificação da API", body = ApiInfo))
)]
pub async fn root(State(app_state): State<AppState>) -> impl IntoResponse {
    let settings = &app_state.settings;
    Json(ApiInfo {
        message: format!("{} v{}", settings.app_name, settings.app_version),
        version: settings.app_version.clone(),
        status: "running".to_string(),
        docs: "/docs".to_string(),
        health: "/health".to_string(),
    })
}

// GET /health
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    responses(
        (status = 200, description = "Banco acessível", body = HealthStatus),
        (status = 500, description = "Falha ao consultar o banco")
    )
)]
pub async fn health(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let counts = app_state.report_service.health(&app_state.db_pool).await?;

    Ok((
        StatusCode::OK,
        Json(HealthStatus {
            status: "ok".to_string(),
            database: "conectado".to_string(),
            suppliers_count: counts.suppliers,
            version: app_state.settings.app_version.clone(),
        }),
    ))
}

// GET /api/stats/dashboard
#[utoipa::path(
    get,
    path = "/api/stats/dashboard",
    tag = "System",
    responses((status = 200, description = "Contagens e totais gerais", body = SystemStats))
)]
pub async fn get_dashboard_stats(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let stats = app_state.report_service.system_stats(&app_state.db_pool).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(stats))))
}
