// src/common/error.rs

use std::sync::OnceLock;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// Quando ligado (DEBUG=true), os 500 devolvem a mensagem crua do erro.
static EXPOSE_INTERNAL_ERRORS: OnceLock<bool> = OnceLock::new();

pub fn expose_internal_errors(enabled: bool) {
    let _ = EXPOSE_INTERNAL_ERRORS.set(enabled);
}

fn internal_errors_exposed() -> bool {
    EXPOSE_INTERNAL_ERRORS.get().copied().unwrap_or(false)
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Error de validación")]
    ValidationError(#[from] validator::ValidationErrors),

    // Regra de negócio violada (saldo insuficiente, estado inválido...). Vira 400.
    #[error("{0}")]
    BusinessRule(String),

    #[error("{0}")]
    UniqueConstraintViolation(String),

    #[error("{0}")]
    ResourceNotFound(String),

    #[error("Error de base de datos: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // `anyhow::Error` captura o contexto de qualquer falha inesperada.
    #[error("Error interno del servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn rule(message: impl Into<String>) -> Self {
        AppError::BusinessRule(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::ResourceNotFound(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::BusinessRule(_)
            | AppError::UniqueConstraintViolation(_) => StatusCode::BAD_REQUEST,
            AppError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            // Devolve todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                json!({
                    "detail": "Uno o más campos son inválidos",
                    "errors": details,
                })
            }
            AppError::BusinessRule(msg)
            | AppError::UniqueConstraintViolation(msg)
            | AppError::ResourceNotFound(msg) => json!({ "detail": msg }),

            // DatabaseError e InternalServerError viram 500; o tracing guarda a mensagem completa.
            e => {
                tracing::error!("Error interno del servidor: {}", e);
                let detail = if internal_errors_exposed() {
                    e.to_string()
                } else {
                    "Ocurrió un error inesperado".to_string()
                };
                json!({ "detail": detail })
            }
        };

        (status, Json(body)).into_response()
    }
}

// Rejeições dos extratores: erro do cliente vira 400, o resto segue como 500.
fn from_rejection(status: StatusCode, text: String) -> AppError {
    if status.is_server_error() {
        AppError::InternalServerError(anyhow::anyhow!(text))
    } else {
        AppError::rule(format!("Solicitud inválida: {}", text))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        from_rejection(rejection.status(), rejection.body_text())
    }
}

/// Traduz violações de unicidade do Postgres para uma mensagem de negócio.
pub fn map_unique_violation(err: sqlx::Error, message: &str) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return AppError::UniqueConstraintViolation(message.to_string());
        }
    }
    AppError::DatabaseError(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "requerido"))]
        nombre: String,
    }

    #[test]
    fn business_rules_map_to_bad_request() {
        assert_eq!(AppError::rule("saldo").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::UniqueConstraintViolation("dup".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = AppError::not_found("Factura no encontrada").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn store_failures_map_to_500() {
        let response = AppError::DatabaseError(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = AppError::InternalServerError(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_errors_are_400() {
        let sample = Sample { nombre: String::new() };
        let errors = sample.validate().unwrap_err();
        let response = AppError::from(errors).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn client_rejections_become_rules_and_server_ones_stay_500() {
        let client = from_rejection(StatusCode::UNPROCESSABLE_ENTITY, "missing field `po_id`".into());
        assert_eq!(client.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(client.to_string(), "Solicitud inválida: missing field `po_id`");

        let server = from_rejection(StatusCode::INTERNAL_SERVER_ERROR, "no path params".into());
        assert_eq!(server.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn non_database_errors_pass_through_unique_mapping() {
        let mapped = map_unique_violation(sqlx::Error::RowNotFound, "dup");
        assert!(matches!(mapped, AppError::DatabaseError(_)));
    }
}
