// src/models/system.rs

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiInfo {
    pub message: String,
    pub version: String,
    pub status: String,
    pub docs: String,
    pub health: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
    pub suppliers_count: i64,
    pub version: String,
}
