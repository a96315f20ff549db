// src/common/response.rs

use serde::Serialize;

use crate::common::db_utils::Pagination;

// Envelope padrão: {success, data, message?}
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), message: None }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self { success: true, data: Some(data), message: Some(message.into()) }
    }
}

impl ApiResponse<()> {
    /// Resposta sem corpo de dados (ex.: remoções).
    pub fn message(message: impl Into<String>) -> Self {
        Self { success: true, data: None, message: Some(message.into()) }
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub pages: i64,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            success: true,
            data,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
            pages: pagination.pages(total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_only_response_omits_data() {
        let value = serde_json::to_value(ApiResponse::message("Pago eliminado")).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "Pago eliminado");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn paginated_envelope_carries_page_count() {
        let pagination = Pagination::new(Some(2), Some(20)).unwrap();
        let value = serde_json::to_value(Paginated::new(vec![1, 2, 3], 45, pagination)).unwrap();
        assert_eq!(value["total"], 45);
        assert_eq!(value["page"], 2);
        assert_eq!(value["pages"], 3);
    }
}
