// src/common/extract.rs

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::common::error::AppError;

// Extratores que devolvem rejeições como AppError (400 com `{detail}`),
// no lugar do 422 em texto puro do axum.

pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

pub struct QueryParams<T>(pub T);

impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(QueryParams(value))
    }
}

pub struct PathParams<T>(pub T);

impl<T, S> FromRequestParts<S> for PathParams<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(PathParams(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, StatusCode},
        response::{IntoResponse, Response},
    };
    use serde::Deserialize;
    use uuid::Uuid;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct NewAdvance {
        po_id: Uuid,
        monto: f64,
    }

    #[derive(Debug, Deserialize)]
    struct Listing {
        page: Option<i64>,
    }

    fn json_request(body: String) -> Request {
        Request::builder()
            .method("POST")
            .uri("/api/advances")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn detail_of(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["detail"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn missing_body_field_is_a_json_400() {
        let request = json_request(r#"{"monto": 10}"#.to_string());

        let err = JsonBody::<NewAdvance>::from_request(request, &()).await.err().unwrap();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let detail = detail_of(response).await;
        assert!(detail.starts_with("Solicitud inválida"));
        assert!(detail.contains("po_id"));
    }

    #[tokio::test]
    async fn missing_content_type_is_a_400() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/advances")
            .body(Body::from("{}"))
            .unwrap();

        let err = JsonBody::<NewAdvance>::from_request(request, &()).await.err().unwrap();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_query_is_a_json_400() {
        let (mut parts, _) = Request::builder()
            .uri("/api/advances?page=abc")
            .body(Body::empty())
            .unwrap()
            .into_parts();

        let err = QueryParams::<Listing>::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(detail_of(response).await.contains("page"));
    }

    #[tokio::test]
    async fn well_formed_requests_pass_through() {
        let po_id = Uuid::new_v4();
        let request = json_request(format!(r#"{{"po_id": "{}", "monto": 10.5}}"#, po_id));

        let JsonBody(payload) = JsonBody::<NewAdvance>::from_request(request, &()).await.unwrap();
        assert_eq!(payload.po_id, po_id);
        assert_eq!(payload.monto, 10.5);

        let (mut parts, _) = Request::builder()
            .uri("/api/advances?page=3")
            .body(Body::empty())
            .unwrap()
            .into_parts();
        let QueryParams(listing) = QueryParams::<Listing>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(listing.page, Some(3));
    }
}
