use axum::{http::StatusCode, response::IntoResponse};
use tracing::info;

use super::error_responses::error_response;

pub async fn not_found() -> impl IntoResponse {
    info!("backend router: not_found handler invoked");
    (StatusCode::NOT_FOUND, "NOT_FOUND").into_response()
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}

pub async fn method_not_allowed() -> impl IntoResponse {
    info!("backend router: method_not_allowed handler invoked");
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.")
}
