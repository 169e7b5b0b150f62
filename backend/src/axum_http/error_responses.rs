use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::usecases::billing_errors::BillingError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = Json(ErrorResponse {
        error: message.into(),
    });

    (status, body).into_response()
}

impl IntoResponse for BillingError {
    fn into_response(self) -> Response {
        // Internal variants never leak their source to the client.
        error_response(self.status_code(), self.public_message())
    }
}

/// Parses a JSON request body regardless of its `Content-Type`.
pub fn parse_json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, BillingError> {
    serde_json::from_slice(body)
        .map_err(|_| BillingError::InvalidRequest("Request body must be valid JSON.".to_string()))
}
