//! The `{"data":..,"status":"success"|"error"}` envelope the JSON API
//! routes respond with. Raw binary routes (topic/blob reads) and the
//! liveness/landing routes are not wrapped.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

pub fn wrap(status: StatusCode, data: &[u8]) -> Response {
    let mut body = Vec::with_capacity(data.len() + 24);
    body.extend_from_slice(b"{\"data\":");
    if data.is_empty() {
        body.extend_from_slice(b"{}");
    } else {
        body.extend_from_slice(data);
    }
    let status_word = if status.is_client_error() || status.is_server_error() {
        "error"
    } else {
        "success"
    };
    body.extend_from_slice(format!(",\"status\":\"{status_word}\"}}").as_bytes());

    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// Wraps an already-serialized JSON success body.
pub fn ok_raw(data: Vec<u8>) -> Response {
    wrap(StatusCode::OK, &data)
}

/// Serializes `data` to JSON and wraps it as a success response.
pub fn ok_json<T: serde::Serialize>(data: &T) -> Response {
    let bytes = serde_json::to_vec(data).unwrap_or_else(|_| b"{}".to_vec());
    wrap(StatusCode::OK, &bytes)
}
