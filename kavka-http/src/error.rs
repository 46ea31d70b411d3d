//! The two JSON error envelopes the API responds with: a generic
//! `{status,title,detail}` shape, and a dedicated out-of-range shape
//! carrying the partition's valid offset window.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kavka_broker::Error as BrokerError;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ApiError {
    status: u16,
    title: String,
    detail: String,
}

#[derive(Debug, Serialize)]
struct OutOfRangeError {
    code: u16,
    message: String,
    topic: String,
    partition: i64,
    offsetfrom: i64,
    offsetto: i64,
}

/// An API-level error, carrying enough context to render either JSON
/// envelope shape.
#[derive(Debug)]
pub enum AppError {
    Status(StatusCode, String),
    OutOfRange {
        topic: String,
        partition: i64,
        from: i64,
        to: i64,
    },
}

impl AppError {
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        AppError::Status(StatusCode::INTERNAL_SERVER_ERROR, detail.to_string())
    }

    pub fn bad_request(detail: impl std::fmt::Display) -> Self {
        AppError::Status(StatusCode::BAD_REQUEST, detail.to_string())
    }

    pub fn not_found(detail: impl std::fmt::Display) -> Self {
        AppError::Status(StatusCode::NOT_FOUND, detail.to_string())
    }
}

impl From<kavka_meta::Error> for AppError {
    fn from(err: kavka_meta::Error) -> Self {
        AppError::internal(err)
    }
}

impl From<BrokerError> for AppError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::OffsetOutOfRange { from, to } => AppError::OutOfRange {
                topic: String::new(),
                partition: -1,
                from,
                to,
            },
            BrokerError::BlobNotFound(digest) => AppError::not_found(format!("Not found: {digest}")),
            BrokerError::TopicNotFound => AppError::bad_request(&err),
            BrokerError::BadDigest(_) => AppError::bad_request(&err),
            other => AppError::internal(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Status(status, detail) => {
                let body = ApiError {
                    status: status.as_u16(),
                    title: status.canonical_reason().unwrap_or("Error").to_string(),
                    detail,
                };
                let bytes = serde_json::to_vec(&body).unwrap_or_default();
                crate::envelope::wrap(status, &bytes)
            }
            AppError::OutOfRange {
                topic,
                partition,
                from,
                to,
            } => {
                let status = StatusCode::RANGE_NOT_SATISFIABLE;
                let body = OutOfRangeError {
                    code: status.as_u16(),
                    message: format!("Offset out of range ({from}, {to})"),
                    topic,
                    partition,
                    offsetfrom: from,
                    offsetto: to,
                };
                let bytes = serde_json::to_vec(&body).unwrap_or_default();
                crate::envelope::wrap(status, &bytes)
            }
        }
    }
}
