//! `/v1/blobs/{digest}`: raw chunk bytes, used by peers syncing.

use crate::error::AppError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use kavka_digest::Digest;
use kavka_store::Error as StoreError;

pub async fn get(
    State(state): State<AppState>,
    Path(digest): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let digest: Digest = digest
        .parse()
        .map_err(|e: kavka_digest::Error| AppError::bad_request(format!("Bad digest: {e}")))?;

    let data = state.broker.store.read(&digest).await.map_err(|e| match e {
        StoreError::BlobUnknown(d) => AppError::not_found(format!("Not found: {d}")),
        other => AppError::internal(other),
    })?;

    Ok(data)
}
