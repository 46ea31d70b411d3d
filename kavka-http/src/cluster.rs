//! `/v1/etcd/members`: a thin node-registry admin surface. The path is
//! kept for client compatibility; underneath there is no etcd cluster
//! to administer, just the broker's own node registry.

use crate::error::AppError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use kavka_broker::cluster::{self, NodeRecord};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct MemberRequest {
    group: String,
    host: String,
}

pub async fn list(State(state): State<AppState>) -> Result<Response, AppError> {
    let nodes = cluster::list(&state.broker, "")?;
    Ok(crate::envelope::ok_json(&nodes))
}

pub async fn add(
    State(state): State<AppState>,
    Json(body): Json<MemberRequest>,
) -> Result<Response, AppError> {
    let record: NodeRecord = cluster::upsert(&state.broker, &body.group, &body.host)?;
    Ok(crate::envelope::ok_json(&record))
}

pub async fn update(
    State(state): State<AppState>,
    Path(_member_id): Path<String>,
    Json(body): Json<MemberRequest>,
) -> Result<Response, AppError> {
    let record = cluster::upsert(&state.broker, &body.group, &body.host)?;
    Ok(crate::envelope::ok_json(&record))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
) -> Result<Response, AppError> {
    let (group, host) = member_id
        .split_once(':')
        .ok_or_else(|| AppError::bad_request("member id must be \"group:host\""))?;
    cluster::remove(&state.broker, group, host)?;
    Ok(crate::envelope::ok_raw(b"\"OK\"".to_vec()))
}
