//! `/v1/json/topics/{topic}/{partition}`: the same queue, but reads
//! return a JSON envelope listing a range of messages, and writes
//! require the body to already be JSON.

use crate::error::AppError;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use kavka_broker::message::MessageInfo;
use kavka_broker::queue::{corner_offsets, create_queue};
use kavka_meta::keys::QueueKey;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Serialize)]
struct QueryInfo {
    topic: String,
    partition: i64,
    offset: i64,
}

fn resolve_offset(params: &HashMap<String, String>, oldest: i64, newest: i64) -> i64 {
    if crate::query::present(params, "relative") {
        let relative = crate::query::get_i64(params, "relative", 0);
        if relative >= 0 {
            oldest + relative
        } else {
            newest + relative
        }
    } else if crate::query::present(params, "offset") {
        crate::query::get_i64(params, "offset", 0)
    } else {
        oldest
    }
}

pub async fn get(
    State(state): State<AppState>,
    Path((topic, partition)): Path<(String, i64)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let broker = &state.broker;
    let (oldest, newest) = corner_offsets(broker, &topic, partition)?;
    let offset = resolve_offset(&params, oldest, newest);

    if offset < oldest || offset >= newest {
        return Err(AppError::OutOfRange {
            topic,
            partition,
            from: oldest,
            to: newest,
        });
    }

    let length = params
        .get("limit")
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(1);

    let first = QueueKey::with_offset(&topic, partition, offset);
    let last_offset = (offset + length).min(newest);
    let last = QueueKey::with_offset(&topic, partition, last_offset);

    let query = QueryInfo {
        topic: topic.clone(),
        partition,
        offset,
    };
    let query_json = serde_json::to_string(&query)?;

    let records = match broker.meta.list_range(&first.to_string(), &last.to_string()) {
        Ok(records) => records,
        Err(kavka_meta::Error::NotFound) => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    let mut out = Vec::new();
    out.extend_from_slice(b"{\"query\":");
    out.extend_from_slice(query_json.as_bytes());
    out.extend_from_slice(b",\"messages\":[");

    for (i, entry) in records.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        let msg = MessageInfo::from_json(&entry.value)?;
        let mut body = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut body);
        msg.copy_out(broker, &mut cursor).await?;
        out.extend_from_slice(&body);
    }

    out.extend_from_slice(b"]}");
    Ok(crate::envelope::ok_raw(out))
}

pub async fn post(
    State(state): State<AppState>,
    Path((topic, partition)): Path<(String, i64)>,
    body: Bytes,
) -> Result<Response, AppError> {
    let broker = &state.broker;

    if serde_json::from_slice::<serde_json::Value>(&body).is_err() {
        return Err(AppError::bad_request("Message must be JSON"));
    }

    crate::topics::ensure_topic_exists(broker, &topic, partition).await?;

    let mut msg = MessageInfo::new();
    msg.copy_in(broker, std::io::Cursor::new(body.to_vec())).await?;

    let value = msg.to_json()?;
    let key = create_queue(broker, &topic, partition, &value)?;
    msg.make_refs(broker, &topic, partition, key.offset)?;

    let data = format!(
        r#"{{"topic": "{}", "partition": {}, "offset": {}}}"#,
        topic, partition, key.offset
    );
    Ok(crate::envelope::ok_raw(data.into_bytes()))
}

