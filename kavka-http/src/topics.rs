//! `/v1/topics/{topic}/{partition}`: raw message read and append.

use crate::error::AppError;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use kavka_broker::message::MessageInfo;
use kavka_broker::queue::{corner_offsets, create_queue};
use kavka_broker::{Broker, Error};
use kavka_meta::keys::{QueueKey, TopicKey};
use std::collections::HashMap;

/// Resolves the effective `offset` and `relative` query params against
/// a partition's corner offsets, the way the original's `offset`/
/// `relative` handling does.
fn resolve_offset(
    params: &HashMap<String, String>,
    oldest: i64,
    newest: i64,
) -> i64 {
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

pub(crate) async fn ensure_topic_exists(broker: &Broker, topic: &str, partition: i64) -> Result<(), Error> {
    let key = TopicKey::with_partition(topic, partition);
    if broker.meta.get(&key.to_string())?.is_some() {
        return Ok(());
    }
    if !broker.topic.allow_topics_creation {
        return Err(Error::TopicNotFound);
    }
    let now = Utc::now().to_rfc3339();
    match broker.meta.create(&key.to_string(), &now) {
        Ok(()) | Err(kavka_meta::Error::AlreadyExists) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub async fn get(
    State(state): State<AppState>,
    Path((topic, partition)): Path<(String, i64)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
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

    let key = QueueKey::with_offset(&topic, partition, offset);
    let entry = broker
        .meta
        .get(&key.to_string())?
        .ok_or(Error::MessageNotFound)?;
    let msg = MessageInfo::from_json(&entry.value)?;

    let mut buf = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buf);
    msg.copy_out(broker, &mut cursor).await?;

    Ok(buf)
}

pub async fn post(
    State(state): State<AppState>,
    Path((topic, partition)): Path<(String, i64)>,
    body: Bytes,
) -> Result<Response, AppError> {
    let broker = &state.broker;
    ensure_topic_exists(broker, &topic, partition).await?;

    if broker.topic.max_message_size > 0 && body.len() as u64 > broker.topic.max_message_size {
        return Err(AppError::bad_request("message exceeds max-message-size"));
    }

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
