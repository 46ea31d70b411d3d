//! `/v1/info/topics`: partition listings and per-partition offset
//! windows, used by clients to discover what's available before
//! reading.

use crate::error::AppError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::response::Response;
use kavka_broker::queue::corner_offsets;
use kavka_meta::keys::TopicKey;
use kavka_meta::SortOrder;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
struct PartitionInfo {
    topic: String,
    partition: i64,
    offsetfrom: i64,
    offsetto: i64,
}

#[derive(Serialize)]
struct TopicCount {
    topic: String,
    partitions: i64,
}

async fn partitions_for(state: &AppState, topic: &str) -> Result<Vec<PartitionInfo>, AppError> {
    let broker = &state.broker;
    let prefix = TopicKey::new(topic);
    let records = broker.meta.list(&prefix.to_string(), SortOrder::Ascend)?;

    let mut info = Vec::with_capacity(records.len());
    for entry in records {
        let key: TopicKey = entry.key.parse()?;
        let (offsetfrom, offsetto) = corner_offsets(broker, &key.topic, key.partition)?;
        info.push(PartitionInfo {
            topic: key.topic,
            partition: key.partition,
            offsetfrom,
            offsetto,
        });
    }
    Ok(info)
}

pub async fn for_topic(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Result<Response, AppError> {
    let info = partitions_for(&state, &topic).await?;
    Ok(crate::envelope::ok_json(&info))
}

pub async fn for_partition(
    State(state): State<AppState>,
    Path((topic, partition)): Path<(String, i64)>,
) -> Result<Response, AppError> {
    let (offsetfrom, offsetto) = corner_offsets(&state.broker, &topic, partition)?;
    Ok(crate::envelope::ok_json(&PartitionInfo {
        topic,
        partition,
        offsetfrom,
        offsetto,
    }))
}

/// Topic name and partition count, matching the original's topics
/// summary endpoint's `[{"topic":..,"partitions":..}]` array.
pub async fn topics(State(state): State<AppState>) -> Result<Response, AppError> {
    let broker = &state.broker;
    let prefix = TopicKey::new("");
    let records = broker.meta.list(&prefix.to_string(), SortOrder::Ascend)?;

    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for entry in records {
        let key: TopicKey = entry.key.parse()?;
        *counts.entry(key.topic).or_insert(0) += 1;
    }

    let info: Vec<TopicCount> = counts
        .into_iter()
        .map(|(topic, partitions)| TopicCount { topic, partitions })
        .collect();

    Ok(crate::envelope::ok_json(&info))
}
