//! The HTTP surface: reading and writing partitioned queues, reading
//! stored blobs, partition/topic introspection, and a thin
//! cluster-membership admin surface, all built on [`kavka_broker::Broker`].

mod blobs;
mod cluster;
mod envelope;
mod error;
mod info;
mod json;
mod landing;
mod ping;
mod query;
mod topics;

use axum::routing::{get, post};
use axum::Router;
use kavka_broker::Broker;

#[derive(Clone)]
pub struct AppState {
    pub broker: Broker,
}

impl AppState {
    pub fn new(broker: Broker) -> Self {
        Self { broker }
    }
}

/// Builds the full route table. The caller attaches its own state,
/// tracing, and connection layers before serving.
pub fn gen_router() -> Router<AppState> {
    Router::new()
        .route("/v1/topics/:topic/:partition", get(topics::get).post(topics::post))
        .route("/v1/json/topics/:topic/:partition", get(json::get).post(json::post))
        .route("/v1/blobs/:digest", get(blobs::get))
        .route("/v1/info/topics", get(info::topics))
        .route("/v1/info/topics/:topic", get(info::for_topic))
        .route("/v1/info/topics/:topic/:partition", get(info::for_partition))
        .route("/ping", get(ping::get))
        .route("/v1/etcd/members", get(cluster::list).post(cluster::add))
        .route(
            "/v1/etcd/members/:member_id",
            post(cluster::update).delete(cluster::delete),
        )
        .fallback(landing::get)
}
