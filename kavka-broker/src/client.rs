//! Minimal HTTP client for pulling blobs from peer nodes, used by the
//! syncer to backfill chunks this node doesn't have locally.

use crate::Error;
use bytes::Bytes;
use kavka_digest::Digest;
use std::time::Duration;

pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(host: &str, port: u16) -> Self {
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{host}:{port}")
        };
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .build()
            .unwrap_or_default();
        Self { base_url, http }
    }

    pub async fn ping(&self, digest: &Digest) -> Result<bool, Error> {
        let url = format!("{}/ping/{}", self.base_url, digest);
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Sync(e.to_string()))?;
        Ok(resp.status().is_success())
    }

    pub async fn get_blob(&self, digest: &Digest) -> Result<Bytes, Error> {
        let url = format!("{}/v1/blobs/{}", self.base_url, digest);
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Sync(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::BlobNotFound(digest.to_string()));
        }

        resp.bytes().await.map_err(|e| Error::Sync(e.to_string()))
    }
}
