//! Typed key families for the five collections the broker keeps in its
//! metadata store: topics, queues, blobs, refs, and cluster membership.
//!
//! Each key has a canonical `Display` string (the form actually stored in
//! the KV) and a `FromStr` parser recovering the struct from it. Unset
//! numeric fields use the `-1` sentinel, matching the original's
//! `NoPartition`/`NoOffset`/`NoOrder` constants.

use kavka_digest::Digest;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

pub const NO_PARTITION: i64 = -1;
pub const NO_OFFSET: i64 = -1;
pub const NO_ORDER: i64 = -1;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("bad key {0:?}")]
pub struct BadKey(pub String);

fn topic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^/topics/(?P<topic>[A-Za-z0-9_-]+)(/(?P<partition>[0-9]+))?$").unwrap()
    })
}

fn queue_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^/queues/(?P<topic>[A-Za-z0-9_-]+)(/(?P<partition>[0-9]+)(/(?P<offset>[0-9]+))?)?$",
        )
        .unwrap()
    })
}

fn blob_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^/blobs/(?P<digest>[a-zA-Z0-9_+.-]+:[a-fA-F0-9]+)(/(?P<group>[^/]+)(/(?P<host>.+))?)?$",
        )
        .unwrap()
    })
}

fn refs_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^/refs/(?P<digest>[^/]+)(/(?P<topic>[^/]+)(/(?P<partition>[^/]+)(/(?P<offset>[^/]+)(/(?P<order>[^/]+))?)?)?)?$",
        )
        .unwrap()
    })
}

fn cluster_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/cluster/(?P<group>[^/]+)(/(?P<node>.+))?$").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopicKey {
    pub topic: String,
    pub partition: i64,
}

impl TopicKey {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            partition: NO_PARTITION,
        }
    }

    pub fn with_partition(topic: impl Into<String>, partition: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/topics")?;
        if !self.topic.is_empty() {
            write!(f, "/{}", self.topic)?;
        }
        if self.partition > NO_PARTITION {
            write!(f, "/{}", self.partition)?;
        }
        Ok(())
    }
}

impl FromStr for TopicKey {
    type Err = BadKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = topic_re().captures(s).ok_or_else(|| BadKey(s.to_string()))?;
        Ok(TopicKey {
            topic: caps["topic"].to_string(),
            partition: caps
                .name("partition")
                .map(|m| m.as_str().parse().unwrap())
                .unwrap_or(NO_PARTITION),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueKey {
    pub topic: String,
    pub partition: i64,
    pub offset: i64,
}

impl QueueKey {
    pub fn new(topic: impl Into<String>, partition: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset: NO_OFFSET,
        }
    }

    pub fn with_offset(topic: impl Into<String>, partition: i64, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
        }
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/queues")?;
        if !self.topic.is_empty() {
            write!(f, "/{}", self.topic)?;
        }
        if self.partition > NO_PARTITION {
            write!(f, "/{}", self.partition)?;
        }
        if self.offset > NO_OFFSET {
            write!(f, "/{:020}", self.offset)?;
        }
        Ok(())
    }
}

impl FromStr for QueueKey {
    type Err = BadKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = queue_re().captures(s).ok_or_else(|| BadKey(s.to_string()))?;
        Ok(QueueKey {
            topic: caps["topic"].to_string(),
            partition: caps
                .name("partition")
                .map(|m| m.as_str().parse().unwrap())
                .unwrap_or(NO_PARTITION),
            offset: caps
                .name("offset")
                .map(|m| m.as_str().parse().unwrap())
                .unwrap_or(NO_OFFSET),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlobKey {
    pub digest: Option<Digest>,
    pub group: String,
    pub host: String,
}

impl BlobKey {
    pub fn new(digest: Digest) -> Self {
        Self {
            digest: Some(digest),
            group: String::new(),
            host: String::new(),
        }
    }

    pub fn with_group(digest: Digest, group: impl Into<String>) -> Self {
        Self {
            digest: Some(digest),
            group: group.into(),
            host: String::new(),
        }
    }

    pub fn with_host(digest: Digest, group: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            digest: Some(digest),
            group: group.into(),
            host: host.into(),
        }
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/blobs")?;
        if let Some(digest) = &self.digest {
            write!(f, "/{}", digest)?;
        }
        if !self.group.is_empty() {
            write!(f, "/{}", self.group)?;
        }
        if !self.host.is_empty() {
            write!(f, "/{}", self.host)?;
        }
        Ok(())
    }
}

impl FromStr for BlobKey {
    type Err = BadKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = blob_re().captures(s).ok_or_else(|| BadKey(s.to_string()))?;
        let digest = caps["digest"]
            .parse::<Digest>()
            .map_err(|_| BadKey(s.to_string()))?;
        Ok(BlobKey {
            digest: Some(digest),
            group: caps.name("group").map(|m| m.as_str().to_string()).unwrap_or_default(),
            host: caps.name("host").map(|m| m.as_str().to_string()).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RefKey {
    pub digest: String,
    pub topic: String,
    pub partition: i64,
    pub offset: i64,
    pub order: i64,
}

impl RefKey {
    pub fn new(digest: impl Into<String>) -> Self {
        Self {
            digest: digest.into(),
            topic: String::new(),
            partition: NO_PARTITION,
            offset: NO_OFFSET,
            order: NO_ORDER,
        }
    }

    pub fn full(
        digest: impl Into<String>,
        topic: impl Into<String>,
        partition: i64,
        offset: i64,
        order: i64,
    ) -> Self {
        Self {
            digest: digest.into(),
            topic: topic.into(),
            partition,
            offset,
            order,
        }
    }
}

impl fmt::Display for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/refs")?;
        if !self.digest.is_empty() {
            write!(f, "/{}", self.digest)?;
        }
        if !self.topic.is_empty() {
            write!(f, "/{}", self.topic)?;
        }
        if self.partition > NO_PARTITION {
            write!(f, "/{}", self.partition)?;
        }
        if self.offset > NO_OFFSET {
            write!(f, "/{:020}", self.offset)?;
        }
        if self.order > NO_ORDER {
            write!(f, "/{:020}", self.order)?;
        }
        Ok(())
    }
}

impl FromStr for RefKey {
    type Err = BadKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = refs_re().captures(s).ok_or_else(|| BadKey(s.to_string()))?;
        Ok(RefKey {
            digest: caps.name("digest").map(|m| m.as_str().to_string()).unwrap_or_default(),
            topic: caps.name("topic").map(|m| m.as_str().to_string()).unwrap_or_default(),
            partition: caps
                .name("partition")
                .map(|m| m.as_str().parse().unwrap_or(NO_PARTITION))
                .unwrap_or(NO_PARTITION),
            offset: caps
                .name("offset")
                .map(|m| m.as_str().parse().unwrap_or(NO_OFFSET))
                .unwrap_or(NO_OFFSET),
            order: caps
                .name("order")
                .map(|m| m.as_str().parse().unwrap_or(NO_ORDER))
                .unwrap_or(NO_ORDER),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterKey {
    pub group: String,
    pub node: String,
}

impl ClusterKey {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            node: String::new(),
        }
    }

    pub fn with_node(group: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            node: node.into(),
        }
    }
}

impl fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/cluster")?;
        if !self.group.is_empty() {
            write!(f, "/{}", self.group)?;
        }
        if !self.node.is_empty() {
            write!(f, "/{}", self.node)?;
        }
        Ok(())
    }
}

impl FromStr for ClusterKey {
    type Err = BadKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = cluster_re().captures(s).ok_or_else(|| BadKey(s.to_string()))?;
        Ok(ClusterKey {
            group: caps["group"].to_string(),
            node: caps.name("node").map(|m| m.as_str().to_string()).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_key_roundtrip() {
        let key = TopicKey::with_partition("events", 3);
        let parsed: TopicKey = key.to_string().parse().unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn queue_key_pads_offset() {
        let key = QueueKey::with_offset("events", 0, 42);
        assert_eq!(key.to_string(), "/queues/events/0/00000000000000000042");
        let parsed: QueueKey = key.to_string().parse().unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn queue_key_without_offset_has_no_trailing_sentinel() {
        let key = QueueKey::new("events", 0);
        assert_eq!(key.to_string(), "/queues/events/0");
    }

    #[test]
    fn blob_key_roundtrip() {
        let digest = kavka_digest::hash(b"hello");
        let key = BlobKey::with_host(digest, "grp", "host-a");
        let parsed: BlobKey = key.to_string().parse().unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn ref_key_roundtrip() {
        let key = RefKey::full("sha256:abcd", "events", 0, 7, 0);
        let parsed: RefKey = key.to_string().parse().unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn cluster_key_roundtrip() {
        let key = ClusterKey::with_node("default", "node-a");
        let parsed: ClusterKey = key.to_string().parse().unwrap();
        assert_eq!(key, parsed);
    }
}
