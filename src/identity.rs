//! Resource identities
//!
//! Every managed resource is addressed by an opaque string built from its
//! natural keys, e.g. `JETSTREAM_STREAM_ORDERS` or
//! `JETSTREAM_STREAM_ORDERS_CONSUMER_PROCESSOR`. Previously stored identities
//! must keep decoding, so the formats are fixed.
//!
//! Names may contain the structural tokens themselves (`_`, `STREAM_`,
//! `_CONSUMER_`), so decoding anchors on the fixed prefix and captures the
//! remainder instead of splitting on a separator. Two-key identities match
//! the first key non-greedily: the first occurrence of the infix token ends
//! it and everything after belongs to the second key.

use crate::error::{Error, Result};
use crate::resource::ResourceKind;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Namespace token in front of every identity
pub const NAMESPACE: &str = "JETSTREAM_";

/// Decoded identity of a managed resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Stream { name: String },
    Consumer { stream: String, durable: String },
    StreamTemplate { name: String },
    KvBucket { bucket: String },
    KvEntry { bucket: String, key: String },
}

struct Patterns {
    stream: Regex,
    consumer: Regex,
    template: Regex,
    kv_bucket: Regex,
    kv_entry: Regex,
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .unwrap_or_else(|e| panic!("Invalid identity pattern {}: {}", pattern, e))
        };
        // (?s) so that keys containing newlines still decode
        Patterns {
            stream: compile(r"(?s)^JETSTREAM_STREAM_(.+)$"),
            consumer: compile(r"(?s)^JETSTREAM_STREAM_(.+?)_CONSUMER_(.+)$"),
            template: compile(r"(?s)^JETSTREAM_STREAMTEMPLATE_(.+)$"),
            kv_bucket: compile(r"(?s)^JETSTREAM_KV_(.+)$"),
            kv_entry: compile(r"(?s)^JETSTREAM_KV_(.+?)_ENTRY_(.+)$"),
        }
    })
}

impl Identity {
    pub fn stream(name: &str) -> Self {
        Self::Stream {
            name: name.to_string(),
        }
    }

    pub fn consumer(stream: &str, durable: &str) -> Self {
        Self::Consumer {
            stream: stream.to_string(),
            durable: durable.to_string(),
        }
    }

    pub fn stream_template(name: &str) -> Self {
        Self::StreamTemplate {
            name: name.to_string(),
        }
    }

    pub fn kv_bucket(bucket: &str) -> Self {
        Self::KvBucket {
            bucket: bucket.to_string(),
        }
    }

    pub fn kv_entry(bucket: &str, key: &str) -> Self {
        Self::KvEntry {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    /// Kind of resource this identity addresses
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Stream { .. } => ResourceKind::Stream,
            Self::Consumer { .. } => ResourceKind::Consumer,
            Self::StreamTemplate { .. } => ResourceKind::StreamTemplate,
            Self::KvBucket { .. } => ResourceKind::KvBucket,
            Self::KvEntry { .. } => ResourceKind::KvEntry,
        }
    }

    /// Encode into the stored identity string
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode an identity of the given kind
    ///
    /// Decoding is directed by kind: `JETSTREAM_STREAM_A_CONSUMER_B` is both
    /// a valid stream identity (stream `A_CONSUMER_B`) and a valid consumer
    /// identity, and only the caller knows which resource it stored.
    pub fn decode(kind: ResourceKind, identity: &str) -> Result<Self> {
        let p = patterns();

        let decoded = match kind {
            ResourceKind::Stream => p
                .stream
                .captures(identity)
                .map(|c| Self::stream(&c[1])),
            ResourceKind::Consumer => p
                .consumer
                .captures(identity)
                .map(|c| Self::consumer(&c[1], &c[2])),
            ResourceKind::StreamTemplate => p
                .template
                .captures(identity)
                .map(|c| Self::stream_template(&c[1])),
            ResourceKind::KvBucket => p
                .kv_bucket
                .captures(identity)
                .map(|c| Self::kv_bucket(&c[1])),
            ResourceKind::KvEntry => p
                .kv_entry
                .captures(identity)
                .map(|c| Self::kv_entry(&c[1], &c[2])),
        };

        decoded.ok_or_else(|| invalid(kind, identity))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream { name } => write!(f, "{}STREAM_{}", NAMESPACE, name),
            Self::Consumer { stream, durable } => {
                write!(f, "{}STREAM_{}_CONSUMER_{}", NAMESPACE, stream, durable)
            },
            Self::StreamTemplate { name } => write!(f, "{}STREAMTEMPLATE_{}", NAMESPACE, name),
            Self::KvBucket { bucket } => write!(f, "{}KV_{}", NAMESPACE, bucket),
            Self::KvEntry { bucket, key } => write!(f, "{}KV_{}_ENTRY_{}", NAMESPACE, bucket, key),
        }
    }
}

fn invalid(kind: ResourceKind, identity: &str) -> Error {
    Error::InvalidIdentity {
        kind,
        identity: identity.to_string(),
    }
}

/// Decode a stream identity into the stream name
pub fn parse_stream_id(identity: &str) -> Result<String> {
    match Identity::decode(ResourceKind::Stream, identity)? {
        Identity::Stream { name } => Ok(name),
        _ => Err(invalid(ResourceKind::Stream, identity)),
    }
}

/// Decode a consumer identity into stream and durable name
pub fn parse_consumer_id(identity: &str) -> Result<(String, String)> {
    match Identity::decode(ResourceKind::Consumer, identity)? {
        Identity::Consumer { stream, durable } => Ok((stream, durable)),
        _ => Err(invalid(ResourceKind::Consumer, identity)),
    }
}

/// Decode a stream template identity into the template name
pub fn parse_template_id(identity: &str) -> Result<String> {
    match Identity::decode(ResourceKind::StreamTemplate, identity)? {
        Identity::StreamTemplate { name } => Ok(name),
        _ => Err(invalid(ResourceKind::StreamTemplate, identity)),
    }
}

/// Decode a bucket identity into the bucket name
pub fn parse_kv_bucket_id(identity: &str) -> Result<String> {
    match Identity::decode(ResourceKind::KvBucket, identity)? {
        Identity::KvBucket { bucket } => Ok(bucket),
        _ => Err(invalid(ResourceKind::KvBucket, identity)),
    }
}

/// Decode an entry identity into bucket and key
pub fn parse_kv_entry_id(identity: &str) -> Result<(String, String)> {
    match Identity::decode(ResourceKind::KvEntry, identity)? {
        Identity::KvEntry { bucket, key } => Ok((bucket, key)),
        _ => Err(invalid(ResourceKind::KvEntry, identity)),
    }
}
