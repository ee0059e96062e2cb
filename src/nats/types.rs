//! JetStream configuration types
//!
//! Streams and consumers are configured with the `async-nats` types as they
//! are. Stream templates are not modelled by the client library and get
//! their own document here; key-value buckets get a record of the settings
//! the engine manages, translated to and from the bucket's backing stream.

use async_nats::jetstream::kv;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use async_nats::jetstream::consumer::{
    AckPolicy, Config as ConsumerConfig, DeliverPolicy, ReplayPolicy,
};
pub use async_nats::jetstream::stream::{
    Compression, Config as StreamConfig, ConsumerLimits, DiscardPolicy, External, Placement,
    Republish, RetentionPolicy, Source, StorageType, SubjectTransform,
};

/// Prefix of the stream backing a key-value bucket
pub const KV_STREAM_PREFIX: &str = "KV_";

/// Stream template document, as sent to and reported by the server
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamTemplateConfig {
    pub name: String,
    pub max_streams: u32,
    pub config: StreamConfig,
}

/// Settings of a key-value bucket
///
/// `max_age` of zero keeps values forever.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct KvBucketConfig {
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub history: i64,
    pub max_age: Duration,
    pub max_value_size: i32,
    pub max_bytes: i64,
    pub storage: StorageType,
    pub num_replicas: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
}

impl KvBucketConfig {
    /// Name of the stream holding the bucket
    pub fn stream_name(&self) -> String {
        format!("{}{}", KV_STREAM_PREFIX, self.bucket)
    }

    /// Configuration handed to `create_key_value`
    pub fn to_kv_config(&self) -> kv::Config {
        kv::Config {
            bucket: self.bucket.clone(),
            description: self.description.clone().unwrap_or_default(),
            max_value_size: self.max_value_size,
            history: self.history,
            max_age: self.max_age,
            max_bytes: self.max_bytes,
            storage: self.storage,
            num_replicas: self.num_replicas,
            placement: self.placement.clone(),
            ..kv::Config::default()
        }
    }

    /// Settings read back from the backing stream
    pub fn from_stream(config: &StreamConfig) -> Self {
        Self {
            bucket: config
                .name
                .strip_prefix(KV_STREAM_PREFIX)
                .unwrap_or(&config.name)
                .to_string(),
            description: config.description.clone().filter(|d| !d.is_empty()),
            history: config.max_messages_per_subject,
            max_age: config.max_age,
            max_value_size: config.max_message_size,
            max_bytes: config.max_bytes,
            storage: config.storage,
            num_replicas: config.num_replicas,
            placement: config.placement.clone(),
        }
    }

    /// Overlay the managed settings on the backing stream configuration
    ///
    /// Everything the client library sets up for a bucket (subjects, rollup,
    /// direct get, discard policy) is left as the server reports it.
    pub fn apply_to_stream(&self, stream: &mut StreamConfig) {
        stream.description = self.description.clone();
        stream.max_messages_per_subject = self.history;
        stream.max_age = self.max_age;
        stream.max_message_size = self.max_value_size;
        stream.max_bytes = self.max_bytes;
        stream.num_replicas = self.num_replicas;
        stream.placement = self.placement.clone();
    }
}

/// Latest value stored under a key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvEntry {
    pub bucket: String,
    pub key: String,
    pub value: Vec<u8>,
    pub revision: u64,
}

/// Push consumers deliver to a subject, pull consumers wait for requests
pub fn is_push(config: &ConsumerConfig) -> bool {
    config.deliver_subject.is_some()
}
