//! NATS JetStream remote API
//!
//! The lifecycle code talks to the server only through [`JetStreamApi`],
//! obtained from a [`Connector`]. The production implementation is a thin
//! layer over the `async-nats` JetStream context.

pub mod auth;
pub mod client;
pub mod types;

pub use auth::{ConnectionConfig, JetStreamConnector, TlsConfig};
pub use client::JetStreamClient;

use crate::error::RemoteError;
use async_trait::async_trait;
use types::{ConsumerConfig, KvBucketConfig, KvEntry, StreamConfig, StreamTemplateConfig};

/// Result of a remote call
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Operations the engine needs from a live JetStream session
///
/// Existence checks return `Ok(false)` for absent resources and reserve
/// `Err` for failures; loads of absent resources fail with a not-found API
/// error.
#[async_trait]
pub trait JetStreamApi: Send + Sync {
    // Streams
    async fn stream_exists(&self, name: &str) -> RemoteResult<bool>;
    async fn load_stream(&self, name: &str) -> RemoteResult<StreamConfig>;
    async fn create_stream(&self, config: &StreamConfig) -> RemoteResult<()>;
    async fn update_stream(&self, config: &StreamConfig) -> RemoteResult<()>;
    async fn delete_stream(&self, name: &str) -> RemoteResult<()>;

    // Consumers, keyed by stream and durable name
    async fn consumer_exists(&self, stream: &str, durable: &str) -> RemoteResult<bool>;
    async fn load_consumer(&self, stream: &str, durable: &str) -> RemoteResult<ConsumerConfig>;
    /// Create only, failing when the consumer already exists
    async fn create_consumer(&self, stream: &str, config: &ConsumerConfig) -> RemoteResult<()>;
    async fn update_consumer(&self, stream: &str, config: &ConsumerConfig) -> RemoteResult<()>;
    async fn delete_consumer(&self, stream: &str, durable: &str) -> RemoteResult<()>;

    // Stream templates have no in-place update
    async fn template_exists(&self, name: &str) -> RemoteResult<bool>;
    async fn load_template(&self, name: &str) -> RemoteResult<StreamTemplateConfig>;
    async fn create_template(&self, config: &StreamTemplateConfig) -> RemoteResult<()>;
    async fn delete_template(&self, name: &str) -> RemoteResult<()>;

    // Key-value buckets
    async fn kv_bucket_exists(&self, bucket: &str) -> RemoteResult<bool>;
    async fn load_kv_bucket(&self, bucket: &str) -> RemoteResult<KvBucketConfig>;
    async fn create_kv_bucket(&self, config: &KvBucketConfig) -> RemoteResult<()>;
    async fn update_kv_bucket(&self, config: &KvBucketConfig) -> RemoteResult<()>;
    async fn delete_kv_bucket(&self, bucket: &str) -> RemoteResult<()>;

    // Key-value entries
    async fn kv_entry_exists(&self, bucket: &str, key: &str) -> RemoteResult<bool>;
    async fn load_kv_entry(&self, bucket: &str, key: &str) -> RemoteResult<KvEntry>;
    /// Store a new value, returning its revision
    async fn put_kv_entry(&self, bucket: &str, key: &str, value: &[u8]) -> RemoteResult<u64>;
    async fn delete_kv_entry(&self, bucket: &str, key: &str) -> RemoteResult<()>;

    /// Release the session
    async fn close(&self);
}

/// Factory for sessions
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: JetStreamApi;

    async fn connect(&self) -> RemoteResult<Self::Session>;
}
