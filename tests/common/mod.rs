//! In-memory JetStream used by the integration tests
//!
//! Behaves like a server for the subset of the API the engine uses: absent
//! resources produce the real not-found codes, consumer create collides
//! with existing consumers, and every stream gets server-managed `_nats.`
//! metadata injected the way a live server does. Settings a server fills in
//! when they are left at zero are filled in the same way. Every call is
//! recorded.

#![allow(dead_code)]

use async_trait::async_trait;
use jsreconcile::error::{ApiError, RemoteError};
use jsreconcile::nats::types::{
    is_push, ConsumerConfig, KvBucketConfig, KvEntry, StreamConfig, StreamTemplateConfig,
};
use jsreconcile::nats::{Connector, JetStreamApi, RemoteResult};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Metadata key a live server adds to every stream
pub const SERVER_METADATA_KEY: &str = "_nats.req.level";

/// Duplicate window a server applies when none is given
pub const SERVER_DUPLICATE_WINDOW: Duration = Duration::from_secs(120);

/// Waiting pull requests a server allows when none are given
pub const SERVER_MAX_WAITING: i64 = 512;

/// Ack wait a server applies when none is given
pub const SERVER_ACK_WAIT: Duration = Duration::from_secs(30);

const STREAM_NOT_FOUND: u64 = 10059;
const STREAM_NAME_EXIST: u64 = 10058;
const CONSUMER_NOT_FOUND: u64 = 10014;
const TEMPLATE_NOT_FOUND: u64 = 10068;

#[derive(Debug, Default)]
pub struct State {
    pub streams: BTreeMap<String, StreamConfig>,
    pub consumers: BTreeMap<(String, String), ConsumerConfig>,
    pub templates: BTreeMap<String, StreamTemplateConfig>,
    pub buckets: BTreeMap<String, KvBucketConfig>,
    pub entries: BTreeMap<(String, String), KvEntry>,
    pub revision: u64,
    pub calls: Vec<String>,
    pub connects: usize,
    pub closes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FakeJetStream {
    state: Arc<Mutex<State>>,
}

/// API error as the server sends it
pub fn api_error(code: u16, err_code: u64, description: &str) -> RemoteError {
    let error: ApiError = serde_json::from_value(json!({
        "code": code,
        "err_code": err_code,
        "description": description,
    }))
    .unwrap();
    RemoteError::Api(error)
}

/// Fill in what a server substitutes for zero stream settings
fn stream_defaults(config: &mut StreamConfig) {
    if config.duplicate_window.is_zero() && config.mirror.is_none() {
        let capped = !config.max_age.is_zero() && config.max_age < SERVER_DUPLICATE_WINDOW;
        config.duplicate_window = if capped {
            config.max_age
        } else {
            SERVER_DUPLICATE_WINDOW
        };
    }
}

/// Fill in what a server substitutes for zero consumer settings
fn consumer_defaults(config: &mut ConsumerConfig) {
    if config.ack_wait.is_zero() {
        config.ack_wait = SERVER_ACK_WAIT;
    }
    if !is_push(config) && config.max_waiting == 0 {
        config.max_waiting = SERVER_MAX_WAITING;
    }
}

fn stream_not_found() -> RemoteError {
    api_error(404, STREAM_NOT_FOUND, "stream not found")
}

impl FakeJetStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: String) -> MutexGuard<'_, State> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }

    /// Calls recorded since the last [`FakeJetStream::clear_calls`]
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// True when any recorded call starts with `prefix`
    pub fn called(&self, prefix: &str) -> bool {
        self.state().calls.iter().any(|c| c.starts_with(prefix))
    }

    // Out-of-band changes, bypassing the call log

    pub fn remove_stream(&self, name: &str) {
        let mut state = self.state();
        state.streams.remove(name);
        state.consumers.retain(|(stream, _), _| stream != name);
    }

    pub fn remove_consumer(&self, stream: &str, durable: &str) {
        self.state()
            .consumers
            .remove(&(stream.to_string(), durable.to_string()));
    }

    pub fn insert_stream(&self, config: StreamConfig) {
        self.state().streams.insert(config.name.clone(), config);
    }

    pub fn insert_consumer(&self, stream: &str, config: ConsumerConfig) {
        let durable = config.durable_name.clone().unwrap_or_default();
        self.state()
            .consumers
            .insert((stream.to_string(), durable), config);
    }

    pub fn stream(&self, name: &str) -> Option<StreamConfig> {
        self.state().streams.get(name).cloned()
    }

    pub fn consumer(&self, stream: &str, durable: &str) -> Option<ConsumerConfig> {
        self.state()
            .consumers
            .get(&(stream.to_string(), durable.to_string()))
            .cloned()
    }
}

#[async_trait]
impl JetStreamApi for FakeJetStream {
    async fn stream_exists(&self, name: &str) -> RemoteResult<bool> {
        Ok(self
            .record(format!("stream_exists {}", name))
            .streams
            .contains_key(name))
    }

    async fn load_stream(&self, name: &str) -> RemoteResult<StreamConfig> {
        self.record(format!("load_stream {}", name))
            .streams
            .get(name)
            .cloned()
            .ok_or_else(stream_not_found)
    }

    async fn create_stream(&self, config: &StreamConfig) -> RemoteResult<()> {
        let mut state = self.record(format!("create_stream {}", config.name));
        if state.streams.contains_key(&config.name) {
            return Err(api_error(400, STREAM_NAME_EXIST, "stream name already in use"));
        }
        let mut stored = config.clone();
        stream_defaults(&mut stored);
        stored
            .metadata
            .insert(SERVER_METADATA_KEY.to_string(), "1".to_string());
        state.streams.insert(config.name.clone(), stored);
        Ok(())
    }

    async fn update_stream(&self, config: &StreamConfig) -> RemoteResult<()> {
        let mut state = self.record(format!("update_stream {}", config.name));
        let Some(current) = state.streams.get_mut(&config.name) else {
            return Err(stream_not_found());
        };
        let server_keys: Vec<(String, String)> = current
            .metadata
            .iter()
            .filter(|(k, _)| k.starts_with("_nats."))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        *current = config.clone();
        stream_defaults(current);
        current.metadata.extend(server_keys);
        Ok(())
    }

    async fn delete_stream(&self, name: &str) -> RemoteResult<()> {
        let mut state = self.record(format!("delete_stream {}", name));
        if state.streams.remove(name).is_none() {
            return Err(stream_not_found());
        }
        state.consumers.retain(|(stream, _), _| stream != name);
        Ok(())
    }

    async fn consumer_exists(&self, stream: &str, durable: &str) -> RemoteResult<bool> {
        let state = self.record(format!("consumer_exists {} {}", stream, durable));
        if !state.streams.contains_key(stream) {
            return Ok(false);
        }
        Ok(state
            .consumers
            .contains_key(&(stream.to_string(), durable.to_string())))
    }

    async fn load_consumer(&self, stream: &str, durable: &str) -> RemoteResult<ConsumerConfig> {
        self.record(format!("load_consumer {} {}", stream, durable))
            .consumers
            .get(&(stream.to_string(), durable.to_string()))
            .cloned()
            .ok_or_else(|| api_error(404, CONSUMER_NOT_FOUND, "consumer not found"))
    }

    async fn create_consumer(&self, stream: &str, config: &ConsumerConfig) -> RemoteResult<()> {
        let durable = config.durable_name.clone().unwrap_or_default();
        let mut state = self.record(format!("create_consumer {} {}", stream, durable));
        if !state.streams.contains_key(stream) {
            return Err(stream_not_found());
        }
        let key = (stream.to_string(), durable);
        if state.consumers.contains_key(&key) {
            return Err(RemoteError::Exists(format!("consumer {} on stream {}", key.1, stream)));
        }
        let mut stored = config.clone();
        consumer_defaults(&mut stored);
        state.consumers.insert(key, stored);
        Ok(())
    }

    async fn update_consumer(&self, stream: &str, config: &ConsumerConfig) -> RemoteResult<()> {
        let durable = config.durable_name.clone().unwrap_or_default();
        let mut state = self.record(format!("update_consumer {} {}", stream, durable));
        match state.consumers.get_mut(&(stream.to_string(), durable.clone())) {
            Some(current) => {
                *current = config.clone();
                consumer_defaults(current);
                Ok(())
            },
            None => Err(RemoteError::Missing(format!("consumer {} on stream {}", durable, stream))),
        }
    }

    async fn delete_consumer(&self, stream: &str, durable: &str) -> RemoteResult<()> {
        self.record(format!("delete_consumer {} {}", stream, durable))
            .consumers
            .remove(&(stream.to_string(), durable.to_string()))
            .map(|_| ())
            .ok_or_else(|| api_error(404, CONSUMER_NOT_FOUND, "consumer not found"))
    }

    async fn template_exists(&self, name: &str) -> RemoteResult<bool> {
        Ok(self
            .record(format!("template_exists {}", name))
            .templates
            .contains_key(name))
    }

    async fn load_template(&self, name: &str) -> RemoteResult<StreamTemplateConfig> {
        self.record(format!("load_template {}", name))
            .templates
            .get(name)
            .cloned()
            .ok_or_else(|| api_error(404, TEMPLATE_NOT_FOUND, "template not found"))
    }

    async fn create_template(&self, config: &StreamTemplateConfig) -> RemoteResult<()> {
        let mut stored = config.clone();
        stream_defaults(&mut stored.config);
        self.record(format!("create_template {}", config.name))
            .templates
            .insert(config.name.clone(), stored);
        Ok(())
    }

    async fn delete_template(&self, name: &str) -> RemoteResult<()> {
        self.record(format!("delete_template {}", name))
            .templates
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| api_error(404, TEMPLATE_NOT_FOUND, "template not found"))
    }

    async fn kv_bucket_exists(&self, bucket: &str) -> RemoteResult<bool> {
        Ok(self
            .record(format!("kv_bucket_exists {}", bucket))
            .buckets
            .contains_key(bucket))
    }

    async fn load_kv_bucket(&self, bucket: &str) -> RemoteResult<KvBucketConfig> {
        self.record(format!("load_kv_bucket {}", bucket))
            .buckets
            .get(bucket)
            .cloned()
            .ok_or_else(stream_not_found)
    }

    async fn create_kv_bucket(&self, config: &KvBucketConfig) -> RemoteResult<()> {
        self.record(format!("create_kv_bucket {}", config.bucket))
            .buckets
            .insert(config.bucket.clone(), config.clone());
        Ok(())
    }

    async fn update_kv_bucket(&self, config: &KvBucketConfig) -> RemoteResult<()> {
        let mut state = self.record(format!("update_kv_bucket {}", config.bucket));
        match state.buckets.get_mut(&config.bucket) {
            Some(current) => {
                *current = config.clone();
                Ok(())
            },
            None => Err(stream_not_found()),
        }
    }

    async fn delete_kv_bucket(&self, bucket: &str) -> RemoteResult<()> {
        let mut state = self.record(format!("delete_kv_bucket {}", bucket));
        if state.buckets.remove(bucket).is_none() {
            return Err(stream_not_found());
        }
        state.entries.retain(|(b, _), _| b != bucket);
        Ok(())
    }

    async fn kv_entry_exists(&self, bucket: &str, key: &str) -> RemoteResult<bool> {
        Ok(self
            .record(format!("kv_entry_exists {} {}", bucket, key))
            .entries
            .contains_key(&(bucket.to_string(), key.to_string())))
    }

    async fn load_kv_entry(&self, bucket: &str, key: &str) -> RemoteResult<KvEntry> {
        self.record(format!("load_kv_entry {} {}", bucket, key))
            .entries
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| RemoteError::Missing(format!("key {} in bucket {}", key, bucket)))
    }

    async fn put_kv_entry(&self, bucket: &str, key: &str, value: &[u8]) -> RemoteResult<u64> {
        let mut state = self.record(format!("put_kv_entry {} {}", bucket, key));
        if !state.buckets.contains_key(bucket) {
            return Err(stream_not_found());
        }
        state.revision += 1;
        let entry = KvEntry {
            bucket: bucket.to_string(),
            key: key.to_string(),
            value: value.to_vec(),
            revision: state.revision,
        };
        state
            .entries
            .insert((bucket.to_string(), key.to_string()), entry);
        Ok(state.revision)
    }

    async fn delete_kv_entry(&self, bucket: &str, key: &str) -> RemoteResult<()> {
        let mut state = self.record(format!("delete_kv_entry {} {}", bucket, key));
        state.revision += 1;
        state
            .entries
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn close(&self) {
        self.state().closes += 1;
    }
}

/// Hands out sessions sharing one fake server
#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    pub server: FakeJetStream,
    pub unreachable: bool,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Session = FakeJetStream;

    async fn connect(&self) -> RemoteResult<FakeJetStream> {
        if self.unreachable {
            return Err(RemoteError::Connect("no servers available for connection".to_string()));
        }
        self.server.state().connects += 1;
        Ok(self.server.clone())
    }
}
