//! JetStream Client
//!
//! Session against a live server built on the `async-nats` JetStream
//! context. Client library errors are folded into [`RemoteError`], keeping
//! the server's API error whenever one is underneath.

use super::types::{ConsumerConfig, KvBucketConfig, KvEntry, StreamConfig, StreamTemplateConfig};
use super::{JetStreamApi, RemoteResult};
use crate::error::{ApiError, RemoteError};
use async_nats::jetstream::context::{
    CreateStreamErrorKind, GetStreamError, GetStreamErrorKind, KeyValueError, RequestError,
};
use async_nats::jetstream::kv::{Operation, StatusErrorKind};
use async_nats::jetstream::response::Response;
use async_nats::jetstream::stream::{
    ConsumerCreateStrictErrorKind, ConsumerErrorKind, ConsumerUpdateErrorKind,
};
use async_nats::jetstream::{self, Context};
use async_nats::Client;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Live JetStream session
#[derive(Clone)]
pub struct JetStreamClient {
    client: Client,
    context: Context,
}

/// Template info response; only the configuration is used
#[derive(Debug, Deserialize)]
struct TemplateInfo {
    config: StreamTemplateConfig,
}

impl JetStreamClient {
    pub fn new(client: Client) -> Self {
        let context = jetstream::new(client.clone());
        Self { client, context }
    }

    /// Stream templates are only reachable through raw API requests
    async fn template_request<T>(&self, subject: String, payload: &T) -> RemoteResult<Response<serde_json::Value>>
    where
        T: serde::Serialize + ?Sized,
    {
        tracing::debug!("REQUEST $JS.API.{}", subject);
        self.context
            .request(subject.clone(), payload)
            .await
            .map_err(|e| request_failed(&subject, e))
    }

    async fn store(&self, bucket: &str) -> RemoteResult<jetstream::kv::Store> {
        self.context
            .get_key_value(bucket)
            .await
            .map_err(|e| kv_failed(bucket, e))
    }

    /// Latest live value of a key; delete and purge markers count as absent
    async fn entry(&self, bucket: &str, key: &str) -> RemoteResult<Option<KvEntry>> {
        let store = self.store(bucket).await?;
        let entry = store.entry(key).await.map_err(|e| RemoteError::Request {
            operation: format!("get of key {} in bucket {}", key, bucket),
            reason: e.to_string(),
        })?;

        Ok(entry
            .filter(|e| e.operation == Operation::Put)
            .map(|e| KvEntry {
                bucket: bucket.to_string(),
                key: key.to_string(),
                value: e.value.to_vec(),
                revision: e.revision,
            }))
    }
}

// =============================================================================
// Error folding
// =============================================================================

/// Error kinds that may carry an API error from the server
trait ApiErrorKind {
    fn api_error(self) -> Option<ApiError>;
}

impl ApiErrorKind for GetStreamErrorKind {
    fn api_error(self) -> Option<ApiError> {
        match self {
            Self::JetStream(err) => Some(err),
            _ => None,
        }
    }
}

impl ApiErrorKind for CreateStreamErrorKind {
    fn api_error(self) -> Option<ApiError> {
        match self {
            Self::JetStream(err) => Some(err),
            _ => None,
        }
    }
}

impl ApiErrorKind for ConsumerErrorKind {
    fn api_error(self) -> Option<ApiError> {
        match self {
            Self::JetStream(err) => Some(err),
            _ => None,
        }
    }
}

impl ApiErrorKind for ConsumerCreateStrictErrorKind {
    fn api_error(self) -> Option<ApiError> {
        match self {
            Self::JetStream(err) => Some(err),
            _ => None,
        }
    }
}

impl ApiErrorKind for ConsumerUpdateErrorKind {
    fn api_error(self) -> Option<ApiError> {
        match self {
            Self::JetStream(err) => Some(err),
            _ => None,
        }
    }
}

impl ApiErrorKind for StatusErrorKind {
    fn api_error(self) -> Option<ApiError> {
        match self {
            Self::JetStream(err) => Some(err),
            _ => None,
        }
    }
}

/// Fold a client library error, preferring the server's API error
fn failed<K>(operation: &str, err: async_nats::error::Error<K>) -> RemoteError
where
    K: ApiErrorKind + Clone + std::fmt::Debug + std::fmt::Display + PartialEq,
{
    match err.kind().api_error() {
        Some(api) => RemoteError::Api(api),
        None => RemoteError::Request {
            operation: operation.to_string(),
            reason: err.to_string(),
        },
    }
}

fn request_failed(subject: &str, err: RequestError) -> RemoteError {
    RemoteError::Request {
        operation: format!("request to $JS.API.{}", subject),
        reason: err.to_string(),
    }
}

/// Bucket errors wrap the stream lookup that failed underneath them
fn kv_failed(bucket: &str, err: KeyValueError) -> RemoteError {
    let stream_error = std::error::Error::source(&err)
        .and_then(|source| source.downcast_ref::<GetStreamError>())
        .and_then(|source| source.kind().api_error());

    match stream_error {
        Some(api) => RemoteError::Api(api),
        None => RemoteError::Request {
            operation: format!("lookup of bucket {}", bucket),
            reason: err.to_string(),
        },
    }
}

/// Map a not-found failure to `false`
pub fn found<T>(result: RemoteResult<T>) -> RemoteResult<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Convert a raw API response into its payload or the API error
fn into_result<T>(response: Response<T>) -> RemoteResult<T> {
    match response {
        Response::Ok(value) => Ok(value),
        Response::Err { error } => Err(RemoteError::Api(error)),
    }
}

#[async_trait]
impl JetStreamApi for JetStreamClient {
    async fn stream_exists(&self, name: &str) -> RemoteResult<bool> {
        found(self.load_stream(name).await)
    }

    async fn load_stream(&self, name: &str) -> RemoteResult<StreamConfig> {
        tracing::debug!("GET stream {}", name);
        let stream = self
            .context
            .get_stream(name)
            .await
            .map_err(|e| failed(&format!("info of stream {}", name), e))?;
        Ok(stream.cached_info().config.clone())
    }

    async fn create_stream(&self, config: &StreamConfig) -> RemoteResult<()> {
        self.context
            .create_stream(config)
            .await
            .map_err(|e| failed(&format!("create of stream {}", config.name), e))?;
        Ok(())
    }

    async fn update_stream(&self, config: &StreamConfig) -> RemoteResult<()> {
        self.context
            .update_stream(config)
            .await
            .map_err(|e| failed(&format!("update of stream {}", config.name), e))?;
        Ok(())
    }

    async fn delete_stream(&self, name: &str) -> RemoteResult<()> {
        self.context
            .delete_stream(name)
            .await
            .map_err(|e| failed(&format!("delete of stream {}", name), e))?;
        Ok(())
    }

    async fn consumer_exists(&self, stream: &str, durable: &str) -> RemoteResult<bool> {
        found(self.load_consumer(stream, durable).await)
    }

    async fn load_consumer(&self, stream: &str, durable: &str) -> RemoteResult<ConsumerConfig> {
        tracing::debug!("GET consumer {} on stream {}", durable, stream);
        let consumer = self
            .context
            .get_consumer_from_stream::<ConsumerConfig, _, _>(durable, stream)
            .await
            .map_err(|e| failed(&format!("info of consumer {} on stream {}", durable, stream), e))?;
        Ok(consumer.cached_info().config.clone())
    }

    async fn create_consumer(&self, stream: &str, config: &ConsumerConfig) -> RemoteResult<()> {
        let durable = config.durable_name.clone().unwrap_or_default();
        match self
            .context
            .create_consumer_strict_on_stream(config.clone(), stream)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ConsumerCreateStrictErrorKind::AlreadyExists => Err(
                RemoteError::Exists(format!("consumer {} on stream {}", durable, stream)),
            ),
            Err(e) => Err(failed(
                &format!("create of consumer {} on stream {}", durable, stream),
                e,
            )),
        }
    }

    async fn update_consumer(&self, stream: &str, config: &ConsumerConfig) -> RemoteResult<()> {
        let durable = config.durable_name.clone().unwrap_or_default();
        match self
            .context
            .update_consumer_on_stream(config.clone(), stream)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ConsumerUpdateErrorKind::DoesNotExist => Err(
                RemoteError::Missing(format!("consumer {} on stream {}", durable, stream)),
            ),
            Err(e) => Err(failed(
                &format!("update of consumer {} on stream {}", durable, stream),
                e,
            )),
        }
    }

    async fn delete_consumer(&self, stream: &str, durable: &str) -> RemoteResult<()> {
        self.context
            .delete_consumer_from_stream(durable, stream)
            .await
            .map_err(|e| failed(&format!("delete of consumer {} on stream {}", durable, stream), e))?;
        Ok(())
    }

    async fn template_exists(&self, name: &str) -> RemoteResult<bool> {
        found(self.load_template(name).await)
    }

    async fn load_template(&self, name: &str) -> RemoteResult<StreamTemplateConfig> {
        let subject = format!("STREAM.TEMPLATE.INFO.{}", name);
        let response: Response<TemplateInfo> = self
            .context
            .request(subject.clone(), &json!({}))
            .await
            .map_err(|e| request_failed(&subject, e))?;
        Ok(into_result(response)?.config)
    }

    async fn create_template(&self, config: &StreamTemplateConfig) -> RemoteResult<()> {
        let subject = format!("STREAM.TEMPLATE.CREATE.{}", config.name);
        into_result(self.template_request(subject, config).await?)?;
        Ok(())
    }

    async fn delete_template(&self, name: &str) -> RemoteResult<()> {
        let subject = format!("STREAM.TEMPLATE.DELETE.{}", name);
        into_result(self.template_request(subject, &json!({})).await?)?;
        Ok(())
    }

    async fn kv_bucket_exists(&self, bucket: &str) -> RemoteResult<bool> {
        found(self.store(bucket).await)
    }

    async fn load_kv_bucket(&self, bucket: &str) -> RemoteResult<KvBucketConfig> {
        let status = self
            .store(bucket)
            .await?
            .status()
            .await
            .map_err(|e| failed(&format!("status of bucket {}", bucket), e))?;
        Ok(KvBucketConfig::from_stream(&status.info.config))
    }

    async fn create_kv_bucket(&self, config: &KvBucketConfig) -> RemoteResult<()> {
        self.context
            .create_key_value(config.to_kv_config())
            .await
            .map_err(|e| RemoteError::Request {
                operation: format!("create of bucket {}", config.bucket),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn update_kv_bucket(&self, config: &KvBucketConfig) -> RemoteResult<()> {
        // the client library can not update a bucket, so its stream is updated
        let mut stream = self.load_stream(&config.stream_name()).await?;
        config.apply_to_stream(&mut stream);
        self.update_stream(&stream).await
    }

    async fn delete_kv_bucket(&self, bucket: &str) -> RemoteResult<()> {
        self.context
            .delete_key_value(bucket)
            .await
            .map_err(|e| kv_failed(bucket, e))?;
        Ok(())
    }

    async fn kv_entry_exists(&self, bucket: &str, key: &str) -> RemoteResult<bool> {
        Ok(self.entry(bucket, key).await?.is_some())
    }

    async fn load_kv_entry(&self, bucket: &str, key: &str) -> RemoteResult<KvEntry> {
        self.entry(bucket, key)
            .await?
            .ok_or_else(|| RemoteError::Missing(format!("key {} in bucket {}", key, bucket)))
    }

    async fn put_kv_entry(&self, bucket: &str, key: &str, value: &[u8]) -> RemoteResult<u64> {
        tracing::debug!("PUT {} bytes to {}/{}", value.len(), bucket, key);
        self.store(bucket)
            .await?
            .put(key, value.to_vec().into())
            .await
            .map_err(|e| RemoteError::Request {
                operation: format!("put of key {} in bucket {}", key, bucket),
                reason: e.to_string(),
            })
    }

    async fn delete_kv_entry(&self, bucket: &str, key: &str) -> RemoteResult<()> {
        self.store(bucket)
            .await?
            .delete(key)
            .await
            .map_err(|e| RemoteError::Request {
                operation: format!("delete of key {} in bucket {}", key, bucket),
                reason: e.to_string(),
            })
    }

    async fn close(&self) {
        if let Err(e) = self.client.flush().await {
            tracing::debug!("Flush on close failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nats::types::KV_STREAM_PREFIX;
    use async_nats::jetstream::ErrorCode;

    #[test]
    fn test_found_maps_not_found_to_false() {
        let missing: RemoteResult<()> = Err(RemoteError::Missing("stream ORDERS".to_string()));
        assert!(!found(missing).unwrap());
        assert!(found(Ok(())).unwrap());

        let broken: RemoteResult<()> = Err(RemoteError::Connect("closed".to_string()));
        assert!(found(broken).is_err());
    }

    #[test]
    fn test_template_response_with_api_error() {
        let response: Response<TemplateInfo> = serde_json::from_value(json!({
            "type": "io.nats.jetstream.api.v1.stream_template_info_response",
            "error": {"code": 404, "err_code": 10068, "description": "template not found"}
        }))
        .unwrap();
        let err = into_result(response).unwrap_err();
        assert_eq!(err.err_code(), Some(ErrorCode::STREAM_TEMPLATE_NOT_FOUND));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_template_info_response() {
        let response: Response<TemplateInfo> = serde_json::from_value(json!({
            "type": "io.nats.jetstream.api.v1.stream_template_info_response",
            "config": {
                "name": "ORDERS_T",
                "max_streams": 10,
                "config": {
                    "name": "",
                    "subjects": ["orders.*"],
                    "retention": "limits",
                    "max_consumers": -1,
                    "max_msgs": -1,
                    "max_bytes": -1,
                    "max_age": 0,
                    "max_msgs_per_subject": -1,
                    "max_msg_size": -1,
                    "discard": "old",
                    "storage": "file",
                    "num_replicas": 1,
                    "duplicate_window": 120000000000u64
                }
            },
            "streams": []
        }))
        .unwrap();
        let template = into_result(response).unwrap().config;
        assert_eq!(template.name, "ORDERS_T");
        assert_eq!(template.config.subjects, vec!["orders.*"]);
        assert_eq!(
            template.config.duplicate_window,
            std::time::Duration::from_secs(120)
        );
    }

    #[test]
    fn test_bucket_stream_prefix() {
        let config = KvBucketConfig {
            bucket: "CFG".to_string(),
            ..KvBucketConfig::default()
        };
        assert_eq!(config.stream_name(), format!("{}CFG", KV_STREAM_PREFIX));
    }
}
