//! Desired state
//!
//! Typed attribute sets as declared by the caller, one record per resource
//! kind. Policy choices stay as the names the caller wrote (`"file"`,
//! `"workqueue"`, ...) and durations stay in whole seconds; the mapper turns
//! them into remote configuration. Missing attributes take the documented
//! defaults and unknown attributes are rejected when deserializing.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Free-form metadata, ordered so that mapping is deterministic
pub type Metadata = BTreeMap<String, String>;

/// Waiting pull requests the server allows when none are declared
const SERVER_MAX_WAITING: i64 = 512;

// Alternate spellings of a value are folded into the one the server reports
// back, so a declared value and its read-back compare equal.

/// `-1` and `0` both keep messages forever; `0` is what a stream reports
fn stream_max_age<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let seconds = i64::deserialize(deserializer)?;
    Ok(if seconds == -1 { 0 } else { seconds })
}

/// Templates report an unlimited age as `-1`
fn template_max_age<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let seconds = i64::deserialize(deserializer)?;
    Ok(if seconds == 0 { -1 } else { seconds })
}

/// A bucket always keeps at least the latest value
fn kv_history<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let history = i64::deserialize(deserializer)?;
    Ok(if history == 0 { 1 } else { history })
}

/// The server default is reported as unset
fn max_waiting<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let waiting = Option::<i64>::deserialize(deserializer)?;
    Ok(waiting.filter(|&n| n != 0 && n != SERVER_MAX_WAITING))
}

/// Desired state of a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub subjects: Vec<String>,
    pub max_msgs: i64,
    pub max_bytes: i64,
    /// Seconds, 0 or -1 keep messages forever
    #[serde(deserialize_with = "stream_max_age")]
    pub max_age: i64,
    /// Seconds
    pub duplicate_window: i64,
    pub max_msg_size: i64,
    pub max_msgs_per_subject: i64,
    pub storage: String,
    pub ack: bool,
    pub retention: String,
    pub discard: String,
    pub discard_new_per_subject: bool,
    pub max_consumers: i64,
    pub replicas: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement_cluster: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub placement_tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror: Option<StreamSourceSpec>,
    #[serde(rename = "source", skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<StreamSourceSpec>,
    pub mirror_direct: bool,
    pub allow_direct: bool,
    pub deny_delete: bool,
    pub deny_purge: bool,
    pub allow_rollup_hdrs: bool,
    pub compression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_transform: Option<SubjectTransformSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub republish_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub republish_destination: Option<String>,
    pub republish_headers_only: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
    /// Consumer limit, seconds
    pub inactive_threshold: i64,
    /// Consumer limit
    pub max_ack_pending: i64,
}

impl Default for StreamSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            subjects: Vec::new(),
            max_msgs: -1,
            max_bytes: -1,
            max_age: 0,
            duplicate_window: 120,
            max_msg_size: -1,
            max_msgs_per_subject: -1,
            storage: "file".to_string(),
            ack: true,
            retention: "limits".to_string(),
            discard: "old".to_string(),
            discard_new_per_subject: false,
            max_consumers: -1,
            replicas: 1,
            placement_cluster: None,
            placement_tags: Vec::new(),
            mirror: None,
            sources: Vec::new(),
            mirror_direct: false,
            allow_direct: false,
            deny_delete: false,
            deny_purge: false,
            allow_rollup_hdrs: false,
            compression: "none".to_string(),
            subject_transform: None,
            republish_source: None,
            republish_destination: None,
            republish_headers_only: false,
            metadata: Metadata::new(),
            inactive_threshold: 0,
            max_ack_pending: 0,
        }
    }
}

impl StreamSpec {
    /// A stream with default limits capturing the given subjects
    pub fn new(name: &str, subjects: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            subjects: subjects.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }
}

/// Origin of a mirror or of one stream source
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamSourceSpec {
    pub name: String,
    pub start_seq: u64,
    /// RFC3339
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_subject: Option<String>,
    #[serde(rename = "subject_transform", skip_serializing_if = "Vec::is_empty")]
    pub subject_transforms: Vec<SubjectTransformSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalSpec>,
}

impl StreamSourceSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Subject rewrite applied while copying messages
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubjectTransformSpec {
    pub source: String,
    pub destination: String,
}

/// Stream living in another account
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExternalSpec {
    pub api: String,
    pub deliver: String,
}

/// Desired state of a durable consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsumerSpec {
    /// Identity of the stream the consumer reads from
    pub stream_id: String,
    pub durable_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_group: Option<String>,
    pub stream_sequence: u64,
    /// RFC3339
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    pub deliver_all: bool,
    pub deliver_last: bool,
    pub deliver_new: bool,
    pub deliver_last_per_subject: bool,
    pub ack_policy: String,
    /// Seconds
    pub ack_wait: i64,
    pub max_delivery: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_subject: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter_subjects: Vec<String>,
    pub replay_policy: String,
    /// Percent
    pub sample_freq: u8,
    /// Bits per second
    pub ratelimit: u64,
    pub max_ack_pending: i64,
    /// Seconds
    pub heartbeat: i64,
    pub flow_control: bool,
    /// Unset lets the server choose
    #[serde(
        deserialize_with = "max_waiting",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_waiting: Option<i64>,
    pub headers_only: bool,
    pub max_batch: i64,
    /// Seconds
    pub max_expires: i64,
    pub max_bytes: i64,
    /// Seconds
    pub inactive_threshold: i64,
    pub replicas: i64,
    pub memory: bool,
    /// Seconds
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub backoff: Vec<i64>,
}

impl Default for ConsumerSpec {
    fn default() -> Self {
        Self {
            stream_id: String::new(),
            durable_name: String::new(),
            description: None,
            metadata: Metadata::new(),
            delivery_subject: None,
            delivery_group: None,
            stream_sequence: 0,
            start_time: None,
            deliver_all: false,
            deliver_last: false,
            deliver_new: false,
            deliver_last_per_subject: false,
            ack_policy: "explicit".to_string(),
            ack_wait: 30,
            max_delivery: -1,
            filter_subject: None,
            filter_subjects: Vec::new(),
            replay_policy: "instant".to_string(),
            sample_freq: 0,
            ratelimit: 0,
            max_ack_pending: 20000,
            heartbeat: 0,
            flow_control: false,
            max_waiting: None,
            headers_only: false,
            max_batch: 0,
            max_expires: 0,
            max_bytes: 0,
            inactive_threshold: 0,
            replicas: 0,
            memory: false,
            backoff: Vec::new(),
        }
    }
}

impl ConsumerSpec {
    /// A pull consumer with default settings on the given stream identity
    pub fn new(stream_id: &str, durable_name: &str) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            durable_name: durable_name.to_string(),
            ..Self::default()
        }
    }
}

/// Desired state of a stream template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamTemplateSpec {
    pub name: String,
    pub max_streams: u32,
    pub subjects: Vec<String>,
    pub max_msgs: i64,
    pub max_bytes: i64,
    /// Seconds, 0 or -1 keep messages forever
    #[serde(deserialize_with = "template_max_age")]
    pub max_age: i64,
    /// Seconds
    pub duplicate_window: i64,
    pub max_msg_size: i64,
    pub storage: String,
    pub ack: bool,
    pub retention: String,
    pub max_consumers: i64,
    pub replicas: i64,
}

impl Default for StreamTemplateSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            max_streams: 0,
            subjects: Vec::new(),
            max_msgs: -1,
            max_bytes: -1,
            max_age: -1,
            duplicate_window: 120,
            max_msg_size: -1,
            storage: "file".to_string(),
            ack: true,
            retention: "limits".to_string(),
            max_consumers: -1,
            replicas: 1,
        }
    }
}

/// Desired state of a key-value bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KvBucketSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(deserialize_with = "kv_history")]
    pub history: i64,
    /// Seconds
    pub ttl: i64,
    pub max_value_size: i64,
    pub max_bucket_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement_cluster: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub placement_tags: Vec<String>,
    pub replicas: i64,
}

impl Default for KvBucketSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            history: 5,
            ttl: 0,
            max_value_size: -1,
            max_bucket_size: -1,
            placement_cluster: None,
            placement_tags: Vec::new(),
            replicas: 1,
        }
    }
}

impl KvBucketSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Desired state of a single key-value entry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KvEntrySpec {
    pub bucket: String,
    pub key: String,
    pub value: String,
    /// Reported on read, ignored on write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
}

impl KvEntrySpec {
    pub fn new(bucket: &str, key: &str, value: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            revision: None,
        }
    }
}
