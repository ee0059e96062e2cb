//! Pre-flight validation
//!
//! Local checks of remote configuration documents against constraints the
//! JetStream server is known to enforce. Nothing here touches the network:
//! server-reported values (the request batch ceiling) and related resources
//! (the stream a consumer lives on, the origin of a mirror) are passed in by
//! the caller. Every rule runs; violations accumulate instead of stopping at
//! the first one.

use crate::error::{Error, Result};
use crate::nats::types::{
    is_push, ConsumerConfig, DiscardPolicy, KvBucketConfig, KvEntry, StreamConfig,
    StreamTemplateConfig,
};
use crate::resource::ResourceKind;
use regex::Regex;
use std::sync::OnceLock;

/// Highest replica count a clustered deployment accepts
pub const MAX_REPLICAS: usize = 5;

/// Highest per-key history a bucket accepts
pub const MAX_HISTORY: i64 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One failed rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub severity: Severity,
    pub message: String,
}

impl Violation {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Limits reported by the server that some rules compare against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerLimits {
    /// Cluster-wide ceiling on a pull request batch, when one is configured
    pub max_request_batch: Option<i64>,
}

/// Remote configuration of any kind, borrowed for validation
#[derive(Debug, Clone, Copy)]
pub enum RemoteConfig<'a> {
    Stream(&'a StreamConfig),
    Consumer(&'a ConsumerConfig),
    StreamTemplate(&'a StreamTemplateConfig),
    KvBucket(&'a KvBucketConfig),
    KvEntry(&'a KvEntry),
}

/// Run every local rule for the given configuration
pub fn validate(config: RemoteConfig<'_>, limits: &ServerLimits) -> Vec<Violation> {
    let mut violations = Vec::new();

    match config {
        RemoteConfig::Stream(stream) => {
            check_name("stream", &stream.name, &mut violations);
            stream_rules(stream, &mut violations);
        },
        RemoteConfig::Consumer(consumer) => consumer_rules(consumer, limits, &mut violations),
        RemoteConfig::StreamTemplate(template) => {
            check_name("stream template", &template.name, &mut violations);
            if template.max_streams == 0 {
                violations.push(Violation::error("max streams must be greater than 0"));
            }
            stream_rules(&template.config, &mut violations);
        },
        RemoteConfig::KvBucket(bucket) => bucket_rules(bucket, &mut violations),
        RemoteConfig::KvEntry(entry) => {
            if !valid_bucket_name(&entry.bucket) {
                violations.push(Violation::error(format!(
                    "invalid bucket name {:?}",
                    entry.bucket
                )));
            }
            if !valid_key(&entry.key) {
                violations.push(Violation::error(format!("invalid key {:?}", entry.key)));
            }
        },
    }

    violations
}

/// Rules a consumer must satisfy against the stream it is created on
pub fn validate_consumer_for_stream(consumer: &ConsumerConfig, stream: &StreamConfig) -> Vec<Violation> {
    let mut violations = Vec::new();
    let Some(limits) = &stream.consumer_limits else {
        return violations;
    };

    let limit = limits.inactive_threshold;
    if !limit.is_zero() {
        if consumer.inactive_threshold.is_zero() {
            violations.push(Violation::error(
                "inactive_threshold must be set if it's configured in stream limits",
            ));
        } else if consumer.inactive_threshold > limit {
            violations.push(Violation::error(format!(
                "consumer inactive_threshold exceeds the stream limit of {}s",
                limit.as_secs()
            )));
        }
    }

    if limits.max_ack_pending > 0 && consumer.max_ack_pending > limits.max_ack_pending {
        violations.push(Violation::error(format!(
            "consumer max_ack_pending exceeds the stream limit of {}",
            limits.max_ack_pending
        )));
    }

    violations
}

/// Rules a mirror must satisfy against its origin stream
pub fn validate_mirror_origin(mirror: &StreamConfig, origin: &StreamConfig) -> Vec<Violation> {
    let mut violations = Vec::new();

    if mirror.mirror_direct && !origin.allow_direct {
        violations.push(Violation::error(format!(
            "mirror direct requires direct get on the origin stream {}",
            origin.name
        )));
    }

    violations
}

/// Warn about placement tags that are dropped for lack of a cluster
pub fn check_placement(cluster: Option<&str>, tags: &[String]) -> Option<Violation> {
    let has_cluster = cluster.is_some_and(|c| !c.is_empty());
    if !has_cluster && !tags.is_empty() {
        Some(Violation::warning(
            "placement tags are ignored without a placement cluster",
        ))
    } else {
        None
    }
}

/// Log warnings and fail on errors
pub fn ensure_valid(kind: ResourceKind, name: &str, violations: Vec<Violation>) -> Result<()> {
    let (errors, warnings): (Vec<_>, Vec<_>) = violations.into_iter().partition(Violation::is_error);

    for warning in &warnings {
        tracing::warn!("{} {}: {}", kind, name, warning.message);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        tracing::debug!("{} {} failed validation with {} error(s)", kind, name, errors.len());
        Err(Error::ValidationFailed(errors))
    }
}

// =============================================================================
// Rules
// =============================================================================

fn stream_rules(stream: &StreamConfig, violations: &mut Vec<Violation>) {
    if !stream.max_age.is_zero() && stream.duplicate_window > stream.max_age {
        violations.push(Violation::error("duplicate window exceeds max age"));
    }

    if stream.mirror.is_some() && !stream.subjects.is_empty() {
        violations.push(Violation::error("mirrors can not contain subjects"));
    }

    if let Some(republish) = &stream.republish {
        if republish.destination.is_empty() {
            violations.push(Violation::error(
                "republish destination is required when a republish source is set",
            ));
        }
    }

    if stream.discard_new_per_subject
        && (stream.discard != DiscardPolicy::New || stream.max_messages_per_subject <= 0)
    {
        violations.push(Violation::error(
            "discard new per subject requires discard policy new and max msgs per subject",
        ));
    }

    if stream.num_replicas > MAX_REPLICAS {
        violations.push(Violation::error(format!(
            "replicas may not exceed {}",
            MAX_REPLICAS
        )));
    }
}

fn consumer_rules(consumer: &ConsumerConfig, limits: &ServerLimits, violations: &mut Vec<Violation>) {
    match consumer.durable_name.as_deref() {
        Some(name) => check_name("consumer", name, violations),
        None => violations.push(Violation::error("durable name is required")),
    }

    if let Some(first) = consumer.backoff.first() {
        if *first != consumer.ack_wait {
            violations.push(Violation::error("first backoff value has to equal ack wait"));
        }
        if consumer.max_deliver > 0 && consumer.max_deliver as usize <= consumer.backoff.len() {
            violations.push(Violation::error(
                "max delivery must be greater than the number of backoff values",
            ));
        }
    }

    if consumer.flow_control && consumer.idle_heartbeat.is_zero() {
        violations.push(Violation::error("flow control requires a heartbeat"));
    }

    if is_push(consumer) {
        if consumer.max_batch != 0 || !consumer.max_expires.is_zero() || consumer.max_bytes != 0 {
            violations.push(Violation::error(
                "pull request limits can not be set on a push consumer",
            ));
        }
    } else if consumer.flow_control || !consumer.idle_heartbeat.is_zero() {
        violations.push(Violation::error(
            "heartbeat and flow control require a delivery subject",
        ));
    }

    if consumer.sample_frequency > 100 {
        violations.push(Violation::error(
            "sample frequency must be between 0 and 100",
        ));
    }

    if let Some(ceiling) = limits.max_request_batch {
        if ceiling > 0 && consumer.max_batch > ceiling {
            violations.push(Violation::error(format!(
                "consumer max request batch exceeds server limit of {}",
                ceiling
            )));
        }
    }
}

fn bucket_rules(bucket: &KvBucketConfig, violations: &mut Vec<Violation>) {
    if !valid_bucket_name(&bucket.bucket) {
        violations.push(Violation::error(format!(
            "invalid bucket name {:?}",
            bucket.bucket
        )));
    }

    if !(1..=MAX_HISTORY).contains(&bucket.history) {
        violations.push(Violation::error(format!(
            "history must be between 1 and {}",
            MAX_HISTORY
        )));
    }

    if !(1..=MAX_REPLICAS).contains(&bucket.num_replicas) {
        violations.push(Violation::error(format!(
            "replicas must be between 1 and {}",
            MAX_REPLICAS
        )));
    }
}

fn check_name(what: &str, name: &str, violations: &mut Vec<Violation>) {
    if name.is_empty() {
        violations.push(Violation::error(format!("{} name is required", what)));
    } else if name
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '.' | '*' | '>' | '/' | '\\'))
    {
        violations.push(Violation::error(format!(
            "{} name {:?} may not contain whitespace or any of . * > / \\",
            what, name
        )));
    }
}

struct Patterns {
    bucket: Regex,
    key: Regex,
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .unwrap_or_else(|e| panic!("Invalid validation pattern {}: {}", pattern, e))
        };
        Patterns {
            bucket: compile(r"^[a-zA-Z0-9_-]+$"),
            key: compile(r"^[-/_=\.a-zA-Z0-9]+$"),
        }
    })
}

/// Bucket names are restricted to letters, digits, `_` and `-`
pub fn valid_bucket_name(name: &str) -> bool {
    patterns().bucket.is_match(name)
}

/// Keys may not start or end with `.` and may not use the reserved `_kv` prefix
pub fn valid_key(key: &str) -> bool {
    patterns().key.is_match(key)
        && !key.starts_with('.')
        && !key.ends_with('.')
        && !key.starts_with("_kv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nats::types::{ConsumerLimits, Republish, Source};
    use std::time::Duration;

    fn messages(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.message.as_str()).collect()
    }

    fn stream(name: &str) -> StreamConfig {
        StreamConfig {
            name: name.to_string(),
            subjects: vec![format!("{}.*", name)],
            num_replicas: 1,
            duplicate_window: Duration::from_secs(120),
            ..StreamConfig::default()
        }
    }

    fn pull_consumer() -> ConsumerConfig {
        ConsumerConfig {
            durable_name: Some("C1".to_string()),
            ack_wait: Duration::from_secs(10),
            max_deliver: -1,
            ..ConsumerConfig::default()
        }
    }

    #[test]
    fn test_backoff_must_start_with_ack_wait() {
        let mut consumer = pull_consumer();
        consumer.backoff = vec![Duration::from_secs(5), Duration::from_secs(10)];
        let violations = validate(RemoteConfig::Consumer(&consumer), &ServerLimits::default());
        assert_eq!(messages(&violations), vec!["first backoff value has to equal ack wait"]);

        consumer.backoff = vec![Duration::from_secs(10), Duration::from_secs(20)];
        let violations = validate(RemoteConfig::Consumer(&consumer), &ServerLimits::default());
        assert!(violations.is_empty(), "unexpected: {:?}", violations);
    }

    #[test]
    fn test_duplicate_window_within_max_age() {
        let mut config = stream("ORDERS");
        config.max_age = Duration::from_secs(60);
        config.duplicate_window = Duration::from_secs(120);
        let violations = validate(RemoteConfig::Stream(&config), &ServerLimits::default());
        assert_eq!(messages(&violations), vec!["duplicate window exceeds max age"]);

        config.duplicate_window = Duration::from_secs(30);
        assert!(validate(RemoteConfig::Stream(&config), &ServerLimits::default()).is_empty());
    }

    #[test]
    fn test_duplicate_window_ignored_without_max_age() {
        let config = stream("ORDERS");
        assert!(validate(RemoteConfig::Stream(&config), &ServerLimits::default()).is_empty());
    }

    #[test]
    fn test_violations_accumulate() {
        let mut config = stream("bad.name");
        config.max_age = Duration::from_secs(1);
        config.duplicate_window = Duration::from_secs(2);
        config.num_replicas = 7;
        config.republish = Some(Republish {
            source: ">".to_string(),
            destination: String::new(),
            headers_only: false,
        });
        let violations = validate(RemoteConfig::Stream(&config), &ServerLimits::default());
        assert_eq!(violations.len(), 4, "{:?}", violations);
    }

    #[test]
    fn test_mirror_can_not_have_subjects() {
        let mut config = stream("BACKUP");
        config.mirror = Some(Source {
            name: "ORDERS".to_string(),
            ..Source::default()
        });
        let violations = validate(RemoteConfig::Stream(&config), &ServerLimits::default());
        assert_eq!(messages(&violations), vec!["mirrors can not contain subjects"]);
    }

    #[test]
    fn test_discard_new_per_subject_prerequisites() {
        let mut config = stream("ORDERS");
        config.discard_new_per_subject = true;
        assert_eq!(
            validate(RemoteConfig::Stream(&config), &ServerLimits::default()).len(),
            1
        );

        config.discard = DiscardPolicy::New;
        config.max_messages_per_subject = 10;
        assert!(validate(RemoteConfig::Stream(&config), &ServerLimits::default()).is_empty());
    }

    #[test]
    fn test_request_batch_ceiling_comes_from_server() {
        let mut consumer = pull_consumer();
        consumer.max_batch = 10;

        assert!(validate(RemoteConfig::Consumer(&consumer), &ServerLimits::default()).is_empty());

        let limits = ServerLimits {
            max_request_batch: Some(1),
        };
        let violations = validate(RemoteConfig::Consumer(&consumer), &limits);
        assert_eq!(
            messages(&violations),
            vec!["consumer max request batch exceeds server limit of 1"]
        );
    }

    #[test]
    fn test_push_and_pull_only_settings() {
        let mut consumer = pull_consumer();
        consumer.flow_control = true;
        let violations = validate(RemoteConfig::Consumer(&consumer), &ServerLimits::default());
        assert_eq!(
            messages(&violations),
            vec![
                "flow control requires a heartbeat",
                "heartbeat and flow control require a delivery subject"
            ]
        );

        let mut consumer = pull_consumer();
        consumer.deliver_subject = Some("deliver.c1".to_string());
        consumer.max_batch = 5;
        let violations = validate(RemoteConfig::Consumer(&consumer), &ServerLimits::default());
        assert_eq!(
            messages(&violations),
            vec!["pull request limits can not be set on a push consumer"]
        );
    }

    #[test]
    fn test_max_deliver_exceeds_backoff_count() {
        let mut consumer = pull_consumer();
        consumer.backoff = vec![Duration::from_secs(10), Duration::from_secs(20)];
        consumer.max_deliver = 2;
        let violations = validate(RemoteConfig::Consumer(&consumer), &ServerLimits::default());
        assert_eq!(
            messages(&violations),
            vec!["max delivery must be greater than the number of backoff values"]
        );
    }

    #[test]
    fn test_sample_frequency_range() {
        let mut consumer = pull_consumer();
        consumer.sample_frequency = 150;
        assert_eq!(
            validate(RemoteConfig::Consumer(&consumer), &ServerLimits::default()).len(),
            1
        );
        consumer.sample_frequency = 100;
        assert!(validate(RemoteConfig::Consumer(&consumer), &ServerLimits::default()).is_empty());
    }

    #[test]
    fn test_consumer_inactive_threshold_against_stream_limits() {
        let mut origin = stream("ORDERS");
        origin.consumer_limits = Some(ConsumerLimits {
            inactive_threshold: Duration::from_secs(60),
            max_ack_pending: 0,
        });

        let consumer = pull_consumer();
        assert_eq!(
            messages(&validate_consumer_for_stream(&consumer, &origin)),
            vec!["inactive_threshold must be set if it's configured in stream limits"]
        );

        let mut consumer = pull_consumer();
        consumer.inactive_threshold = Duration::from_secs(120);
        assert_eq!(validate_consumer_for_stream(&consumer, &origin).len(), 1);

        consumer.inactive_threshold = Duration::from_secs(30);
        assert!(validate_consumer_for_stream(&consumer, &origin).is_empty());
    }

    #[test]
    fn test_mirror_direct_requires_origin_direct_get() {
        let origin = stream("ORDERS");
        let mut mirror = stream("BACKUP");
        mirror.subjects.clear();
        mirror.mirror_direct = true;
        assert_eq!(validate_mirror_origin(&mirror, &origin).len(), 1);

        let origin = StreamConfig {
            allow_direct: true,
            ..origin
        };
        assert!(validate_mirror_origin(&mirror, &origin).is_empty());
    }

    #[test]
    fn test_bucket_rules() {
        let bucket = KvBucketConfig {
            bucket: "bad bucket".to_string(),
            history: 65,
            num_replicas: 0,
            ..KvBucketConfig::default()
        };
        let violations = validate(RemoteConfig::KvBucket(&bucket), &ServerLimits::default());
        assert_eq!(violations.len(), 3, "{:?}", violations);
    }

    #[test]
    fn test_key_rules() {
        assert!(valid_key("a.b/c=d-e_f"));
        assert!(!valid_key(".leading"));
        assert!(!valid_key("trailing."));
        assert!(!valid_key("_kv_internal"));
        assert!(!valid_key("with space"));
        assert!(!valid_key(""));
    }

    #[test]
    fn test_placement_tags_without_cluster_is_a_warning() {
        let tags = vec!["ssd".to_string()];
        let warning = check_placement(None, &tags).unwrap();
        assert_eq!(warning.severity, Severity::Warning);
        assert!(check_placement(Some("east"), &tags).is_none());
        assert!(check_placement(None, &[]).is_none());
    }

    #[test]
    fn test_ensure_valid_only_fails_on_errors() {
        assert!(ensure_valid(
            ResourceKind::Stream,
            "ORDERS",
            vec![Violation::warning("placement tags are ignored without a placement cluster")]
        )
        .is_ok());

        let err = ensure_valid(
            ResourceKind::Stream,
            "ORDERS",
            vec![
                Violation::warning("ignored"),
                Violation::error("duplicate window exceeds max age"),
            ],
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "duplicate window exceeds max age");
    }
}
