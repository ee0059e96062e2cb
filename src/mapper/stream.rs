//! Stream mapping

use super::{
    disabled_or_seconds, format_timestamp, narrow, non_empty, parse_timestamp, required_seconds,
    sanitize_metadata, seconds_or, Policy,
};
use crate::desired::{ExternalSpec, StreamSourceSpec, StreamSpec, SubjectTransformSpec};
use crate::error::{Error, Result};
use crate::nats::types::{
    Compression, ConsumerLimits, DiscardPolicy, External, Placement, Republish, RetentionPolicy,
    Source, StorageType, StreamConfig, SubjectTransform,
};

/// Map a desired stream to its remote configuration
pub fn to_remote(spec: &StreamSpec) -> Result<StreamConfig> {
    if spec.mirror.is_some() && !spec.sources.is_empty() {
        return Err(Error::invalid_config(format!(
            "stream {} declares both a mirror and sources",
            spec.name
        )));
    }
    if spec.subjects.is_empty() && spec.mirror.is_none() && spec.sources.is_empty() {
        return Err(Error::invalid_config(format!(
            "stream {} needs subjects, a mirror or at least one source",
            spec.name
        )));
    }
    if spec.mirror_direct && spec.mirror.is_none() {
        return Err(Error::invalid_config(format!(
            "stream {} enables mirror_direct without a mirror",
            spec.name
        )));
    }

    let republish = match (
        non_empty(spec.republish_source.as_ref()),
        non_empty(spec.republish_destination.as_ref()),
    ) {
        (Some(source), destination) => Some(Republish {
            source,
            destination: destination.unwrap_or_default(),
            headers_only: spec.republish_headers_only,
        }),
        (None, Some(_)) => {
            return Err(Error::invalid_config(
                "republish_destination requires republish_source",
            ))
        },
        (None, None) => None,
    };

    let mirror = spec
        .mirror
        .as_ref()
        .map(|m| source_to_remote("mirror", m))
        .transpose()?;
    let sources = spec
        .sources
        .iter()
        .map(|s| source_to_remote("source", s))
        .collect::<Result<Vec<_>>>()?;

    let consumer_limits = ConsumerLimits {
        inactive_threshold: disabled_or_seconds("inactive_threshold", spec.inactive_threshold)?,
        max_ack_pending: spec.max_ack_pending.max(0),
    };

    Ok(StreamConfig {
        name: spec.name.clone(),
        description: non_empty(spec.description.as_ref()),
        subjects: spec.subjects.clone(),
        retention: RetentionPolicy::resolve(&spec.retention)?,
        max_consumers: narrow("max_consumers", spec.max_consumers)?,
        max_messages: spec.max_msgs,
        max_bytes: spec.max_bytes,
        max_age: disabled_or_seconds("max_age", spec.max_age)?,
        max_messages_per_subject: spec.max_msgs_per_subject,
        max_message_size: narrow("max_msg_size", spec.max_msg_size)?,
        discard: DiscardPolicy::resolve(&spec.discard)?,
        discard_new_per_subject: spec.discard_new_per_subject,
        storage: StorageType::resolve(&spec.storage)?,
        num_replicas: narrow("replicas", spec.replicas)?,
        no_ack: !spec.ack,
        // zero is replaced by the server's two minute default
        duplicate_window: required_seconds("duplicate_window", spec.duplicate_window)?,
        placement: placement(spec.placement_cluster.as_ref(), &spec.placement_tags),
        mirror,
        sources: (!sources.is_empty()).then_some(sources),
        mirror_direct: spec.mirror_direct,
        allow_direct: spec.allow_direct,
        deny_delete: spec.deny_delete,
        deny_purge: spec.deny_purge,
        allow_rollup: spec.allow_rollup_hdrs,
        compression: Some(Compression::resolve(&spec.compression)?),
        subject_transform: spec.subject_transform.as_ref().map(transform_to_remote),
        republish,
        metadata: sanitize_metadata(&spec.metadata),
        consumer_limits: limits_set(&consumer_limits).then_some(consumer_limits),
        ..StreamConfig::default()
    })
}

/// Project a remote stream configuration back into desired state
pub fn from_remote(config: &StreamConfig) -> StreamSpec {
    let (placement_cluster, placement_tags) = placement_from_remote(config.placement.as_ref());
    let republish = config.republish.as_ref();
    let limits = config.consumer_limits.clone().unwrap_or_default();

    StreamSpec {
        name: config.name.clone(),
        description: non_empty(config.description.as_ref()),
        subjects: config.subjects.clone(),
        max_msgs: config.max_messages,
        max_bytes: config.max_bytes,
        max_age: seconds_or(config.max_age, 0),
        duplicate_window: seconds_or(config.duplicate_window, 0),
        max_msg_size: i64::from(config.max_message_size),
        max_msgs_per_subject: config.max_messages_per_subject,
        storage: config.storage.name().to_string(),
        ack: !config.no_ack,
        retention: config.retention.name().to_string(),
        discard: config.discard.name().to_string(),
        discard_new_per_subject: config.discard_new_per_subject,
        max_consumers: i64::from(config.max_consumers),
        replicas: config.num_replicas as i64,
        placement_cluster,
        placement_tags,
        mirror: config.mirror.as_ref().map(source_from_remote),
        sources: config
            .sources
            .iter()
            .flatten()
            .map(source_from_remote)
            .collect(),
        mirror_direct: config.mirror_direct,
        allow_direct: config.allow_direct,
        deny_delete: config.deny_delete,
        deny_purge: config.deny_purge,
        allow_rollup_hdrs: config.allow_rollup,
        compression: config
            .compression
            .as_ref()
            .unwrap_or(&Compression::None)
            .name()
            .to_string(),
        subject_transform: config.subject_transform.as_ref().map(transform_from_remote),
        republish_source: republish.map(|r| r.source.clone()),
        republish_destination: republish.map(|r| r.destination.clone()),
        republish_headers_only: republish.is_some_and(|r| r.headers_only),
        metadata: sanitize_metadata(&config.metadata),
        inactive_threshold: seconds_or(limits.inactive_threshold, 0),
        max_ack_pending: limits.max_ack_pending,
    }
}

/// Consumer limits are only sent when one of them is set
fn limits_set(limits: &ConsumerLimits) -> bool {
    !limits.inactive_threshold.is_zero() || limits.max_ack_pending > 0
}

/// Placement is only sent when a cluster is named; tags alone are dropped
pub(crate) fn placement(cluster: Option<&String>, tags: &[String]) -> Option<Placement> {
    non_empty(cluster).map(|cluster| Placement {
        cluster: Some(cluster),
        tags: tags.to_vec(),
    })
}

pub(crate) fn placement_from_remote(placement: Option<&Placement>) -> (Option<String>, Vec<String>) {
    match placement.and_then(|p| non_empty(p.cluster.as_ref()).map(|c| (c, p))) {
        Some((cluster, p)) => (Some(cluster), p.tags.clone()),
        None => (None, Vec::new()),
    }
}

fn source_to_remote(field: &'static str, spec: &StreamSourceSpec) -> Result<Source> {
    if spec.name.is_empty() {
        return Err(Error::invalid_config(format!("{} requires a stream name", field)));
    }

    let start_time = non_empty(spec.start_time.as_ref())
        .map(|ts| parse_timestamp("start_time", &ts))
        .transpose()?;

    Ok(Source {
        name: spec.name.clone(),
        start_sequence: (spec.start_seq > 0).then_some(spec.start_seq),
        start_time,
        filter_subject: non_empty(spec.filter_subject.as_ref()),
        subject_transforms: spec.subject_transforms.iter().map(transform_to_remote).collect(),
        external: spec.external.as_ref().map(|e| External {
            api_prefix: e.api.clone(),
            delivery_prefix: Some(e.deliver.clone()).filter(|d| !d.is_empty()),
        }),
        ..Source::default()
    })
}

fn source_from_remote(source: &Source) -> StreamSourceSpec {
    StreamSourceSpec {
        name: source.name.clone(),
        start_seq: source.start_sequence.unwrap_or(0),
        start_time: source.start_time.as_ref().map(format_timestamp),
        filter_subject: non_empty(source.filter_subject.as_ref()),
        subject_transforms: source
            .subject_transforms
            .iter()
            .map(transform_from_remote)
            .collect(),
        external: source.external.as_ref().map(|e| ExternalSpec {
            api: e.api_prefix.clone(),
            deliver: e.delivery_prefix.clone().unwrap_or_default(),
        }),
    }
}

fn transform_to_remote(spec: &SubjectTransformSpec) -> SubjectTransform {
    SubjectTransform {
        source: spec.source.clone(),
        destination: spec.destination.clone(),
    }
}

fn transform_from_remote(transform: &SubjectTransform) -> SubjectTransformSpec {
    SubjectTransformSpec {
        source: transform.source.clone(),
        destination: transform.destination.clone(),
    }
}
