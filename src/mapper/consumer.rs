//! Consumer mapping

use super::{
    disabled_or_seconds, narrow, non_empty, required_seconds, resolve_start, sanitize_metadata,
    seconds_or, Policy, StartPolicy, DEFAULT_MAX_WAITING,
};
use crate::desired::ConsumerSpec;
use crate::error::{Error, Result};
use crate::identity::{parse_stream_id, Identity};
use crate::nats::types::{is_push, AckPolicy, ConsumerConfig, ReplayPolicy};
use std::time::Duration;

/// A consumer configuration together with the stream it is created on
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerTarget {
    pub stream: String,
    pub config: ConsumerConfig,
}

/// Map a desired consumer to its stream and remote configuration
pub fn to_remote(spec: &ConsumerSpec) -> Result<ConsumerTarget> {
    let stream = parse_stream_id(&spec.stream_id)?;
    let deliver_policy = resolve_start(spec)?.to_wire();

    let deliver_subject = non_empty(spec.delivery_subject.as_ref());
    let deliver_group = non_empty(spec.delivery_group.as_ref());

    if deliver_subject.is_some() && spec.max_waiting.is_some() {
        return Err(Error::invalid_config(
            "max_waiting only applies to pull consumers and can not be set with delivery_subject",
        ));
    }
    if deliver_group.is_some() && deliver_subject.is_none() {
        return Err(Error::invalid_config("delivery_group requires delivery_subject"));
    }

    let filter_subject = non_empty(spec.filter_subject.as_ref());
    let (filter_subject, filter_subjects) = match (filter_subject, spec.filter_subjects.as_slice()) {
        (Some(_), [_, ..]) => {
            return Err(Error::invalid_config(
                "filter_subject and filter_subjects are mutually exclusive",
            ))
        },
        (None, [only]) => (only.clone(), Vec::new()),
        (single, many) => (single.unwrap_or_default(), many.to_vec()),
    };

    // the server fills in its own default for a pull consumer without one
    let max_waiting = match deliver_subject {
        Some(_) => 0,
        None => spec
            .max_waiting
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_MAX_WAITING),
    };

    let backoff = spec
        .backoff
        .iter()
        .map(|&secs| {
            if secs > 0 {
                Ok(Duration::from_secs(secs as u64))
            } else {
                Err(Error::invalid_config(format!(
                    "backoff values must be positive, got {}",
                    secs
                )))
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ConsumerTarget {
        stream,
        config: ConsumerConfig {
            durable_name: Some(spec.durable_name.clone()),
            description: non_empty(spec.description.as_ref()),
            deliver_policy,
            ack_policy: AckPolicy::resolve(&spec.ack_policy)?,
            ack_wait: required_seconds("ack_wait", spec.ack_wait)?,
            max_deliver: spec.max_delivery,
            backoff,
            filter_subject,
            filter_subjects,
            replay_policy: ReplayPolicy::resolve(&spec.replay_policy)?,
            rate_limit: spec.ratelimit,
            sample_frequency: spec.sample_freq,
            max_waiting,
            max_ack_pending: spec.max_ack_pending,
            flow_control: spec.flow_control,
            idle_heartbeat: disabled_or_seconds("heartbeat", spec.heartbeat)?,
            headers_only: spec.headers_only,
            max_batch: spec.max_batch,
            max_expires: disabled_or_seconds("max_expires", spec.max_expires)?,
            max_bytes: spec.max_bytes,
            inactive_threshold: disabled_or_seconds("inactive_threshold", spec.inactive_threshold)?,
            num_replicas: narrow("replicas", spec.replicas)?,
            memory_storage: spec.memory,
            deliver_subject,
            deliver_group,
            metadata: sanitize_metadata(&spec.metadata),
            ..ConsumerConfig::default()
        },
    })
}

/// Project a remote consumer configuration back into desired state
pub fn from_remote(stream: &str, config: &ConsumerConfig) -> ConsumerSpec {
    let durable_name = config
        .durable_name
        .clone()
        .or_else(|| config.name.clone())
        .unwrap_or_default();

    let mut spec = ConsumerSpec {
        stream_id: Identity::stream(stream).encode(),
        durable_name,
        description: non_empty(config.description.as_ref()),
        metadata: sanitize_metadata(&config.metadata),
        delivery_subject: config.deliver_subject.clone(),
        delivery_group: config.deliver_group.clone(),
        ack_policy: config.ack_policy.name().to_string(),
        ack_wait: seconds_or(config.ack_wait, 0),
        max_delivery: config.max_deliver,
        filter_subject: non_empty(Some(&config.filter_subject)),
        filter_subjects: config.filter_subjects.clone(),
        replay_policy: config.replay_policy.name().to_string(),
        sample_freq: config.sample_frequency,
        ratelimit: config.rate_limit,
        max_ack_pending: config.max_ack_pending,
        heartbeat: seconds_or(config.idle_heartbeat, 0),
        flow_control: config.flow_control,
        max_waiting: (!is_push(config)
            && config.max_waiting > 0
            && config.max_waiting != DEFAULT_MAX_WAITING)
            .then_some(config.max_waiting),
        headers_only: config.headers_only,
        max_batch: config.max_batch,
        max_expires: seconds_or(config.max_expires, 0),
        max_bytes: config.max_bytes,
        inactive_threshold: seconds_or(config.inactive_threshold, 0),
        replicas: config.num_replicas as i64,
        memory: config.memory_storage,
        backoff: config
            .backoff
            .iter()
            .map(|d| d.as_secs().min(i64::MAX as u64) as i64)
            .collect(),
        ..ConsumerSpec::default()
    };

    StartPolicy::from_wire(config).apply_to(&mut spec);
    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nats::types::DeliverPolicy;

    #[test]
    fn test_stream_is_decoded_from_identity() {
        let target = to_remote(&ConsumerSpec::new("JETSTREAM_STREAM_ORDERS", "C1")).unwrap();
        assert_eq!(target.stream, "ORDERS");
        assert_eq!(target.config.durable_name.as_deref(), Some("C1"));
        assert_eq!(target.config.ack_wait, Duration::from_secs(30));
        assert_eq!(target.config.deliver_policy, DeliverPolicy::All);

        let err = to_remote(&ConsumerSpec::new("ORDERS", "C1")).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentity { .. }));
    }

    #[test]
    fn test_max_waiting_on_push_consumer_is_rejected() {
        let mut spec = ConsumerSpec::new("JETSTREAM_STREAM_ORDERS", "C1");
        spec.delivery_subject = Some("deliver.c1".to_string());
        spec.max_waiting = Some(10);
        assert!(matches!(to_remote(&spec), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_single_filter_subject_collapses() {
        let mut spec = ConsumerSpec::new("JETSTREAM_STREAM_ORDERS", "C1");
        spec.filter_subjects = vec!["ORDERS.new".to_string()];
        let config = to_remote(&spec).unwrap().config;
        assert_eq!(config.filter_subject, "ORDERS.new");
        assert!(config.filter_subjects.is_empty());

        spec.filter_subjects.push("ORDERS.paid".to_string());
        let config = to_remote(&spec).unwrap().config;
        assert!(config.filter_subject.is_empty());
        assert_eq!(config.filter_subjects.len(), 2);

        spec.filter_subject = Some("ORDERS.*".to_string());
        assert!(matches!(to_remote(&spec), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_sample_frequency_wire_form() {
        let mut spec = ConsumerSpec::new("JETSTREAM_STREAM_ORDERS", "C1");
        assert_eq!(to_remote(&spec).unwrap().config.sample_frequency, 0);
        spec.sample_freq = 25;
        let config = to_remote(&spec).unwrap().config;
        assert_eq!(serde_json::to_value(&config).unwrap()["sample_freq"], 25);
    }

    #[test]
    fn test_pull_consumer_gets_server_default_max_waiting() {
        let spec = ConsumerSpec::new("JETSTREAM_STREAM_ORDERS", "C1");
        let target = to_remote(&spec).unwrap();
        assert_eq!(target.config.max_waiting, DEFAULT_MAX_WAITING);
        assert_eq!(from_remote(&target.stream, &target.config).max_waiting, None);

        let mut spec = ConsumerSpec::new("JETSTREAM_STREAM_ORDERS", "C1");
        spec.max_waiting = Some(64);
        let target = to_remote(&spec).unwrap();
        assert_eq!(target.config.max_waiting, 64);
        assert_eq!(from_remote(&target.stream, &target.config).max_waiting, Some(64));

        let mut spec = ConsumerSpec::new("JETSTREAM_STREAM_ORDERS", "C1");
        spec.delivery_subject = Some("deliver.c1".to_string());
        assert_eq!(to_remote(&spec).unwrap().config.max_waiting, 0);
    }

    #[test]
    fn test_ack_wait_must_be_set() {
        let mut spec = ConsumerSpec::new("JETSTREAM_STREAM_ORDERS", "C1");
        spec.ack_wait = 0;
        assert!(matches!(to_remote(&spec), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_backoff_in_seconds() {
        let mut spec = ConsumerSpec::new("JETSTREAM_STREAM_ORDERS", "C1");
        spec.backoff = vec![30, 60];
        assert_eq!(
            to_remote(&spec).unwrap().config.backoff,
            vec![Duration::from_secs(30), Duration::from_secs(60)]
        );

        spec.backoff = vec![0];
        assert!(matches!(to_remote(&spec), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_round_trip() {
        let mut spec = ConsumerSpec::new("JETSTREAM_STREAM_ORDERS", "C1");
        spec.stream_sequence = 100;
        spec.description = Some("processor".to_string());
        spec.max_waiting = Some(128);
        spec.backoff = vec![30, 60];
        spec.max_delivery = 5;

        let target = to_remote(&spec).unwrap();
        assert_eq!(from_remote(&target.stream, &target.config), spec);
    }

    #[test]
    fn test_all_messages_round_trip() {
        let mut spec = ConsumerSpec::new("JETSTREAM_STREAM_ORDERS", "C1");
        spec.deliver_all = true;
        let target = to_remote(&spec).unwrap();
        assert_eq!(from_remote(&target.stream, &target.config), spec);
    }
}
