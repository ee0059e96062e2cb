//! Stream template mapping

use super::{disabled_or_seconds, narrow, required_seconds, seconds_or, Policy};
use crate::desired::StreamTemplateSpec;
use crate::error::{Error, Result};
use crate::nats::types::{RetentionPolicy, StorageType, StreamConfig, StreamTemplateConfig};

pub fn to_remote(spec: &StreamTemplateSpec) -> Result<StreamTemplateConfig> {
    if spec.subjects.is_empty() {
        return Err(Error::invalid_config(format!(
            "stream template {} needs subjects",
            spec.name
        )));
    }

    Ok(StreamTemplateConfig {
        name: spec.name.clone(),
        max_streams: spec.max_streams,
        config: StreamConfig {
            subjects: spec.subjects.clone(),
            max_messages: spec.max_msgs,
            max_bytes: spec.max_bytes,
            max_age: disabled_or_seconds("max_age", spec.max_age)?,
            duplicate_window: required_seconds("duplicate_window", spec.duplicate_window)?,
            max_message_size: narrow("max_msg_size", spec.max_msg_size)?,
            storage: StorageType::resolve(&spec.storage)?,
            no_ack: !spec.ack,
            retention: RetentionPolicy::resolve(&spec.retention)?,
            max_consumers: narrow("max_consumers", spec.max_consumers)?,
            num_replicas: narrow("replicas", spec.replicas)?,
            ..StreamConfig::default()
        },
    })
}

pub fn from_remote(template: &StreamTemplateConfig) -> StreamTemplateSpec {
    let config = &template.config;

    StreamTemplateSpec {
        name: template.name.clone(),
        max_streams: template.max_streams,
        subjects: config.subjects.clone(),
        max_msgs: config.max_messages,
        max_bytes: config.max_bytes,
        max_age: seconds_or(config.max_age, -1),
        duplicate_window: seconds_or(config.duplicate_window, 0),
        max_msg_size: i64::from(config.max_message_size),
        storage: config.storage.name().to_string(),
        ack: !config.no_ack,
        retention: config.retention.name().to_string(),
        max_consumers: i64::from(config.max_consumers),
        replicas: config.num_replicas as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> StreamTemplateSpec {
        StreamTemplateSpec {
            name: "ORDERS_T".to_string(),
            max_streams: 10,
            subjects: vec!["orders.*".to_string()],
            ..StreamTemplateSpec::default()
        }
    }

    #[test]
    fn test_template_wraps_stream_config() {
        let template = to_remote(&spec()).unwrap();
        assert_eq!(template.name, "ORDERS_T");
        assert_eq!(template.max_streams, 10);
        assert!(template.config.name.is_empty());
        assert_eq!(template.config.max_age, std::time::Duration::ZERO);
    }

    #[test]
    fn test_template_round_trip() {
        let template = to_remote(&spec()).unwrap();
        assert_eq!(from_remote(&template), spec());
    }

    #[test]
    fn test_template_duplicate_window_is_always_sent() {
        let mut spec = spec();
        spec.duplicate_window = 0;
        assert!(matches!(to_remote(&spec), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_template_needs_subjects() {
        let spec = StreamTemplateSpec {
            name: "EMPTY".to_string(),
            ..StreamTemplateSpec::default()
        };
        assert!(matches!(to_remote(&spec), Err(Error::InvalidConfiguration(_))));
    }
}
