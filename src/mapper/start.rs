//! Consumer start position
//!
//! A consumer starts at exactly one position. The caller may set at most one
//! of six inputs; none set means all messages, two or more is rejected
//! instead of being silently prioritized.

use super::{format_timestamp, parse_timestamp};
use crate::desired::ConsumerSpec;
use crate::error::{Error, Result};
use crate::nats::types::{ConsumerConfig, DeliverPolicy};
use time::OffsetDateTime;

/// Where a new consumer begins delivering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPolicy {
    #[default]
    AllMessages,
    LastMessage,
    LastPerSubject,
    NewMessagesOnly,
    FromSequence(u64),
    FromTimestamp(OffsetDateTime),
}

/// Resolve the single start position a consumer declares
pub fn resolve_start(spec: &ConsumerSpec) -> Result<StartPolicy> {
    let start_time = spec.start_time.as_deref().filter(|t| !t.is_empty());

    let set: Vec<&'static str> = [
        ("stream_sequence", spec.stream_sequence > 0),
        ("start_time", start_time.is_some()),
        ("deliver_all", spec.deliver_all),
        ("deliver_last", spec.deliver_last),
        ("deliver_new", spec.deliver_new),
        ("deliver_last_per_subject", spec.deliver_last_per_subject),
    ]
    .into_iter()
    .filter_map(|(field, is_set)| is_set.then_some(field))
    .collect();

    if set.len() > 1 {
        return Err(Error::AmbiguousStartPolicy { fields: set });
    }

    let policy = match set.first().copied() {
        None | Some("deliver_all") => StartPolicy::AllMessages,
        Some("stream_sequence") => StartPolicy::FromSequence(spec.stream_sequence),
        Some("deliver_last") => StartPolicy::LastMessage,
        Some("deliver_new") => StartPolicy::NewMessagesOnly,
        Some("deliver_last_per_subject") => StartPolicy::LastPerSubject,
        Some(_) => match start_time {
            Some(ts) => StartPolicy::FromTimestamp(parse_timestamp("start_time", ts)?),
            None => StartPolicy::AllMessages,
        },
    };

    Ok(policy)
}

impl StartPolicy {
    /// Deliver policy sent to the server
    pub fn to_wire(self) -> DeliverPolicy {
        match self {
            Self::AllMessages => DeliverPolicy::All,
            Self::LastMessage => DeliverPolicy::Last,
            Self::LastPerSubject => DeliverPolicy::LastPerSubject,
            Self::NewMessagesOnly => DeliverPolicy::New,
            Self::FromSequence(start_sequence) => DeliverPolicy::ByStartSequence { start_sequence },
            Self::FromTimestamp(start_time) => DeliverPolicy::ByStartTime { start_time },
        }
    }

    /// Start position reported by a consumer configuration
    pub fn from_wire(config: &ConsumerConfig) -> Self {
        match config.deliver_policy {
            DeliverPolicy::All => Self::AllMessages,
            DeliverPolicy::Last => Self::LastMessage,
            DeliverPolicy::LastPerSubject => Self::LastPerSubject,
            DeliverPolicy::New => Self::NewMessagesOnly,
            DeliverPolicy::ByStartSequence { start_sequence } => Self::FromSequence(start_sequence),
            DeliverPolicy::ByStartTime { start_time } => Self::FromTimestamp(start_time),
        }
    }

    /// Write this position into the six start inputs of a desired consumer
    ///
    /// Exactly one input is set afterwards; `AllMessages` sets `deliver_all`.
    pub fn apply_to(self, spec: &mut ConsumerSpec) {
        spec.stream_sequence = 0;
        spec.start_time = None;
        spec.deliver_all = false;
        spec.deliver_last = false;
        spec.deliver_new = false;
        spec.deliver_last_per_subject = false;

        match self {
            Self::AllMessages => spec.deliver_all = true,
            Self::LastMessage => spec.deliver_last = true,
            Self::LastPerSubject => spec.deliver_last_per_subject = true,
            Self::NewMessagesOnly => spec.deliver_new = true,
            Self::FromSequence(seq) => spec.stream_sequence = seq,
            Self::FromTimestamp(ts) => spec.start_time = Some(format_timestamp(&ts)),
        }
    }
}
