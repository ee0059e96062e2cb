//! Config Mapper
//!
//! Pure translation between desired attribute sets and remote configuration
//! documents, one submodule per resource kind. Nothing in here performs I/O,
//! so the same desired state always maps to the same remote document.

pub mod consumer;
pub mod kv;
pub mod policy;
pub mod start;
pub mod stream;
pub mod template;

pub use policy::Policy;
pub use start::{resolve_start, StartPolicy};

use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;
use time::OffsetDateTime;

/// Metadata keys under this prefix are written by the server
pub const RESERVED_METADATA_PREFIX: &str = "_nats.";

/// Pull consumers left unset get this many waiting requests from the server
pub const DEFAULT_MAX_WAITING: i64 = 512;

/// Drop server-managed keys from a metadata map
pub fn sanitize_metadata<'a, M>(metadata: impl IntoIterator<Item = (&'a String, &'a String)>) -> M
where
    M: FromIterator<(String, String)>,
{
    metadata
        .into_iter()
        .filter(|(key, _)| !key.starts_with(RESERVED_METADATA_PREFIX))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Convert a duration declared in seconds
///
/// `0` and `-1` both mean the timer is disabled, sent as a zero duration.
pub fn disabled_or_seconds(field: &'static str, seconds: i64) -> Result<Duration> {
    match seconds {
        0 | -1 => Ok(Duration::ZERO),
        s if s < 0 => Err(Error::invalid_config(format!(
            "{} must be a positive number of seconds, 0 or -1, got {}",
            field, s
        ))),
        s => Ok(Duration::from_secs(s as u64)),
    }
}

/// Convert a duration the server replaces with its own default when zero
pub fn required_seconds(field: &'static str, seconds: i64) -> Result<Duration> {
    if seconds < 1 {
        return Err(Error::invalid_config(format!(
            "{} must be at least one second, got {}",
            field, seconds
        )));
    }
    Ok(Duration::from_secs(seconds as u64))
}

/// Project a remote duration back to whole seconds, `disabled` when zero
pub fn seconds_or(duration: Duration, disabled: i64) -> i64 {
    if duration.is_zero() {
        disabled
    } else {
        duration.as_secs().min(i64::MAX as u64) as i64
    }
}

/// Fit a declared integer into the width the remote field uses
pub fn narrow<T: TryFrom<i64>>(field: &'static str, value: i64) -> Result<T> {
    T::try_from(value)
        .map_err(|_| Error::invalid_config(format!("{} is out of range: {}", field, value)))
}

/// Parse an RFC3339 timestamp attribute
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<OffsetDateTime> {
    let invalid = |reason: String| Error::InvalidTimestamp {
        field,
        value: value.to_string(),
        reason,
    };

    let parsed = DateTime::parse_from_rfc3339(value).map_err(|e| invalid(e.to_string()))?;
    OffsetDateTime::from_unix_timestamp(parsed.timestamp())
        .and_then(|ts| ts.replace_nanosecond(parsed.timestamp_subsec_nanos()))
        .map_err(|e| invalid(e.to_string()))
}

/// Format a timestamp the way it is declared
pub fn format_timestamp(ts: &OffsetDateTime) -> String {
    DateTime::<Utc>::from_timestamp(ts.unix_timestamp(), ts.nanosecond())
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_default()
}

/// Empty strings count as unset
fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_sanitize_metadata_strips_reserved_prefix() {
        let metadata = BTreeMap::from([
            ("foo".to_string(), "bar".to_string()),
            ("_nats.req.level".to_string(), "1".to_string()),
            ("_natsish".to_string(), "kept".to_string()),
        ]);
        let clean: HashMap<String, String> = sanitize_metadata(&metadata);
        assert_eq!(clean.len(), 2);
        assert!(clean.contains_key("foo"));
        assert!(clean.contains_key("_natsish"));

        let back: BTreeMap<String, String> = sanitize_metadata(&clean);
        assert_eq!(back.len(), 2);
    }

    #[test]
    fn test_disabled_durations() {
        assert_eq!(disabled_or_seconds("max_age", 0).unwrap(), Duration::ZERO);
        assert_eq!(disabled_or_seconds("max_age", -1).unwrap(), Duration::ZERO);
        assert_eq!(
            disabled_or_seconds("max_age", 60).unwrap(),
            Duration::from_secs(60)
        );
        assert!(matches!(
            disabled_or_seconds("max_age", -5),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_seconds_or_projects_disabled_value() {
        assert_eq!(seconds_or(Duration::ZERO, 0), 0);
        assert_eq!(seconds_or(Duration::ZERO, -1), -1);
        assert_eq!(seconds_or(Duration::from_millis(90_500), 0), 90);
    }

    #[test]
    fn test_server_defaulted_durations_must_be_explicit() {
        assert_eq!(
            required_seconds("duplicate_window", 120).unwrap(),
            Duration::from_secs(120)
        );
        for seconds in [0, -1] {
            assert!(matches!(
                required_seconds("duplicate_window", seconds),
                Err(Error::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_narrow_integers() {
        assert_eq!(narrow::<i32>("max_consumers", -1).unwrap(), -1);
        assert_eq!(narrow::<usize>("replicas", 3).unwrap(), 3);
        assert!(narrow::<usize>("replicas", -1).is_err());
        assert!(narrow::<i32>("max_msg_size", i64::MAX).is_err());
    }

    #[test]
    fn test_timestamps() {
        let ts = parse_timestamp("start_time", "2024-03-01T10:00:00+02:00").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-03-01T08:00:00Z");

        let ts = parse_timestamp("start_time", "2024-03-01T08:00:00.250Z").unwrap();
        assert_eq!(ts.nanosecond(), 250_000_000);
        assert_eq!(format_timestamp(&ts), "2024-03-01T08:00:00.250Z");

        let err = parse_timestamp("start_time", "yesterday").unwrap_err();
        assert!(matches!(err, Error::InvalidTimestamp { field: "start_time", .. }));
    }
}
