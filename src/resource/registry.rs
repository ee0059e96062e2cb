//! Resource Registry - Load resource kind definitions from JSON
//!
//! Each managed kind is described in embedded JSON: its display name and
//! the configuration paths that cannot be changed without replacing the
//! resource. The lifecycle code looks kinds up here instead of hardcoding
//! per-kind field lists.

use crate::error::{Error, Result as EngineResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[include_str!("../resources/jetstream.json")];

/// Kind of managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Stream,
    Consumer,
    StreamTemplate,
    KvBucket,
    KvEntry,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        Self::Stream,
        Self::Consumer,
        Self::StreamTemplate,
        Self::KvBucket,
        Self::KvEntry,
    ];

    /// Registry key, also the manifest `kind:` tag
    pub fn key(self) -> &'static str {
        match self {
            Self::Stream => "stream",
            Self::Consumer => "consumer",
            Self::StreamTemplate => "stream_template",
            Self::KvBucket => "kv_bucket",
            Self::KvEntry => "kv_entry",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stream => "stream",
            Self::Consumer => "consumer",
            Self::StreamTemplate => "stream template",
            Self::KvBucket => "kv bucket",
            Self::KvEntry => "kv entry",
        };
        f.write_str(name)
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| {
                let keys: Vec<&str> = Self::ALL.iter().map(|k| k.key()).collect();
                format!("unknown resource kind {:?}, expected one of: {}", s, keys.join(", "))
            })
    }
}

/// Immutable attribute definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ImmutableDef {
    /// Dot path into the remote configuration document
    pub path: String,
    /// Attribute name reported to the caller
    pub field: String,
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    #[serde(default)]
    pub immutable: Vec<ImmutableDef>,
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        final_config
    })
}

/// Get a resource definition by kind
pub fn get_resource(kind: ResourceKind) -> Option<&'static ResourceDef> {
    get_registry().resources.get(kind.key())
}

/// Walk a dot path through a JSON document
///
/// Numeric segments index into arrays. A missing segment yields `None`.
pub fn extract_json_value<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = item;

    for part in path.split('.') {
        current = match part.parse::<usize>() {
            Ok(idx) => current.get(idx)?,
            Err(_) => current.get(part)?,
        };
    }

    match current {
        Value::Null => None,
        other => Some(other),
    }
}

/// First immutable attribute whose value differs between two documents
///
/// Both documents are remote configurations of the given kind serialized to
/// JSON. An attribute absent from one side and present on the other counts
/// as changed.
pub fn immutable_change(kind: ResourceKind, desired: &Value, current: &Value) -> Option<&'static str> {
    let def = get_resource(kind)?;

    def.immutable
        .iter()
        .find(|imm| {
            extract_json_value(desired, &imm.path) != extract_json_value(current, &imm.path)
        })
        .map(|imm| imm.field.as_str())
}

/// Fail when a desired configuration changes an immutable attribute
pub fn check_immutable<T: Serialize>(kind: ResourceKind, desired: &T, current: &T) -> EngineResult<()> {
    // plain configuration documents always serialize
    let desired = serde_json::to_value(desired).unwrap_or_default();
    let current = serde_json::to_value(current).unwrap_or_default();

    match immutable_change(kind, &desired, &current) {
        Some(field) => {
            tracing::debug!("{} change to immutable field {} rejected", kind, field);
            Err(Error::ImmutableFieldChanged { kind, field })
        },
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_loads_successfully() {
        let registry = get_registry();
        assert!(
            !registry.resources.is_empty(),
            "Registry should have resources"
        );
    }

    #[test]
    fn test_every_kind_is_registered() {
        for kind in ResourceKind::ALL {
            let def = get_resource(kind);
            assert!(def.is_some(), "{} should be registered", kind);
            assert_eq!(def.unwrap().display_name, kind.to_string());
        }
    }

    #[test]
    fn test_kind_keys_parse_back() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.key().parse::<ResourceKind>().unwrap(), kind);
        }
        assert!("queue".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_extract_json_value_paths() {
        let doc = json!({"config": {"subjects": ["a", "b"], "name": "T"}, "empty": null});
        assert_eq!(extract_json_value(&doc, "config.name"), Some(&json!("T")));
        assert_eq!(extract_json_value(&doc, "config.subjects.1"), Some(&json!("b")));
        assert_eq!(extract_json_value(&doc, "config.missing"), None);
        assert_eq!(extract_json_value(&doc, "empty"), None);
    }

    #[test]
    fn test_stream_storage_is_immutable() {
        let current = json!({"name": "ORDERS", "storage": "file", "max_msgs": 10});
        let desired = json!({"name": "ORDERS", "storage": "memory", "max_msgs": 10});
        assert_eq!(
            immutable_change(ResourceKind::Stream, &desired, &current),
            Some("storage")
        );

        let desired = json!({"name": "ORDERS", "storage": "file", "max_msgs": 99});
        assert_eq!(immutable_change(ResourceKind::Stream, &desired, &current), None);
    }

    #[test]
    fn test_consumer_start_fields_report_start_policy() {
        let current = json!({"durable_name": "C", "deliver_policy": "all"});
        let desired = json!({"durable_name": "C", "deliver_policy": "by_start_sequence", "opt_start_seq": 5});
        assert_eq!(
            immutable_change(ResourceKind::Consumer, &desired, &current),
            Some("start_policy")
        );
    }

    #[test]
    fn test_absent_on_both_sides_is_unchanged() {
        let current = json!({"durable_name": "C"});
        let desired = json!({"durable_name": "C"});
        assert_eq!(immutable_change(ResourceKind::Consumer, &desired, &current), None);
    }
}
