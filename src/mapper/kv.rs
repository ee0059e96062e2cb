//! Key-value bucket and entry mapping

use super::stream::{placement, placement_from_remote};
use super::{disabled_or_seconds, narrow, non_empty, seconds_or};
use crate::desired::{KvBucketSpec, KvEntrySpec};
use crate::error::Result;
use crate::nats::types::{KvBucketConfig, KvEntry, StorageType};

pub fn bucket_to_remote(spec: &KvBucketSpec) -> Result<KvBucketConfig> {
    Ok(KvBucketConfig {
        bucket: spec.name.clone(),
        description: non_empty(spec.description.as_ref()),
        // a bucket always keeps at least the latest value
        history: spec.history.max(1),
        max_age: disabled_or_seconds("ttl", spec.ttl)?,
        max_value_size: narrow("max_value_size", spec.max_value_size)?,
        max_bytes: spec.max_bucket_size,
        storage: StorageType::File,
        num_replicas: narrow("replicas", spec.replicas)?,
        placement: placement(spec.placement_cluster.as_ref(), &spec.placement_tags),
    })
}

pub fn bucket_from_remote(config: &KvBucketConfig) -> KvBucketSpec {
    let (placement_cluster, placement_tags) = placement_from_remote(config.placement.as_ref());

    KvBucketSpec {
        name: config.bucket.clone(),
        description: non_empty(config.description.as_ref()),
        history: config.history,
        ttl: seconds_or(config.max_age, 0),
        max_value_size: i64::from(config.max_value_size),
        max_bucket_size: config.max_bytes,
        placement_cluster,
        placement_tags,
        replicas: config.num_replicas as i64,
    }
}

/// Entries are written as the raw bytes of the declared value
pub fn entry_to_remote(spec: &KvEntrySpec) -> KvEntry {
    KvEntry {
        bucket: spec.bucket.clone(),
        key: spec.key.clone(),
        value: spec.value.as_bytes().to_vec(),
        revision: 0,
    }
}

pub fn entry_from_remote(entry: &KvEntry) -> KvEntrySpec {
    KvEntrySpec {
        bucket: entry.bucket.clone(),
        key: entry.key.clone(),
        value: String::from_utf8_lossy(&entry.value).into_owned(),
        revision: Some(entry.revision),
    }
}
