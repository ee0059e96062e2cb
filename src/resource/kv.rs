//! Key-value bucket and entry lifecycles

use super::registry::{check_immutable, ResourceKind};
use crate::desired::{KvBucketSpec, KvEntrySpec};
use crate::error::{Error, RemoteContext, Result};
use crate::identity::Identity;
use crate::mapper::kv::{bucket_from_remote, bucket_to_remote, entry_from_remote, entry_to_remote};
use crate::nats::types::{KvBucketConfig, KvEntry};
use crate::nats::JetStreamApi;
use crate::validate::{check_placement, ensure_valid, validate, RemoteConfig, ServerLimits};

// =============================================================================
// Buckets
// =============================================================================

pub fn prepare_bucket(spec: &KvBucketSpec) -> Result<KvBucketConfig> {
    let config = bucket_to_remote(spec)?;

    let mut violations = validate(RemoteConfig::KvBucket(&config), &ServerLimits::default());
    violations.extend(check_placement(
        spec.placement_cluster.as_deref(),
        &spec.placement_tags,
    ));
    ensure_valid(ResourceKind::KvBucket, &spec.name, violations)?;

    Ok(config)
}

pub async fn create_bucket<S: JetStreamApi + ?Sized>(session: &S, config: &KvBucketConfig) -> Result<KvBucketSpec> {
    let id = Identity::kv_bucket(&config.bucket).encode();

    session
        .create_kv_bucket(config)
        .await
        .remote(ResourceKind::KvBucket, &id)?;
    tracing::info!("Created kv bucket {}", config.bucket);

    let current = session
        .load_kv_bucket(&config.bucket)
        .await
        .remote(ResourceKind::KvBucket, &id)?;
    Ok(bucket_from_remote(&current))
}

pub async fn read_bucket<S: JetStreamApi + ?Sized>(session: &S, bucket: &str) -> Result<Option<KvBucketSpec>> {
    let id = Identity::kv_bucket(bucket).encode();

    if !session
        .kv_bucket_exists(bucket)
        .await
        .remote(ResourceKind::KvBucket, &id)?
    {
        tracing::info!("Kv bucket {} no longer exists", bucket);
        return Ok(None);
    }

    let current = session
        .load_kv_bucket(bucket)
        .await
        .remote(ResourceKind::KvBucket, &id)?;
    Ok(Some(bucket_from_remote(&current)))
}

pub async fn update_bucket<S: JetStreamApi + ?Sized>(
    session: &S,
    bucket: &str,
    config: &KvBucketConfig,
) -> Result<Option<KvBucketSpec>> {
    let id = Identity::kv_bucket(bucket).encode();

    if !session
        .kv_bucket_exists(bucket)
        .await
        .remote(ResourceKind::KvBucket, &id)?
    {
        tracing::info!("Kv bucket {} no longer exists, not updating", bucket);
        return Ok(None);
    }

    let current = session
        .load_kv_bucket(bucket)
        .await
        .remote(ResourceKind::KvBucket, &id)?;
    check_immutable(ResourceKind::KvBucket, config, &current)?;

    session
        .update_kv_bucket(config)
        .await
        .remote(ResourceKind::KvBucket, &id)?;
    tracing::info!("Updated kv bucket {}", bucket);

    read_bucket(session, bucket).await
}

pub async fn delete_bucket<S: JetStreamApi + ?Sized>(session: &S, bucket: &str) -> Result<()> {
    let id = Identity::kv_bucket(bucket).encode();

    if !session
        .kv_bucket_exists(bucket)
        .await
        .remote(ResourceKind::KvBucket, &id)?
    {
        tracing::info!("Kv bucket {} already absent", bucket);
        return Ok(());
    }

    session
        .delete_kv_bucket(bucket)
        .await
        .remote(ResourceKind::KvBucket, &id)?;
    tracing::info!("Deleted kv bucket {}", bucket);
    Ok(())
}

// =============================================================================
// Entries
// =============================================================================

pub fn prepare_entry(spec: &KvEntrySpec) -> Result<KvEntry> {
    let entry = entry_to_remote(spec);
    ensure_valid(
        ResourceKind::KvEntry,
        &spec.key,
        validate(RemoteConfig::KvEntry(&entry), &ServerLimits::default()),
    )?;
    Ok(entry)
}

async fn put<S: JetStreamApi + ?Sized>(session: &S, entry: &KvEntry, id: &str) -> Result<KvEntrySpec> {
    let revision = session
        .put_kv_entry(&entry.bucket, &entry.key, &entry.value)
        .await
        .remote(ResourceKind::KvEntry, id)?;

    Ok(entry_from_remote(&KvEntry {
        revision,
        ..entry.clone()
    }))
}

pub async fn create_entry<S: JetStreamApi + ?Sized>(session: &S, entry: &KvEntry) -> Result<KvEntrySpec> {
    let id = Identity::kv_entry(&entry.bucket, &entry.key).encode();
    let bucket_id = Identity::kv_bucket(&entry.bucket).encode();

    if !session
        .kv_bucket_exists(&entry.bucket)
        .await
        .remote(ResourceKind::KvBucket, &bucket_id)?
    {
        return Err(Error::NotFound {
            kind: ResourceKind::KvBucket,
            identity: bucket_id,
        });
    }

    let created = put(session, entry, &id).await?;
    tracing::info!("Put kv entry {} in bucket {}", entry.key, entry.bucket);
    Ok(created)
}

pub async fn read_entry<S: JetStreamApi + ?Sized>(session: &S, bucket: &str, key: &str) -> Result<Option<KvEntrySpec>> {
    let id = Identity::kv_entry(bucket, key).encode();

    if !session
        .kv_entry_exists(bucket, key)
        .await
        .remote(ResourceKind::KvEntry, &id)?
    {
        tracing::info!("Kv entry {} in bucket {} no longer exists", key, bucket);
        return Ok(None);
    }

    let current = session
        .load_kv_entry(bucket, key)
        .await
        .remote(ResourceKind::KvEntry, &id)?;
    Ok(Some(entry_from_remote(&current)))
}

pub async fn update_entry<S: JetStreamApi + ?Sized>(
    session: &S,
    bucket: &str,
    key: &str,
    entry: &KvEntry,
) -> Result<Option<KvEntrySpec>> {
    let id = Identity::kv_entry(bucket, key).encode();

    if !session
        .kv_entry_exists(bucket, key)
        .await
        .remote(ResourceKind::KvEntry, &id)?
    {
        tracing::info!("Kv entry {} in bucket {} no longer exists, not updating", key, bucket);
        return Ok(None);
    }

    let current = session
        .load_kv_entry(bucket, key)
        .await
        .remote(ResourceKind::KvEntry, &id)?;
    check_immutable(ResourceKind::KvEntry, entry, &current)?;

    let updated = put(session, entry, &id).await?;
    tracing::info!("Updated kv entry {} in bucket {}", key, bucket);
    Ok(Some(updated))
}

pub async fn delete_entry<S: JetStreamApi + ?Sized>(session: &S, bucket: &str, key: &str) -> Result<()> {
    let id = Identity::kv_entry(bucket, key).encode();

    if !session
        .kv_entry_exists(bucket, key)
        .await
        .remote(ResourceKind::KvEntry, &id)?
    {
        tracing::info!("Kv entry {} in bucket {} already absent", key, bucket);
        return Ok(());
    }

    session
        .delete_kv_entry(bucket, key)
        .await
        .remote(ResourceKind::KvEntry, &id)?;
    tracing::info!("Deleted kv entry {} in bucket {}", key, bucket);
    Ok(())
}
