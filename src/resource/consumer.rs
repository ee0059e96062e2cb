//! Consumer lifecycle
//!
//! Consumers live on a stream that must already exist. Creating a consumer
//! that the server already knows under the same durable name updates it in
//! place; the identities match exactly, so nothing else can be overwritten.

use super::registry::{check_immutable, ResourceKind};
use crate::desired::ConsumerSpec;
use crate::error::{Error, RemoteContext, Result};
use crate::identity::Identity;
use crate::mapper::consumer::{from_remote, to_remote, ConsumerTarget};
use crate::nats::JetStreamApi;
use crate::validate::{ensure_valid, validate, validate_consumer_for_stream, RemoteConfig, ServerLimits};

const KIND: ResourceKind = ResourceKind::Consumer;

/// Map and validate a desired consumer without touching the network
pub fn prepare(spec: &ConsumerSpec, limits: &ServerLimits) -> Result<ConsumerTarget> {
    let target = to_remote(spec)?;
    ensure_valid(
        KIND,
        &spec.durable_name,
        validate(RemoteConfig::Consumer(&target.config), limits),
    )?;
    Ok(target)
}

fn durable_name(target: &ConsumerTarget) -> &str {
    target.config.durable_name.as_deref().unwrap_or_default()
}

/// The owning stream must exist and its consumer limits must be met
async fn check_stream<S: JetStreamApi + ?Sized>(session: &S, target: &ConsumerTarget) -> Result<()> {
    let stream_id = Identity::stream(&target.stream).encode();

    if !session
        .stream_exists(&target.stream)
        .await
        .remote(ResourceKind::Stream, &stream_id)?
    {
        return Err(Error::NotFound {
            kind: ResourceKind::Stream,
            identity: stream_id,
        });
    }

    let stream = session
        .load_stream(&target.stream)
        .await
        .remote(ResourceKind::Stream, &stream_id)?;
    ensure_valid(
        KIND,
        durable_name(target),
        validate_consumer_for_stream(&target.config, &stream),
    )
}

pub async fn create<S: JetStreamApi + ?Sized>(session: &S, target: &ConsumerTarget) -> Result<ConsumerSpec> {
    let durable = durable_name(target);
    let id = Identity::consumer(&target.stream, durable).encode();

    check_stream(session, target).await?;

    match session.create_consumer(&target.stream, &target.config).await {
        Ok(()) => tracing::info!("Created consumer {} on stream {}", durable, target.stream),
        Err(e) if e.is_already_exists() => {
            tracing::info!(
                "Consumer {} already exists on stream {}, updating in place",
                durable,
                target.stream
            );
            session
                .update_consumer(&target.stream, &target.config)
                .await
                .remote(KIND, &id)?;
        },
        Err(source) => {
            return Err(Error::Remote {
                kind: KIND,
                identity: id,
                source,
            })
        },
    }

    let current = session
        .load_consumer(&target.stream, durable)
        .await
        .remote(KIND, &id)?;
    Ok(from_remote(&target.stream, &current))
}

pub async fn read<S: JetStreamApi + ?Sized>(session: &S, stream: &str, durable: &str) -> Result<Option<ConsumerSpec>> {
    let id = Identity::consumer(stream, durable).encode();

    if !session.consumer_exists(stream, durable).await.remote(KIND, &id)? {
        tracing::info!("Consumer {} on stream {} no longer exists", durable, stream);
        return Ok(None);
    }

    let current = session.load_consumer(stream, durable).await.remote(KIND, &id)?;
    Ok(Some(from_remote(stream, &current)))
}

pub async fn update<S: JetStreamApi + ?Sized>(
    session: &S,
    stream: &str,
    durable: &str,
    target: &ConsumerTarget,
) -> Result<Option<ConsumerSpec>> {
    let id = Identity::consumer(stream, durable).encode();

    if target.stream != stream {
        return Err(Error::ImmutableFieldChanged {
            kind: KIND,
            field: "stream_id",
        });
    }

    if !session.consumer_exists(stream, durable).await.remote(KIND, &id)? {
        tracing::info!("Consumer {} on stream {} no longer exists, not updating", durable, stream);
        return Ok(None);
    }

    let current = session.load_consumer(stream, durable).await.remote(KIND, &id)?;
    check_immutable(KIND, &target.config, &current)?;
    check_stream(session, target).await?;

    session
        .update_consumer(stream, &target.config)
        .await
        .remote(KIND, &id)?;
    tracing::info!("Updated consumer {} on stream {}", durable, stream);

    read(session, stream, durable).await
}

pub async fn delete<S: JetStreamApi + ?Sized>(session: &S, stream: &str, durable: &str) -> Result<()> {
    let id = Identity::consumer(stream, durable).encode();

    if !session.consumer_exists(stream, durable).await.remote(KIND, &id)? {
        tracing::info!("Consumer {} on stream {} already absent", durable, stream);
        return Ok(());
    }

    session.delete_consumer(stream, durable).await.remote(KIND, &id)?;
    tracing::info!("Deleted consumer {} on stream {}", durable, stream);
    Ok(())
}
