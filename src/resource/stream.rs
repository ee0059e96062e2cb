//! Stream lifecycle

use super::registry::{check_immutable, ResourceKind};
use crate::desired::StreamSpec;
use crate::error::{RemoteContext, Result};
use crate::identity::Identity;
use crate::mapper;
use crate::nats::types::StreamConfig;
use crate::nats::JetStreamApi;
use crate::validate::{check_placement, ensure_valid, validate, validate_mirror_origin, RemoteConfig, ServerLimits};

const KIND: ResourceKind = ResourceKind::Stream;

/// Map and validate a desired stream without touching the network
pub fn prepare(spec: &StreamSpec) -> Result<StreamConfig> {
    let config = mapper::stream::to_remote(spec)?;

    let mut violations = validate(RemoteConfig::Stream(&config), &ServerLimits::default());
    violations.extend(check_placement(
        spec.placement_cluster.as_deref(),
        &spec.placement_tags,
    ));
    ensure_valid(KIND, &spec.name, violations)?;

    Ok(config)
}

/// Rules that need the mirror origin
async fn check_related<S: JetStreamApi + ?Sized>(session: &S, config: &StreamConfig) -> Result<()> {
    let Some(mirror) = config.mirror.as_ref().filter(|_| config.mirror_direct) else {
        return Ok(());
    };
    // an origin in another account can not be inspected from here
    if mirror.external.is_some() {
        return Ok(());
    }

    let origin = session
        .load_stream(&mirror.name)
        .await
        .remote(KIND, &Identity::stream(&mirror.name).encode())?;
    ensure_valid(KIND, &config.name, validate_mirror_origin(config, &origin))
}

pub async fn create<S: JetStreamApi + ?Sized>(session: &S, config: &StreamConfig) -> Result<StreamSpec> {
    let id = Identity::stream(&config.name).encode();

    check_related(session, config).await?;
    session.create_stream(config).await.remote(KIND, &id)?;
    tracing::info!("Created stream {}", config.name);

    let current = session.load_stream(&config.name).await.remote(KIND, &id)?;
    Ok(mapper::stream::from_remote(&current))
}

pub async fn read<S: JetStreamApi + ?Sized>(session: &S, name: &str) -> Result<Option<StreamSpec>> {
    let id = Identity::stream(name).encode();

    if !session.stream_exists(name).await.remote(KIND, &id)? {
        tracing::info!("Stream {} no longer exists", name);
        return Ok(None);
    }

    let current = session.load_stream(name).await.remote(KIND, &id)?;
    Ok(Some(mapper::stream::from_remote(&current)))
}

pub async fn update<S: JetStreamApi + ?Sized>(
    session: &S,
    name: &str,
    config: &StreamConfig,
) -> Result<Option<StreamSpec>> {
    let id = Identity::stream(name).encode();

    if !session.stream_exists(name).await.remote(KIND, &id)? {
        tracing::info!("Stream {} no longer exists, not updating", name);
        return Ok(None);
    }

    let current = session.load_stream(name).await.remote(KIND, &id)?;
    check_immutable(KIND, config, &current)?;
    check_related(session, config).await?;

    session.update_stream(config).await.remote(KIND, &id)?;
    tracing::info!("Updated stream {}", name);

    read(session, name).await
}

pub async fn delete<S: JetStreamApi + ?Sized>(session: &S, name: &str) -> Result<()> {
    let id = Identity::stream(name).encode();

    if !session.stream_exists(name).await.remote(KIND, &id)? {
        tracing::info!("Stream {} already absent", name);
        return Ok(());
    }

    session.delete_stream(name).await.remote(KIND, &id)?;
    tracing::info!("Deleted stream {}", name);
    Ok(())
}
