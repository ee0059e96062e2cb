//! Stream template lifecycle
//!
//! Templates can not be changed in place: every attribute is immutable, so
//! an update either finds nothing to change or is rejected.

use super::registry::{check_immutable, ResourceKind};
use crate::desired::StreamTemplateSpec;
use crate::error::{RemoteContext, Result};
use crate::identity::Identity;
use crate::mapper::template::{from_remote, to_remote};
use crate::nats::types::StreamTemplateConfig;
use crate::nats::JetStreamApi;
use crate::validate::{ensure_valid, validate, RemoteConfig, ServerLimits};

const KIND: ResourceKind = ResourceKind::StreamTemplate;

pub fn prepare(spec: &StreamTemplateSpec) -> Result<StreamTemplateConfig> {
    let config = to_remote(spec)?;
    ensure_valid(
        KIND,
        &spec.name,
        validate(RemoteConfig::StreamTemplate(&config), &ServerLimits::default()),
    )?;
    Ok(config)
}

pub async fn create<S: JetStreamApi + ?Sized>(
    session: &S,
    config: &StreamTemplateConfig,
) -> Result<StreamTemplateSpec> {
    let id = Identity::stream_template(&config.name).encode();

    session.create_template(config).await.remote(KIND, &id)?;
    tracing::info!("Created stream template {}", config.name);

    let current = session.load_template(&config.name).await.remote(KIND, &id)?;
    Ok(from_remote(&current))
}

pub async fn read<S: JetStreamApi + ?Sized>(session: &S, name: &str) -> Result<Option<StreamTemplateSpec>> {
    let id = Identity::stream_template(name).encode();

    if !session.template_exists(name).await.remote(KIND, &id)? {
        tracing::info!("Stream template {} no longer exists", name);
        return Ok(None);
    }

    let current = session.load_template(name).await.remote(KIND, &id)?;
    Ok(Some(from_remote(&current)))
}

pub async fn update<S: JetStreamApi + ?Sized>(
    session: &S,
    name: &str,
    config: &StreamTemplateConfig,
) -> Result<Option<StreamTemplateSpec>> {
    let id = Identity::stream_template(name).encode();

    if !session.template_exists(name).await.remote(KIND, &id)? {
        tracing::info!("Stream template {} no longer exists, not updating", name);
        return Ok(None);
    }

    let current = session.load_template(name).await.remote(KIND, &id)?;
    check_immutable(KIND, config, &current)?;

    tracing::debug!("Stream template {} unchanged", name);
    Ok(Some(from_remote(&current)))
}

pub async fn delete<S: JetStreamApi + ?Sized>(session: &S, name: &str) -> Result<()> {
    let id = Identity::stream_template(name).encode();

    if !session.template_exists(name).await.remote(KIND, &id)? {
        tracing::info!("Stream template {} already absent", name);
        return Ok(());
    }

    session.delete_template(name).await.remote(KIND, &id)?;
    tracing::info!("Deleted stream template {}", name);
    Ok(())
}
