//! Resource lifecycle layer
//!
//! Create, read, update and delete for every managed kind, executed against
//! a session obtained from a [`Connector`].
//!
//! # Architecture
//!
//! - [`registry`] - Kind definitions and immutable attributes from embedded JSON
//! - [`stream`], [`consumer`], [`template`], [`kv`] - Per-kind lifecycles
//! - [`Reconciler`] - Decodes identities, maps and validates the desired
//!   configuration, then runs one lifecycle step in its own session
//!
//! Mapping and validation always happen before connecting, so a bad
//! configuration never reaches the server. Every session is closed before
//! the call returns, whatever the outcome.
//!
//! # Example
//!
//! ```ignore
//! use jsreconcile::nats::{ConnectionConfig, JetStreamConnector};
//! use jsreconcile::resource::Reconciler;
//!
//! async fn orders(spec: &StreamSpec) -> jsreconcile::error::Result<()> {
//!     let reconciler = Reconciler::new(JetStreamConnector::new(ConnectionConfig::default()));
//!     let created = reconciler.create_stream(spec).await?;
//!     let observed = reconciler.read_stream(&created.identity).await?;
//!     Ok(())
//! }
//! ```

pub mod consumer;
pub mod kv;
mod registry;
pub mod stream;
pub mod template;

pub use registry::*;

use crate::desired::{ConsumerSpec, KvBucketSpec, KvEntrySpec, StreamSpec, StreamTemplateSpec};
use crate::error::{RemoteContext, Result};
use crate::identity::{
    parse_consumer_id, parse_kv_bucket_id, parse_kv_entry_id, parse_stream_id, parse_template_id,
    Identity,
};
use crate::nats::{Connector, JetStreamApi};
use crate::validate::ServerLimits;
use serde::Serialize;

/// Desired or observed state of any managed resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DesiredResource {
    Stream(StreamSpec),
    Consumer(ConsumerSpec),
    StreamTemplate(StreamTemplateSpec),
    KvBucket(KvBucketSpec),
    KvEntry(KvEntrySpec),
}

impl DesiredResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Stream(_) => ResourceKind::Stream,
            Self::Consumer(_) => ResourceKind::Consumer,
            Self::StreamTemplate(_) => ResourceKind::StreamTemplate,
            Self::KvBucket(_) => ResourceKind::KvBucket,
            Self::KvEntry(_) => ResourceKind::KvEntry,
        }
    }
}

/// Outcome of a create: the identity to store and the observed state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciled<T> {
    pub identity: String,
    pub state: T,
}

/// Run one lifecycle step in a fresh session, closing it on every path
macro_rules! in_session {
    ($self:ident, $kind:expr, $identity:expr, |$session:ident| $body:expr) => {{
        let $session = $self.session($kind, $identity).await?;
        let result = $body.await;
        $session.close().await;
        result
    }};
}

/// Lifecycle entry points for every managed kind
pub struct Reconciler<C: Connector> {
    connector: C,
    limits: ServerLimits,
}

impl<C: Connector> Reconciler<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            limits: ServerLimits::default(),
        }
    }

    /// Server-side ceilings checked by consumer validation
    pub fn with_limits(mut self, limits: ServerLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &ServerLimits {
        &self.limits
    }

    async fn session(&self, kind: ResourceKind, identity: &str) -> Result<C::Session> {
        tracing::debug!("Opening session for {} {}", kind, identity);
        self.connector.connect().await.remote(kind, identity)
    }

    // =========================================================================
    // Streams
    // =========================================================================

    pub async fn create_stream(&self, spec: &StreamSpec) -> Result<Reconciled<StreamSpec>> {
        let config = stream::prepare(spec)?;
        let identity = Identity::stream(&config.name).encode();

        let state = in_session!(self, ResourceKind::Stream, &identity, |session| {
            stream::create(&session, &config)
        })?;
        Ok(Reconciled { identity, state })
    }

    pub async fn read_stream(&self, identity: &str) -> Result<Option<StreamSpec>> {
        let name = parse_stream_id(identity)?;
        in_session!(self, ResourceKind::Stream, identity, |session| {
            stream::read(&session, &name)
        })
    }

    pub async fn update_stream(&self, identity: &str, spec: &StreamSpec) -> Result<Option<StreamSpec>> {
        let name = parse_stream_id(identity)?;
        let config = stream::prepare(spec)?;
        in_session!(self, ResourceKind::Stream, identity, |session| {
            stream::update(&session, &name, &config)
        })
    }

    pub async fn delete_stream(&self, identity: &str) -> Result<()> {
        let name = parse_stream_id(identity)?;
        in_session!(self, ResourceKind::Stream, identity, |session| {
            stream::delete(&session, &name)
        })
    }

    // =========================================================================
    // Consumers
    // =========================================================================

    pub async fn create_consumer(&self, spec: &ConsumerSpec) -> Result<Reconciled<ConsumerSpec>> {
        let target = consumer::prepare(spec, &self.limits)?;
        let identity = Identity::consumer(&target.stream, &spec.durable_name).encode();

        let state = in_session!(self, ResourceKind::Consumer, &identity, |session| {
            consumer::create(&session, &target)
        })?;
        Ok(Reconciled { identity, state })
    }

    pub async fn read_consumer(&self, identity: &str) -> Result<Option<ConsumerSpec>> {
        let (stream, durable) = parse_consumer_id(identity)?;
        in_session!(self, ResourceKind::Consumer, identity, |session| {
            consumer::read(&session, &stream, &durable)
        })
    }

    pub async fn update_consumer(
        &self,
        identity: &str,
        spec: &ConsumerSpec,
    ) -> Result<Option<ConsumerSpec>> {
        let (stream, durable) = parse_consumer_id(identity)?;
        let target = consumer::prepare(spec, &self.limits)?;
        in_session!(self, ResourceKind::Consumer, identity, |session| {
            consumer::update(&session, &stream, &durable, &target)
        })
    }

    pub async fn delete_consumer(&self, identity: &str) -> Result<()> {
        let (stream, durable) = parse_consumer_id(identity)?;
        in_session!(self, ResourceKind::Consumer, identity, |session| {
            consumer::delete(&session, &stream, &durable)
        })
    }

    // =========================================================================
    // Stream templates
    // =========================================================================

    pub async fn create_stream_template(
        &self,
        spec: &StreamTemplateSpec,
    ) -> Result<Reconciled<StreamTemplateSpec>> {
        let config = template::prepare(spec)?;
        let identity = Identity::stream_template(&config.name).encode();

        let state = in_session!(self, ResourceKind::StreamTemplate, &identity, |session| {
            template::create(&session, &config)
        })?;
        Ok(Reconciled { identity, state })
    }

    pub async fn read_stream_template(&self, identity: &str) -> Result<Option<StreamTemplateSpec>> {
        let name = parse_template_id(identity)?;
        in_session!(self, ResourceKind::StreamTemplate, identity, |session| {
            template::read(&session, &name)
        })
    }

    pub async fn update_stream_template(
        &self,
        identity: &str,
        spec: &StreamTemplateSpec,
    ) -> Result<Option<StreamTemplateSpec>> {
        let name = parse_template_id(identity)?;
        let config = template::prepare(spec)?;
        in_session!(self, ResourceKind::StreamTemplate, identity, |session| {
            template::update(&session, &name, &config)
        })
    }

    pub async fn delete_stream_template(&self, identity: &str) -> Result<()> {
        let name = parse_template_id(identity)?;
        in_session!(self, ResourceKind::StreamTemplate, identity, |session| {
            template::delete(&session, &name)
        })
    }

    // =========================================================================
    // Key-value buckets
    // =========================================================================

    pub async fn create_kv_bucket(&self, spec: &KvBucketSpec) -> Result<Reconciled<KvBucketSpec>> {
        let config = kv::prepare_bucket(spec)?;
        let identity = Identity::kv_bucket(&config.bucket).encode();

        let state = in_session!(self, ResourceKind::KvBucket, &identity, |session| {
            kv::create_bucket(&session, &config)
        })?;
        Ok(Reconciled { identity, state })
    }

    pub async fn read_kv_bucket(&self, identity: &str) -> Result<Option<KvBucketSpec>> {
        let bucket = parse_kv_bucket_id(identity)?;
        in_session!(self, ResourceKind::KvBucket, identity, |session| {
            kv::read_bucket(&session, &bucket)
        })
    }

    pub async fn update_kv_bucket(
        &self,
        identity: &str,
        spec: &KvBucketSpec,
    ) -> Result<Option<KvBucketSpec>> {
        let bucket = parse_kv_bucket_id(identity)?;
        let config = kv::prepare_bucket(spec)?;
        in_session!(self, ResourceKind::KvBucket, identity, |session| {
            kv::update_bucket(&session, &bucket, &config)
        })
    }

    pub async fn delete_kv_bucket(&self, identity: &str) -> Result<()> {
        let bucket = parse_kv_bucket_id(identity)?;
        in_session!(self, ResourceKind::KvBucket, identity, |session| {
            kv::delete_bucket(&session, &bucket)
        })
    }

    // =========================================================================
    // Key-value entries
    // =========================================================================

    pub async fn create_kv_entry(&self, spec: &KvEntrySpec) -> Result<Reconciled<KvEntrySpec>> {
        let entry = kv::prepare_entry(spec)?;
        let identity = Identity::kv_entry(&entry.bucket, &entry.key).encode();

        let state = in_session!(self, ResourceKind::KvEntry, &identity, |session| {
            kv::create_entry(&session, &entry)
        })?;
        Ok(Reconciled { identity, state })
    }

    pub async fn read_kv_entry(&self, identity: &str) -> Result<Option<KvEntrySpec>> {
        let (bucket, key) = parse_kv_entry_id(identity)?;
        in_session!(self, ResourceKind::KvEntry, identity, |session| {
            kv::read_entry(&session, &bucket, &key)
        })
    }

    pub async fn update_kv_entry(
        &self,
        identity: &str,
        spec: &KvEntrySpec,
    ) -> Result<Option<KvEntrySpec>> {
        let (bucket, key) = parse_kv_entry_id(identity)?;
        let entry = kv::prepare_entry(spec)?;
        in_session!(self, ResourceKind::KvEntry, identity, |session| {
            kv::update_entry(&session, &bucket, &key, &entry)
        })
    }

    pub async fn delete_kv_entry(&self, identity: &str) -> Result<()> {
        let (bucket, key) = parse_kv_entry_id(identity)?;
        in_session!(self, ResourceKind::KvEntry, identity, |session| {
            kv::delete_entry(&session, &bucket, &key)
        })
    }

    // =========================================================================
    // Kind dispatch
    // =========================================================================

    pub async fn create(&self, desired: &DesiredResource) -> Result<Reconciled<DesiredResource>> {
        match desired {
            DesiredResource::Stream(spec) => {
                let r = self.create_stream(spec).await?;
                Ok(Reconciled {
                    identity: r.identity,
                    state: DesiredResource::Stream(r.state),
                })
            },
            DesiredResource::Consumer(spec) => {
                let r = self.create_consumer(spec).await?;
                Ok(Reconciled {
                    identity: r.identity,
                    state: DesiredResource::Consumer(r.state),
                })
            },
            DesiredResource::StreamTemplate(spec) => {
                let r = self.create_stream_template(spec).await?;
                Ok(Reconciled {
                    identity: r.identity,
                    state: DesiredResource::StreamTemplate(r.state),
                })
            },
            DesiredResource::KvBucket(spec) => {
                let r = self.create_kv_bucket(spec).await?;
                Ok(Reconciled {
                    identity: r.identity,
                    state: DesiredResource::KvBucket(r.state),
                })
            },
            DesiredResource::KvEntry(spec) => {
                let r = self.create_kv_entry(spec).await?;
                Ok(Reconciled {
                    identity: r.identity,
                    state: DesiredResource::KvEntry(r.state),
                })
            },
        }
    }

    pub async fn read(&self, kind: ResourceKind, identity: &str) -> Result<Option<DesiredResource>> {
        Ok(match kind {
            ResourceKind::Stream => self.read_stream(identity).await?.map(DesiredResource::Stream),
            ResourceKind::Consumer => self
                .read_consumer(identity)
                .await?
                .map(DesiredResource::Consumer),
            ResourceKind::StreamTemplate => self
                .read_stream_template(identity)
                .await?
                .map(DesiredResource::StreamTemplate),
            ResourceKind::KvBucket => self
                .read_kv_bucket(identity)
                .await?
                .map(DesiredResource::KvBucket),
            ResourceKind::KvEntry => self
                .read_kv_entry(identity)
                .await?
                .map(DesiredResource::KvEntry),
        })
    }

    /// Update the resource behind `identity`; the desired kind decides how
    /// the identity is decoded
    pub async fn update(
        &self,
        identity: &str,
        desired: &DesiredResource,
    ) -> Result<Option<DesiredResource>> {
        Ok(match desired {
            DesiredResource::Stream(spec) => self
                .update_stream(identity, spec)
                .await?
                .map(DesiredResource::Stream),
            DesiredResource::Consumer(spec) => self
                .update_consumer(identity, spec)
                .await?
                .map(DesiredResource::Consumer),
            DesiredResource::StreamTemplate(spec) => self
                .update_stream_template(identity, spec)
                .await?
                .map(DesiredResource::StreamTemplate),
            DesiredResource::KvBucket(spec) => self
                .update_kv_bucket(identity, spec)
                .await?
                .map(DesiredResource::KvBucket),
            DesiredResource::KvEntry(spec) => self
                .update_kv_entry(identity, spec)
                .await?
                .map(DesiredResource::KvEntry),
        })
    }

    pub async fn delete(&self, kind: ResourceKind, identity: &str) -> Result<()> {
        match kind {
            ResourceKind::Stream => self.delete_stream(identity).await,
            ResourceKind::Consumer => self.delete_consumer(identity).await,
            ResourceKind::StreamTemplate => self.delete_stream_template(identity).await,
            ResourceKind::KvBucket => self.delete_kv_bucket(identity).await,
            ResourceKind::KvEntry => self.delete_kv_entry(identity).await,
        }
    }
}
