//! Error types
//!
//! Every failure the engine can report. Mapping, resolution and validation
//! errors are produced before any remote call; remote failures are passed
//! through untouched with the resource kind and identity attached.

use crate::resource::ResourceKind;
use crate::validate::Violation;
use async_nats::jetstream::ErrorCode;
use std::fmt;

/// Error reported by the JetStream API
pub use async_nats::jetstream::Error as ApiError;

/// Result alias used across the engine
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error taxonomy
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The identity string does not match the structural pattern of its kind
    #[error("invalid {kind} id {identity:?}")]
    InvalidIdentity {
        kind: ResourceKind,
        identity: String,
    },

    /// A policy attribute carries a name the remote service does not know
    #[error("invalid value {value:?} for {field}, expected one of: {}", .accepted.join(", "))]
    InvalidEnumValue {
        field: &'static str,
        value: String,
        accepted: Vec<&'static str>,
    },

    /// Structural contradiction in the desired configuration
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// More than one consumer start position was requested
    #[error("only one start policy may be set, got: {}", .fields.join(", "))]
    AmbiguousStartPolicy { fields: Vec<&'static str> },

    /// A timestamp attribute is not RFC3339
    #[error("invalid timestamp {value:?} for {field}: {reason}")]
    InvalidTimestamp {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// An attribute that requires replacing the resource was changed in place
    #[error("{field} cannot be changed without replacing the {kind}")]
    ImmutableFieldChanged {
        kind: ResourceKind,
        field: &'static str,
    },

    /// The validator reported one or more error-level violations
    #[error("{}", ViolationList(.0))]
    ValidationFailed(Vec<Violation>),

    /// A resource that must exist is absent
    #[error("{kind} {identity:?} not found")]
    NotFound {
        kind: ResourceKind,
        identity: String,
    },

    /// The remote API rejected or failed a request
    #[error("{kind} {identity:?}: {source}")]
    Remote {
        kind: ResourceKind,
        identity: String,
        #[source]
        source: RemoteError,
    },
}

impl Error {
    /// Build an `InvalidEnumValue` error
    pub fn invalid_enum(field: &'static str, value: &str, accepted: Vec<&'static str>) -> Self {
        Self::InvalidEnumValue {
            field,
            value: value.to_string(),
            accepted,
        }
    }

    /// Build an `InvalidConfiguration` error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// True when the error reports an absent resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

struct ViolationList<'a>(&'a [Violation]);

impl fmt::Display for ViolationList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|v| v.message.as_str()).collect();
        write!(f, "{}", messages.join(", "))
    }
}

/// Failure reported by the remote JetStream API or the transport under it
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Error returned by the JetStream API
    #[error("{0}")]
    Api(ApiError),

    /// The client library reported the addressed resource as absent
    #[error("{0} does not exist")]
    Missing(String),

    /// A create collided with an existing resource
    #[error("{0} already exists")]
    Exists(String),

    /// Could not establish a session
    #[error("connection failed: {0}")]
    Connect(String),

    /// Request did not complete (timeout, no responders, closed connection)
    #[error("{operation} failed: {reason}")]
    Request { operation: String, reason: String },

    /// Local I/O needed to set up the session
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// The JetStream error code, when the failure came from the API
    pub fn err_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Api(api) => Some(api.error_code()),
            _ => None,
        }
    }

    /// True when the addressed resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Missing(_))
            || matches!(
                self.err_code(),
                Some(
                    ErrorCode::STREAM_NOT_FOUND
                        | ErrorCode::CONSUMER_NOT_FOUND
                        | ErrorCode::STREAM_TEMPLATE_NOT_FOUND
                        | ErrorCode::NO_MESSAGE_FOUND
                )
            )
    }

    /// True when a create collided with an existing resource
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::Exists(_))
            || matches!(
                self.err_code(),
                Some(ErrorCode::CONSUMER_ALREADY_EXISTS | ErrorCode::CONSUMER_NAME_EXIST)
            )
    }
}

/// Attach kind and identity to remote failures
pub trait RemoteContext<T> {
    fn remote(self, kind: ResourceKind, identity: &str) -> Result<T>;
}

impl<T> RemoteContext<T> for std::result::Result<T, RemoteError> {
    fn remote(self, kind: ResourceKind, identity: &str) -> Result<T> {
        self.map_err(|source| Error::Remote {
            kind,
            identity: identity.to_string(),
            source,
        })
    }
}
