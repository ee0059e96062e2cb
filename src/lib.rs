//! Declarative reconciliation of NATS JetStream resources
//!
//! Streams, consumers, stream templates, key-value buckets and key-value
//! entries are declared as typed desired configurations and converged
//! against a JetStream server through create, read, update and delete.

pub mod config;
pub mod desired;
pub mod error;
pub mod identity;
pub mod mapper;
pub mod nats;
pub mod resource;
pub mod validate;

/// Version injected at compile time via JSRECONCILE_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("JSRECONCILE_VERSION") {
    Some(v) => v,
    None => "dev",
};
