//! Policy name tables
//!
//! Maps the policy names a caller declares to the closed wire enums and
//! back. `name()` is an exhaustive match, so a new remote value has to be
//! given a name here before anything compiles.

use crate::error::{Error, Result};
use crate::nats::types::{
    AckPolicy, Compression, DiscardPolicy, ReplayPolicy, RetentionPolicy, StorageType,
};

/// A closed set of remote policy values with declared names
pub trait Policy: Clone + PartialEq + 'static {
    /// Attribute the policy is declared in
    const FIELD: &'static str;
    /// Every accepted value
    const ALL: &'static [Self];

    /// Declared name of this value
    fn name(&self) -> &'static str;

    /// Resolve a declared name
    fn resolve(value: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .cloned()
            .find(|p| p.name() == value)
            .ok_or_else(|| Error::invalid_enum(Self::FIELD, value, Self::accepted()))
    }

    /// Accepted names, in declaration order
    fn accepted() -> Vec<&'static str> {
        Self::ALL.iter().map(|p| p.name()).collect()
    }
}

impl Policy for StorageType {
    const FIELD: &'static str = "storage";
    const ALL: &'static [Self] = &[Self::File, Self::Memory];

    fn name(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

impl Policy for RetentionPolicy {
    const FIELD: &'static str = "retention";
    const ALL: &'static [Self] = &[Self::Limits, Self::Interest, Self::WorkQueue];

    fn name(&self) -> &'static str {
        match self {
            Self::Limits => "limits",
            Self::Interest => "interest",
            Self::WorkQueue => "workqueue",
        }
    }
}

impl Policy for DiscardPolicy {
    const FIELD: &'static str = "discard";
    const ALL: &'static [Self] = &[Self::Old, Self::New];

    fn name(&self) -> &'static str {
        match self {
            Self::Old => "old",
            Self::New => "new",
        }
    }
}

impl Policy for Compression {
    const FIELD: &'static str = "compression";
    const ALL: &'static [Self] = &[Self::None, Self::S2];

    fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::S2 => "s2",
        }
    }
}

impl Policy for ReplayPolicy {
    const FIELD: &'static str = "replay_policy";
    const ALL: &'static [Self] = &[Self::Instant, Self::Original];

    fn name(&self) -> &'static str {
        match self {
            Self::Instant => "instant",
            Self::Original => "original",
        }
    }
}

impl Policy for AckPolicy {
    const FIELD: &'static str = "ack_policy";
    const ALL: &'static [Self] = &[Self::Explicit, Self::All, Self::None];

    fn name(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::All => "all",
            Self::None => "none",
        }
    }
}
