//! Shared value objects used across the call and bearer contexts

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token the client attaches to a command and gets back with its completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientToken(u64);

impl ClientToken {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Baseband-assigned call identifier
///
/// The client sees these shifted by one (see [`CallId::client_index`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(u32);

impl CallId {
    /// Raw value the baseband uses for "no call"; no live call carries it
    pub const UNASSIGNED: u32 = u32::MAX;

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn is_unassigned(&self) -> bool {
        self.0 == Self::UNASSIGNED
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// 1-based index reported to the client
    ///
    /// Stores refuse `UNASSIGNED`, so this cannot overflow for a live call.
    pub fn client_index(&self) -> u32 {
        self.0 + 1
    }

    /// Inverse of [`CallId::client_index`]; index 0 names no call
    pub fn from_client_index(index: u32) -> Option<Self> {
        index.checked_sub(1).map(Self)
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Locally assigned bearer identifier, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(u32);

impl LocalId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Baseband-assigned packet context identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(u32);

impl ContextId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
