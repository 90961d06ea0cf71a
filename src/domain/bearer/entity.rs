//! Bearer entities

use crate::domain::bearer::value_object::{BearerType, DataCallDescriptor};
use crate::domain::correlation::PendingToken;
use crate::domain::shared::value_objects::{ContextId, LocalId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BearerState {
    /// Local id and interface reserved, waiting for the baseband
    Requested,
    /// Baseband context id bound and network parameters received
    Bound,
}

/// One packet data session
#[derive(Debug, Clone, PartialEq)]
pub struct BearerContext {
    pub(super) local_id: LocalId,
    pub(super) remote_id: Option<ContextId>,
    pub(super) bearer_type: BearerType,
    pub(super) ifname: String,
    pub(super) pending_token: Option<PendingToken>,
    pub(super) descriptor: Option<DataCallDescriptor>,
}

impl BearerContext {
    pub(super) fn new(local_id: LocalId, bearer_type: BearerType, ifname: String) -> Self {
        Self {
            local_id,
            remote_id: None,
            bearer_type,
            ifname,
            pending_token: None,
            descriptor: None,
        }
    }

    pub fn local_id(&self) -> LocalId {
        self.local_id
    }

    pub fn remote_id(&self) -> Option<ContextId> {
        self.remote_id
    }

    pub fn bearer_type(&self) -> BearerType {
        self.bearer_type
    }

    pub fn ifname(&self) -> &str {
        &self.ifname
    }

    pub fn pending_token(&self) -> Option<&PendingToken> {
        self.pending_token.as_ref()
    }

    pub fn descriptor(&self) -> Option<&DataCallDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn state(&self) -> BearerState {
        match self.remote_id {
            None => BearerState::Requested,
            Some(_) => BearerState::Bound,
        }
    }
}
