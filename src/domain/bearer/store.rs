//! Bearer context store

use crate::domain::bearer::entity::BearerContext;
use crate::domain::bearer::value_object::BearerType;
use crate::domain::ports::InterfaceProvider;
use crate::domain::shared::arena::{Arena, Handle};
use crate::domain::shared::error::{DomainError, Result};
use crate::domain::shared::value_objects::{ContextId, LocalId};
use tracing::{debug, warn};

pub type BearerHandle = Handle;

/// Fixed-capacity pool of bearers
///
/// A bearer's local id is its slot position plus one, so the lowest free
/// slot is also the lowest unused local id.
#[derive(Debug)]
pub struct BearerStore {
    bearers: Arena<BearerContext>,
    negotiating: Option<BearerHandle>,
    ifname_prefix: String,
}

impl BearerStore {
    pub fn new(capacity: usize, ifname_prefix: &str) -> Self {
        Self {
            bearers: Arena::with_capacity(capacity),
            negotiating: None,
            ifname_prefix: ifname_prefix.to_string(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.bearers.capacity()
    }

    pub fn len(&self) -> usize {
        self.bearers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bearers.is_empty()
    }

    pub fn is_negotiating(&self) -> bool {
        self.negotiating.is_some()
    }

    /// Interface name for a local id: the prefix followed by `local_id - 1`
    pub fn ifname_for(&self, local_id: LocalId) -> String {
        format!("{}{}", self.ifname_prefix, local_id.value().saturating_sub(1))
    }

    /// Reserves the lowest unused local id and opens its interface
    ///
    /// The new bearer is the one being negotiated until its remote id is
    /// bound. If the interface cannot be opened the id is released again.
    pub fn start(
        &mut self,
        interfaces: &mut dyn InterfaceProvider,
        bearer_type: BearerType,
    ) -> Result<(BearerHandle, &mut BearerContext)> {
        if let Some(handle) = self.negotiating {
            return Err(DomainError::Conflict(format!(
                "bearer setup already in progress in {}",
                handle
            )));
        }

        let placeholder = BearerContext::new(LocalId::new(0), bearer_type, String::new());
        let handle = self
            .bearers
            .insert(placeholder)
            .map_err(|_| DomainError::NoFreeId(self.capacity()))?;
        let local_id = LocalId::new(handle.index() as u32 + 1);
        let ifname = self.ifname_for(local_id);

        if let Err(e) = interfaces.open(&ifname) {
            self.bearers.remove(handle);
            warn!("Couldn't create interface {}: {}", ifname, e);
            return Err(DomainError::TransportUnavailable(format!("{}: {}", ifname, e)));
        }
        debug!("Using bearer local id {} on {}", local_id, ifname);

        self.negotiating = Some(handle);
        let bearer = self
            .bearers
            .get_mut(handle)
            .ok_or_else(|| DomainError::NotRegistered(handle.to_string()))?;
        bearer.local_id = local_id;
        bearer.ifname = ifname;
        Ok((handle, bearer))
    }

    /// Closes the bearer's interface and frees its local id
    pub fn stop(&mut self, interfaces: &mut dyn InterfaceProvider, handle: BearerHandle) -> Result<BearerContext> {
        let bearer = self
            .bearers
            .remove(handle)
            .ok_or_else(|| DomainError::NotRegistered(format!("{} holds no bearer", handle)))?;
        if self.negotiating == Some(handle) {
            self.negotiating = None;
        }
        interfaces.close(&bearer.ifname);
        debug!("Destroyed bearer with local id {}", bearer.local_id);
        Ok(bearer)
    }

    pub fn find_by_local_id(&self, local_id: LocalId) -> Result<BearerHandle> {
        self.bearers
            .find(|b| b.local_id == local_id)
            .ok_or_else(|| DomainError::NotFound(format!("bearer local id {}", local_id)))
    }

    /// `None` finds the bearer currently being negotiated
    pub fn find_by_remote_id(&self, remote_id: Option<ContextId>) -> Result<BearerHandle> {
        match remote_id {
            None => self
                .negotiating
                .ok_or_else(|| DomainError::NotFound("no bearer being negotiated".to_string())),
            Some(id) => self
                .bearers
                .find(|b| b.remote_id == Some(id))
                .ok_or_else(|| DomainError::NotFound(format!("bearer context id {}", id))),
        }
    }

    pub fn bind_remote_id(&mut self, handle: BearerHandle, remote_id: ContextId) -> Result<()> {
        if self.negotiating != Some(handle) {
            return Err(DomainError::NotRegistered(format!("{} is not being negotiated", handle)));
        }
        if self.find_by_remote_id(Some(remote_id)).is_ok() {
            return Err(DomainError::Conflict(format!("context id {} already bound", remote_id)));
        }
        let bearer = self
            .bearers
            .get_mut(handle)
            .ok_or_else(|| DomainError::NotRegistered(handle.to_string()))?;
        bearer.remote_id = Some(remote_id);
        self.negotiating = None;
        Ok(())
    }

    pub fn get(&self, handle: BearerHandle) -> Option<&BearerContext> {
        self.bearers.get(handle)
    }

    pub(crate) fn get_mut(&mut self, handle: BearerHandle) -> Option<&mut BearerContext> {
        self.bearers.get_mut(handle)
    }

    pub(crate) fn bound(&self) -> impl Iterator<Item = &BearerContext> {
        self.bearers.iter().map(|(_, b)| b).filter(|b| b.remote_id.is_some())
    }
}
