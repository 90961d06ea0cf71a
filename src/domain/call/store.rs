//! Call context store

use crate::domain::call::entity::CallContext;
use crate::domain::call::value_object::CallState;
use crate::domain::shared::arena::{Arena, Handle};
use crate::domain::shared::error::{DomainError, Result};
use crate::domain::shared::value_objects::CallId;

pub type CallHandle = Handle;

/// Fixed-capacity pool of call contexts
///
/// At most one context may be waiting for its baseband id; the store keeps
/// that context's handle rather than searching for it.
#[derive(Debug)]
pub struct CallStore {
    calls: Arena<CallContext>,
    pending: Option<CallHandle>,
}

impl CallStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            calls: Arena::with_capacity(capacity),
            pending: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.calls.capacity()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Reserves the first free slot
    ///
    /// `None` reserves the single "being set up" context; a second one is a
    /// `Conflict`, as is reusing the id of a live call.
    pub fn allocate(&mut self, call_id: Option<CallId>) -> Result<(CallHandle, &mut CallContext)> {
        match call_id {
            None => {
                if let Some(handle) = self.pending {
                    return Err(DomainError::Conflict(format!(
                        "call setup already in progress in {}",
                        handle
                    )));
                }
            }
            Some(id) => {
                ensure_assignable(id)?;
                if self.find_by_id(Some(id)).is_ok() {
                    return Err(DomainError::Conflict(format!("call id {} already in use", id)));
                }
            }
        }

        let handle = self
            .calls
            .insert(CallContext::new(call_id))
            .map_err(|_| DomainError::PoolExhausted(format!("all {} call slots in use", self.capacity())))?;
        if call_id.is_none() {
            self.pending = Some(handle);
        }

        let context = self
            .calls
            .get_mut(handle)
            .ok_or_else(|| DomainError::NotRegistered(handle.to_string()))?;
        Ok((handle, context))
    }

    /// `None` finds the call currently being set up
    pub fn find_by_id(&self, call_id: Option<CallId>) -> Result<CallHandle> {
        match call_id {
            None => self
                .pending
                .ok_or_else(|| DomainError::NotFound("no call being set up".to_string())),
            Some(id) => self
                .calls
                .find(|c| c.call_id == Some(id))
                .ok_or_else(|| DomainError::NotFound(format!("call id {}", id))),
        }
    }

    /// The active call that is not already being released
    pub fn find_active(&self) -> Result<CallHandle> {
        self.calls
            .find(|c| c.call_id.is_some() && c.state == CallState::Active && !c.is_disconnecting())
            .ok_or_else(|| DomainError::NotFound("no active call".to_string()))
    }

    /// First call with a baseband id whose state satisfies `pred`
    pub fn find_in_state(&self, pred: impl Fn(CallState) -> bool) -> Option<CallHandle> {
        self.calls.find(|c| c.call_id.is_some() && pred(c.state))
    }

    /// Binds the baseband id to the call being set up
    pub fn bind_id(&mut self, handle: CallHandle, call_id: CallId) -> Result<()> {
        if self.pending != Some(handle) {
            return Err(DomainError::NotRegistered(format!("{} is not being set up", handle)));
        }
        ensure_assignable(call_id)?;
        if self.find_by_id(Some(call_id)).is_ok() {
            return Err(DomainError::Conflict(format!("call id {} already in use", call_id)));
        }
        let context = self
            .calls
            .get_mut(handle)
            .ok_or_else(|| DomainError::NotRegistered(handle.to_string()))?;
        context.call_id = Some(call_id);
        self.pending = None;
        Ok(())
    }

    pub fn get(&self, handle: CallHandle) -> Option<&CallContext> {
        self.calls.get(handle)
    }

    pub(crate) fn get_mut(&mut self, handle: CallHandle) -> Option<&mut CallContext> {
        self.calls.get_mut(handle)
    }

    pub fn release(&mut self, handle: CallHandle) -> Result<CallContext> {
        let context = self
            .calls
            .remove(handle)
            .ok_or_else(|| DomainError::NotRegistered(format!("{} holds no call", handle)))?;
        if self.pending == Some(handle) {
            self.pending = None;
        }
        Ok(context)
    }

    /// Calls with a baseband id, in slot order
    pub(crate) fn assigned(&self) -> impl Iterator<Item = (CallHandle, &CallContext)> {
        self.calls.iter().filter(|(_, c)| c.call_id.is_some())
    }

    pub(crate) fn handles(&self) -> Vec<CallHandle> {
        self.calls.handles()
    }
}

fn ensure_assignable(call_id: CallId) -> Result<()> {
    if call_id.is_unassigned() {
        return Err(DomainError::ProtocolError(format!(
            "baseband reported reserved call id {:#x}",
            call_id.value()
        )));
    }
    Ok(())
}
