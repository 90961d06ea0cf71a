//! Call entities

use crate::domain::call::value_object::{CallState, CallType, Presentation, TypeOfAddress};
use crate::domain::correlation::PendingToken;
use crate::domain::shared::value_objects::CallId;
use serde::Serialize;

/// One voice call tracked by the bridge
///
/// `call_id` is `None` between a local dial request and the baseband
/// assigning an id. A parked `pending_token` means a release has been sent
/// and the call is waiting for the baseband to report it ended.
#[derive(Debug, Clone, PartialEq)]
pub struct CallContext {
    pub(super) call_id: Option<CallId>,
    pub(super) number: String,
    pub(super) call_type: CallType,
    pub(super) state: CallState,
    pub(super) mobile_terminated: bool,
    pub(super) pending_token: Option<PendingToken>,
}

impl CallContext {
    pub(super) fn new(call_id: Option<CallId>) -> Self {
        Self {
            call_id,
            number: String::new(),
            call_type: CallType::Voice,
            state: CallState::Dialing,
            mobile_terminated: false,
            pending_token: None,
        }
    }

    pub fn call_id(&self) -> Option<CallId> {
        self.call_id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn call_type(&self) -> CallType {
        self.call_type
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn is_mobile_terminated(&self) -> bool {
        self.mobile_terminated
    }

    pub fn pending_token(&self) -> Option<&PendingToken> {
        self.pending_token.as_ref()
    }

    pub fn is_disconnecting(&self) -> bool {
        self.pending_token.is_some()
    }

    /// Listing entry, or `None` while the baseband has not assigned an id
    pub fn to_entry(&self) -> Option<CallEntry> {
        let call_id = self.call_id?;
        Some(CallEntry {
            state: self.state,
            state_code: self.state.client_code(),
            index: call_id.client_index(),
            toa: TypeOfAddress::classify(&self.number).code(),
            is_multiparty: false,
            is_mobile_terminated: self.mobile_terminated,
            als: 0,
            is_voice: self.call_type.is_voice(),
            is_voice_privacy: false,
            number: self.number.clone(),
            number_presentation: Presentation::for_number(&self.number).code(),
            name: None,
            name_presentation: Presentation::Unavailable.code(),
        })
    }
}

/// One row of the current-calls listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallEntry {
    pub state: CallState,
    pub state_code: u8,
    pub index: u32,
    pub toa: u8,
    pub is_multiparty: bool,
    pub is_mobile_terminated: bool,
    pub als: u8,
    pub is_voice: bool,
    pub is_voice_privacy: bool,
    pub number: String,
    pub number_presentation: u8,
    pub name: Option<String>,
    pub name_presentation: u8,
}
