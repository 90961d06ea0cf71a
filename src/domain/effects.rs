//! What a single dispatch produces
//!
//! State machines never talk to the client or the baseband directly. They
//! push effects into an [`Outbox`], which the bridge flushes to its ports in
//! order once the invocation returns.

use crate::domain::bearer::value_object::{DataCallDescriptor, NetworkStartRequest};
use crate::domain::call::entity::CallEntry;
use crate::domain::call::value_object::{CallType, DtmfTone};
use crate::domain::shared::value_objects::{CallId, ClientToken};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Success,
    GenericFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Payload {
    None,
    CallList(Vec<CallEntry>),
    FailCause(i32),
    DataCall(DataCallDescriptor),
    DataCallList(Vec<DataCallDescriptor>),
}

/// Resolution of a client token
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub token: ClientToken,
    pub status: Status,
    pub payload: Payload,
}

impl Completion {
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Notification {
    Ring,
    CallStateChanged,
    DataCallListChanged,
}

impl Notification {
    pub fn name(&self) -> &'static str {
        match self {
            Notification::Ring => "call.ring",
            Notification::CallStateChanged => "call.state_changed",
            Notification::DataCallListChanged => "data.call_list_changed",
        }
    }
}

/// A notification as broadcast
///
/// Each broadcast gets its own id so a client can drop duplicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unsolicited {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub notification: Notification,
}

impl Unsolicited {
    pub fn new(notification: Notification, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            at,
            notification,
        }
    }

    pub fn name(&self) -> &'static str {
        self.notification.name()
    }
}

/// Requests sent down to the baseband
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BasebandRequest {
    CallSetup { number: String, call_type: CallType },
    CallRelease { call_type: CallType, call_id: CallId },
    CallAnswer { call_type: CallType, call_id: CallId },
    CallHold { call_id: CallId },
    CallActivate { call_id: CallId },
    DtmfStart { call_id: CallId, tone: DtmfTone },
    DtmfStop { call_id: CallId },
    NetworkStart(NetworkStartRequest),
}

impl BasebandRequest {
    pub fn name(&self) -> &'static str {
        match self {
            BasebandRequest::CallSetup { .. } => "call_setup",
            BasebandRequest::CallRelease { .. } => "call_release",
            BasebandRequest::CallAnswer { .. } => "call_answer",
            BasebandRequest::CallHold { .. } => "call_hold",
            BasebandRequest::CallActivate { .. } => "call_activate",
            BasebandRequest::DtmfStart { .. } => "dtmf_start",
            BasebandRequest::DtmfStop { .. } => "dtmf_stop",
            BasebandRequest::NetworkStart(_) => "network_start",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Complete(Completion),
    Notify(Unsolicited),
    Request(BasebandRequest),
}

/// Effects of one dispatch, plus the time it runs at
#[derive(Debug)]
pub struct Outbox {
    now: DateTime<Utc>,
    effects: Vec<Effect>,
}

impl Outbox {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            effects: Vec::new(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn complete(&mut self, token: ClientToken, status: Status, payload: Payload) {
        self.effects.push(Effect::Complete(Completion {
            token,
            status,
            payload,
        }));
    }

    pub fn succeed(&mut self, token: ClientToken, payload: Payload) {
        self.complete(token, Status::Success, payload);
    }

    pub fn fail(&mut self, token: ClientToken) {
        self.complete(token, Status::GenericFailure, Payload::None);
    }

    pub fn notify(&mut self, notification: Notification) {
        self.effects
            .push(Effect::Notify(Unsolicited::new(notification, self.now)));
    }

    pub fn request(&mut self, request: BasebandRequest) {
        self.effects.push(Effect::Request(request));
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn into_effects(self) -> Vec<Effect> {
        self.effects
    }

    pub fn completions(&self) -> Vec<&Completion> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Complete(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Notify(u) => Some(u.notification),
                _ => None,
            })
            .collect()
    }

    pub fn requests(&self) -> Vec<&BasebandRequest> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Request(r) => Some(r),
                _ => None,
            })
            .collect()
    }
}
