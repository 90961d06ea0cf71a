//! Inbound records: client commands and baseband events
//!
//! Both arrive already decoded. The JSON shapes here are what the binary
//! reads from its input, one record per line.

use crate::domain::bearer::{DataCallRequest, NetworkParams};
use crate::domain::call::CallType;
use crate::domain::shared::value_objects::{CallId, ClientToken, ContextId, LocalId};
use serde::Deserialize;
use std::net::Ipv4Addr;

/// A client command and the token its completion must carry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientRequest {
    pub token: ClientToken,
    #[serde(flatten)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Dial { number: String },
    Answer,
    /// `index` is the 1-based index from the call list
    Hangup { index: u32 },
    HangupWaitingOrBackground,
    HangupForegroundResumeBackground,
    SwitchHoldingAndActive,
    /// One-shot tone, acknowledged without reaching the baseband
    Dtmf { tone: char },
    DtmfStart { tone: char },
    DtmfStop,
    CurrentCalls,
    LastCallFailCause,
    SetupDataCall(DataCallRequest),
    DeactivateDataCall { cid: LocalId },
    LastDataCallFailCause,
    DataCallList,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Dial { .. } => "dial",
            Command::Answer => "answer",
            Command::Hangup { .. } => "hangup",
            Command::HangupWaitingOrBackground => "hangup_waiting_or_background",
            Command::HangupForegroundResumeBackground => "hangup_foreground_resume_background",
            Command::SwitchHoldingAndActive => "switch_holding_and_active",
            Command::Dtmf { .. } => "dtmf",
            Command::DtmfStart { .. } => "dtmf_start",
            Command::DtmfStop => "dtmf_stop",
            Command::CurrentCalls => "current_calls",
            Command::LastCallFailCause => "last_call_fail_cause",
            Command::SetupDataCall(_) => "setup_data_call",
            Command::DeactivateDataCall { .. } => "deactivate_data_call",
            Command::LastDataCallFailCause => "last_data_call_fail_cause",
            Command::DataCallList => "data_call_list",
        }
    }
}

/// Decoded baseband event
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BasebandEvent {
    IncomingCall {
        call_id: CallId,
        #[serde(default)]
        number: String,
        #[serde(default)]
        call_type: CallType,
    },
    CallSetupAssigned {
        call_id: CallId,
    },
    CallSetupRejected {
        #[serde(default)]
        cause: u32,
    },
    RemoteConnected {
        call_id: CallId,
    },
    CallEnded {
        call_id: CallId,
        #[serde(default)]
        cause: u32,
    },
    DtmfStartConfirmed {
        reason: u32,
    },
    DtmfStopConfirmed {
        reason: u32,
    },
    NetworkStartConfirmed {
        context_id: ContextId,
        #[serde(default)]
        error: u32,
        local_addr: Ipv4Addr,
        dns1: Ipv4Addr,
        dns2: Ipv4Addr,
    },
    NetworkStopped {
        context_id: ContextId,
    },
    DataReceived {
        context_id: ContextId,
        len: usize,
    },
}

impl BasebandEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BasebandEvent::IncomingCall { .. } => "incoming_call",
            BasebandEvent::CallSetupAssigned { .. } => "call_setup_assigned",
            BasebandEvent::CallSetupRejected { .. } => "call_setup_rejected",
            BasebandEvent::RemoteConnected { .. } => "remote_connected",
            BasebandEvent::CallEnded { .. } => "call_ended",
            BasebandEvent::DtmfStartConfirmed { .. } => "dtmf_start_confirmed",
            BasebandEvent::DtmfStopConfirmed { .. } => "dtmf_stop_confirmed",
            BasebandEvent::NetworkStartConfirmed { .. } => "network_start_confirmed",
            BasebandEvent::NetworkStopped { .. } => "network_stopped",
            BasebandEvent::DataReceived { .. } => "data_received",
        }
    }
}

/// Raw addresses as the bearer machine expects them
pub(crate) fn network_params(local_addr: Ipv4Addr, dns1: Ipv4Addr, dns2: Ipv4Addr) -> NetworkParams {
    NetworkParams {
        local_addr: u32::from(local_addr),
        dns1: u32::from(dns1),
        dns2: u32::from(dns2),
    }
}

/// Everything the dispatch loop can be handed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inbound {
    Request(ClientRequest),
    Event(BasebandEvent),
    /// A request whose command could not be decoded but whose token could
    #[serde(skip)]
    Malformed(ClientToken),
    /// Periodic expiry of parked tokens
    #[serde(skip)]
    Tick,
}
