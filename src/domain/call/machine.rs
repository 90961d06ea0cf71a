//! Call state machine
//!
//! Client commands and baseband events both land here. Commands validate
//! everything they need before touching the store, so an `Err` always means
//! nothing changed and the bridge only has to fail the command's token.

use crate::domain::call::entity::{CallContext, CallEntry};
use crate::domain::call::store::{CallHandle, CallStore};
use crate::domain::call::value_object::{
    bounded_number, validate_number, CallState, CallType, DtmfTone, CALL_FAIL_NORMAL,
};
use crate::domain::correlation::{PendingSlot, PendingToken, TokenRegistry};
use crate::domain::effects::{BasebandRequest, Notification, Outbox, Payload};
use crate::domain::shared::error::{DomainError, Result};
use crate::domain::shared::value_objects::{CallId, ClientToken};
use chrono::Duration;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct CallControl {
    calls: CallStore,
    tokens: TokenRegistry,
    /// Tone currently playing and the call it plays on
    dtmf_tone: Option<(CallId, DtmfTone)>,
}

impl CallControl {
    pub fn new(max_calls: usize) -> Self {
        Self {
            calls: CallStore::new(max_calls),
            tokens: TokenRegistry::new(),
            dtmf_tone: None,
        }
    }

    pub fn calls(&self) -> &CallStore {
        &self.calls
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn dtmf_tone(&self) -> Option<DtmfTone> {
        self.dtmf_tone.map(|(_, tone)| tone)
    }

    fn context_mut(&mut self, handle: CallHandle) -> Result<&mut CallContext> {
        self.calls
            .get_mut(handle)
            .ok_or_else(|| DomainError::NotRegistered(handle.to_string()))
    }

    fn assigned_id(&self, handle: CallHandle) -> Result<CallId> {
        self.calls
            .get(handle)
            .and_then(|c| c.call_id())
            .ok_or_else(|| DomainError::NotRegistered(handle.to_string()))
    }

    // ---- client commands ----

    pub fn dial(&mut self, out: &mut Outbox, token: ClientToken, number: &str) -> Result<()> {
        validate_number(number)?;
        self.tokens.ensure_free(PendingSlot::Dial)?;

        let (handle, call) = self.calls.allocate(None)?;
        call.number = number.to_string();
        call.call_type = CallType::Voice;
        call.state = CallState::Dialing;
        call.mobile_terminated = false;

        out.request(BasebandRequest::CallSetup {
            number: number.to_string(),
            call_type: CallType::Voice,
        });
        self.tokens.park(PendingSlot::Dial, token, out.now())?;
        info!("Dialing {} in {}", number, handle);
        Ok(())
    }

    pub fn answer(&mut self, out: &mut Outbox, token: ClientToken) -> Result<()> {
        let handle = self
            .calls
            .find_in_state(|s| s == CallState::Incoming)
            .ok_or_else(|| DomainError::NotFound("no incoming call to answer".to_string()))?;
        let call = self.context_mut(handle)?;
        let call_id = call
            .call_id
            .ok_or_else(|| DomainError::NotRegistered(handle.to_string()))?;

        out.request(BasebandRequest::CallAnswer {
            call_type: call.call_type,
            call_id,
        });
        // the baseband sends no answer confirmation
        call.state = CallState::Active;
        out.succeed(token, Payload::None);
        out.notify(Notification::CallStateChanged);
        info!("Answered call {}", call_id);
        Ok(())
    }

    /// `index` is the 1-based client index
    pub fn hangup(&mut self, out: &mut Outbox, token: ClientToken, index: u32) -> Result<()> {
        let call_id = CallId::from_client_index(index)
            .ok_or_else(|| DomainError::MalformedInput(format!("call index {}", index)))?;
        let handle = self.calls.find_by_id(Some(call_id))?;
        self.release_call(out, handle, token)
    }

    pub fn hangup_waiting_or_background(&mut self, out: &mut Outbox, token: ClientToken) -> Result<()> {
        let handle = self
            .calls
            .assigned()
            .find(|(_, c)| c.state.is_background() && !c.is_disconnecting())
            .map(|(h, _)| h)
            .ok_or_else(|| DomainError::NotFound("no waiting or held call".to_string()))?;
        self.release_call(out, handle, token)
    }

    /// Releases the active call and resumes held ones
    ///
    /// Held calls are marked active as soon as the activate request is
    /// sent. The token completes when the released call ends, or right
    /// away when nothing had to be released.
    pub fn hangup_foreground_resume_background(
        &mut self,
        out: &mut Outbox,
        token: ClientToken,
    ) -> Result<()> {
        let plan: Vec<(CallHandle, CallId, CallState)> = self
            .calls
            .assigned()
            .filter(|(_, c)| !c.is_disconnecting())
            .filter(|(_, c)| matches!(c.state, CallState::Active | CallState::Holding))
            .filter_map(|(h, c)| c.call_id.map(|id| (h, id, c.state)))
            .collect();
        if plan.is_empty() {
            return Err(DomainError::NotFound("no foreground or background call".to_string()));
        }

        let now = out.now();
        let mut parked = false;
        for (handle, call_id, state) in plan {
            let call = self.context_mut(handle)?;
            match state {
                CallState::Active => {
                    if !parked {
                        call.pending_token = Some(PendingToken::new(token, now));
                        parked = true;
                    }
                    out.request(BasebandRequest::CallRelease {
                        call_type: call.call_type,
                        call_id,
                    });
                    debug!("Hanging up foreground call {}", call_id);
                }
                _ => {
                    out.request(BasebandRequest::CallActivate { call_id });
                    call.state = CallState::Active;
                    debug!("Resuming background call {}", call_id);
                }
            }
        }

        if !parked {
            out.succeed(token, Payload::None);
            out.notify(Notification::CallStateChanged);
        }
        Ok(())
    }

    /// Swaps held and active calls; completes without waiting for the baseband
    pub fn switch_holding_and_active(&mut self, out: &mut Outbox, token: ClientToken) -> Result<()> {
        let plan: Vec<(CallHandle, CallId, CallState)> = self
            .calls
            .assigned()
            .filter(|(_, c)| !c.is_disconnecting())
            .filter(|(_, c)| matches!(c.state, CallState::Active | CallState::Holding))
            .filter_map(|(h, c)| c.call_id.map(|id| (h, id, c.state)))
            .collect();

        for (handle, call_id, state) in plan {
            let call = self.context_mut(handle)?;
            if state == CallState::Active {
                out.request(BasebandRequest::CallHold { call_id });
                call.state = CallState::Holding;
                debug!("Holding call {}", call_id);
            } else {
                out.request(BasebandRequest::CallActivate { call_id });
                call.state = CallState::Active;
                debug!("Activating call {}", call_id);
            }
        }

        out.succeed(token, Payload::None);
        out.notify(Notification::CallStateChanged);
        Ok(())
    }

    /// One-shot tone
    ///
    /// The baseband has no single-tone request, so after validation this
    /// completes at once and sends nothing.
    pub fn dtmf(&mut self, out: &mut Outbox, token: ClientToken, tone: char) -> Result<()> {
        let tone = DtmfTone::parse(tone)?;
        let handle = self.calls.find_active()?;
        let call_id = self.assigned_id(handle)?;
        debug!("One-shot DTMF {} on call {} not forwarded", tone, call_id);
        out.succeed(token, Payload::None);
        Ok(())
    }

    pub fn dtmf_start(&mut self, out: &mut Outbox, token: ClientToken, tone: char) -> Result<()> {
        let tone = DtmfTone::parse(tone)?;
        let handle = self.calls.find_active()?;
        let call_id = self.assigned_id(handle)?;
        if let Some((_, playing)) = self.dtmf_tone {
            return Err(DomainError::Conflict(format!("tone {} is still playing", playing)));
        }
        self.tokens.ensure_free(PendingSlot::DtmfStart)?;

        self.dtmf_tone = Some((call_id, tone));
        out.request(BasebandRequest::DtmfStart { call_id, tone });
        self.tokens.park(PendingSlot::DtmfStart, token, out.now())?;
        debug!("Starting DTMF {} on call {}", tone, call_id);
        Ok(())
    }

    pub fn dtmf_stop(&mut self, out: &mut Outbox, token: ClientToken) -> Result<()> {
        let handle = self.calls.find_active()?;
        let call_id = self.assigned_id(handle)?;
        self.tokens.ensure_free(PendingSlot::DtmfStop)?;

        self.dtmf_tone = None;
        out.request(BasebandRequest::DtmfStop { call_id });
        self.tokens.park(PendingSlot::DtmfStop, token, out.now())?;
        debug!("Stopping DTMF on call {}", call_id);
        Ok(())
    }

    /// Completes immediately; an empty pool completes without a list
    pub fn current_calls(&mut self, out: &mut Outbox, token: ClientToken) -> Result<()> {
        if self.calls.assigned().next().is_none() {
            out.succeed(token, Payload::None);
            return Ok(());
        }
        let entries: Vec<CallEntry> = self.calls.assigned().filter_map(|(_, c)| c.to_entry()).collect();
        out.succeed(token, Payload::CallList(entries));
        Ok(())
    }

    /// The baseband reports no real cause, so this is always normal clearing
    pub fn last_call_fail_cause(&mut self, out: &mut Outbox, token: ClientToken) -> Result<()> {
        out.succeed(token, Payload::FailCause(CALL_FAIL_NORMAL));
        Ok(())
    }

    fn release_call(&mut self, out: &mut Outbox, handle: CallHandle, token: ClientToken) -> Result<()> {
        let now = out.now();
        let call = self.context_mut(handle)?;
        let call_id = call
            .call_id
            .ok_or_else(|| DomainError::NotRegistered(handle.to_string()))?;
        if let Some(pending) = call.pending_token {
            return Err(DomainError::Conflict(format!(
                "call {} already being released for token {}",
                call_id,
                pending.token()
            )));
        }

        call.pending_token = Some(PendingToken::new(token, now));
        out.request(BasebandRequest::CallRelease {
            call_type: call.call_type,
            call_id,
        });
        info!("Releasing call {}", call_id);
        Ok(())
    }

    // ---- baseband events ----

    pub fn on_incoming_call(
        &mut self,
        out: &mut Outbox,
        call_id: CallId,
        number: &str,
        call_type: CallType,
    ) -> Result<()> {
        let stored = bounded_number(number);
        if stored.len() < number.len() {
            warn!(
                "Caller number of call {} is {} bytes, keeping the first {}",
                call_id,
                number.len(),
                stored.len()
            );
        }
        let (handle, call) = self.calls.allocate(Some(call_id))?;
        call.number = stored.to_string();
        call.call_type = call_type;
        call.state = CallState::Incoming;
        call.mobile_terminated = true;

        out.notify(Notification::Ring);
        out.notify(Notification::CallStateChanged);
        info!("Incoming call {} from {:?} in {}", call_id, number, handle);
        Ok(())
    }

    /// The baseband accepted the dial and assigned an id
    pub fn on_call_setup_assigned(&mut self, out: &mut Outbox, call_id: CallId) -> Result<()> {
        let handle = match self.calls.find_by_id(None) {
            Ok(handle) => handle,
            Err(e) => {
                self.fail_dial(out);
                return Err(e);
            }
        };

        if let Err(e) = self.calls.bind_id(handle, call_id) {
            self.calls.release(handle)?;
            self.fail_dial(out);
            out.notify(Notification::CallStateChanged);
            return Err(DomainError::ProtocolError(format!("call setup assigned bad id: {}", e)));
        }

        out.notify(Notification::CallStateChanged);
        match self.tokens.take(PendingSlot::Dial) {
            Some(pending) => out.succeed(pending.token(), Payload::None),
            None => warn!("Call {} set up with no dial token parked", call_id),
        }
        info!("Call setup confirmed, id {}", call_id);
        Ok(())
    }

    pub fn on_call_setup_rejected(&mut self, out: &mut Outbox, cause: u32) -> Result<()> {
        let handle = self.calls.find_by_id(None);
        self.fail_dial(out);
        let handle = handle?;
        self.calls.release(handle)?;
        out.notify(Notification::CallStateChanged);
        warn!("Call setup rejected by baseband (cause {})", cause);
        Ok(())
    }

    pub fn on_remote_connected(&mut self, out: &mut Outbox, call_id: CallId) -> Result<()> {
        let handle = self.calls.find_by_id(Some(call_id))?;
        self.context_mut(handle)?.state = CallState::Active;
        out.notify(Notification::CallStateChanged);
        info!("Call {} connected", call_id);
        Ok(())
    }

    pub fn on_call_ended(&mut self, out: &mut Outbox, call_id: CallId, cause: u32) -> Result<()> {
        let handle = self.calls.find_by_id(Some(call_id))?;
        let call = self.calls.release(handle)?;
        if let Some(pending) = call.pending_token {
            out.succeed(pending.token(), Payload::None);
        }
        if self.dtmf_tone.is_some_and(|(id, _)| id == call_id) {
            self.dtmf_tone = None;
        }
        out.notify(Notification::CallStateChanged);
        info!("Call {} ended (cause {})", call_id, cause);
        Ok(())
    }

    pub fn on_dtmf_start_confirmed(&mut self, out: &mut Outbox, reason: u32) -> Result<()> {
        let pending = self
            .tokens
            .take(PendingSlot::DtmfStart)
            .ok_or_else(|| DomainError::NotFound("no DTMF start pending".to_string()))?;
        if reason == 0 {
            out.succeed(pending.token(), Payload::None);
        } else {
            warn!("DTMF start refused by baseband (code {:#x})", reason);
            self.dtmf_tone = None;
            out.fail(pending.token());
        }
        Ok(())
    }

    pub fn on_dtmf_stop_confirmed(&mut self, out: &mut Outbox, reason: u32) -> Result<()> {
        let pending = self
            .tokens
            .take(PendingSlot::DtmfStop)
            .ok_or_else(|| DomainError::NotFound("no DTMF stop pending".to_string()))?;
        if reason == 0 {
            out.succeed(pending.token(), Payload::None);
        } else {
            warn!("DTMF stop refused by baseband (code {:#x})", reason);
            out.fail(pending.token());
        }
        Ok(())
    }

    fn fail_dial(&mut self, out: &mut Outbox) {
        if let Some(pending) = self.tokens.take(PendingSlot::Dial) {
            out.fail(pending.token());
        }
    }

    /// Fails every token parked for at least `timeout` and undoes its reservation
    pub fn expire(&mut self, out: &mut Outbox, timeout: Duration) -> usize {
        let now = out.now();
        let mut expired = 0;

        for (slot, pending) in self.tokens.take_expired(now, timeout) {
            warn!("{} token {} timed out", slot, pending.token());
            match slot {
                PendingSlot::Dial => {
                    if let Ok(handle) = self.calls.find_by_id(None) {
                        if self.calls.release(handle).is_ok() {
                            out.notify(Notification::CallStateChanged);
                        }
                    }
                }
                PendingSlot::DtmfStart => self.dtmf_tone = None,
                PendingSlot::DtmfStop => {}
            }
            out.fail(pending.token());
            expired += 1;
        }

        for handle in self.calls.handles() {
            let Some(call) = self.calls.get_mut(handle) else {
                continue;
            };
            if call.pending_token.is_some_and(|p| p.is_expired(now, timeout)) {
                if let Some(pending) = call.pending_token.take() {
                    warn!("Release of call {:?} timed out", call.call_id);
                    out.fail(pending.token());
                    expired += 1;
                }
            }
        }
        expired
    }
}
