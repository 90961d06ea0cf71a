//! Dispatcher between the client, the baseband and the state machines

use crate::application::command::{network_params, BasebandEvent, ClientRequest, Command, Inbound};
use crate::application::metrics;
use crate::config::Config;
use crate::domain::bearer::DataControl;
use crate::domain::call::CallControl;
use crate::domain::effects::{Effect, Outbox};
use crate::domain::ports::{BasebandLink, InterfaceProvider, RadioClient};
use crate::domain::shared::error::Result;
use crate::domain::shared::value_objects::ClientToken;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

/// Owns both state machines and the ports their effects go out through
///
/// Every entry point runs to completion and flushes its effects before
/// returning, so a client token is resolved at most once and always in the
/// order the machines produced it.
pub struct Bridge<C, B, I> {
    calls: CallControl,
    data: DataControl,
    client: C,
    baseband: B,
    interfaces: I,
    pending_timeout: Option<Duration>,
}

impl<C, B, I> Bridge<C, B, I>
where
    C: RadioClient,
    B: BasebandLink,
    I: InterfaceProvider,
{
    pub fn new(config: &Config, client: C, baseband: B, interfaces: I) -> Self {
        Self {
            calls: CallControl::new(config.core.max_calls),
            data: DataControl::new(config.core.max_bearers, &config.interfaces.prefix),
            client,
            baseband,
            interfaces,
            pending_timeout: config.core.pending_timeout(),
        }
    }

    pub fn calls(&self) -> &CallControl {
        &self.calls
    }

    pub fn data(&self) -> &DataControl {
        &self.data
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn baseband(&self) -> &B {
        &self.baseband
    }

    pub fn interfaces(&self) -> &I {
        &self.interfaces
    }

    pub fn handle(&mut self, inbound: Inbound, now: DateTime<Utc>) {
        match inbound {
            Inbound::Request(request) => self.handle_request(request, now),
            Inbound::Event(event) => self.handle_event(event, now),
            Inbound::Malformed(token) => self.reject(token, now),
            Inbound::Tick => {
                self.expire_pending(now);
            }
        }
    }

    /// Runs a command; an error resolves its token with a generic failure
    pub fn handle_request(&mut self, request: ClientRequest, now: DateTime<Utc>) {
        let ClientRequest { token, command } = request;
        let mut out = Outbox::new(now);
        debug!("Command {} with token {}", command.name(), token);

        if let Err(e) = self.dispatch_command(&mut out, token, &command) {
            warn!("Command {} (token {}) failed: {}", command.name(), token, e);
            out.fail(token);
        }
        self.flush(out);
    }

    /// Applies a baseband event; an error only gets logged
    pub fn handle_event(&mut self, event: BasebandEvent, now: DateTime<Utc>) {
        let mut out = Outbox::new(now);
        let name = event.name();
        debug!("Baseband event {}", name);

        if let Err(e) = self.dispatch_event(&mut out, event) {
            warn!("Dropped baseband event {}: {}", name, e);
            metrics::record_dropped_event(name, e.kind());
        }
        self.flush(out);
    }

    /// Fails a request that could not be decoded
    pub fn reject(&mut self, token: ClientToken, now: DateTime<Utc>) {
        warn!("Rejecting undecodable request with token {}", token);
        let mut out = Outbox::new(now);
        out.fail(token);
        self.flush(out);
    }

    /// Fails every token parked longer than the configured timeout
    pub fn expire_pending(&mut self, now: DateTime<Utc>) -> usize {
        let Some(timeout) = self.pending_timeout else {
            return 0;
        };
        let mut out = Outbox::new(now);
        let expired = self.calls.expire(&mut out, timeout) + self.data.expire(&mut out, &mut self.interfaces, timeout);
        if expired > 0 {
            warn!("Expired {} pending token(s)", expired);
        }
        metrics::record_expired(expired);
        self.flush(out);
        expired
    }

    fn dispatch_command(&mut self, out: &mut Outbox, token: ClientToken, command: &Command) -> Result<()> {
        match command {
            Command::Dial { number } => self.calls.dial(out, token, number),
            Command::Answer => self.calls.answer(out, token),
            Command::Hangup { index } => self.calls.hangup(out, token, *index),
            Command::HangupWaitingOrBackground => self.calls.hangup_waiting_or_background(out, token),
            Command::HangupForegroundResumeBackground => {
                self.calls.hangup_foreground_resume_background(out, token)
            }
            Command::SwitchHoldingAndActive => self.calls.switch_holding_and_active(out, token),
            Command::Dtmf { tone } => self.calls.dtmf(out, token, *tone),
            Command::DtmfStart { tone } => self.calls.dtmf_start(out, token, *tone),
            Command::DtmfStop => self.calls.dtmf_stop(out, token),
            Command::CurrentCalls => self.calls.current_calls(out, token),
            Command::LastCallFailCause => self.calls.last_call_fail_cause(out, token),
            Command::SetupDataCall(request) => self.data.setup(out, &mut self.interfaces, token, request),
            Command::DeactivateDataCall { cid } => self.data.deactivate(out, &mut self.interfaces, token, *cid),
            Command::LastDataCallFailCause => self.data.last_fail_cause(out, token),
            Command::DataCallList => self.data.data_call_list(out, token),
        }
    }

    fn dispatch_event(&mut self, out: &mut Outbox, event: BasebandEvent) -> Result<()> {
        match event {
            BasebandEvent::IncomingCall {
                call_id,
                number,
                call_type,
            } => self.calls.on_incoming_call(out, call_id, &number, call_type),
            BasebandEvent::CallSetupAssigned { call_id } => self.calls.on_call_setup_assigned(out, call_id),
            BasebandEvent::CallSetupRejected { cause } => self.calls.on_call_setup_rejected(out, cause),
            BasebandEvent::RemoteConnected { call_id } => self.calls.on_remote_connected(out, call_id),
            BasebandEvent::CallEnded { call_id, cause } => self.calls.on_call_ended(out, call_id, cause),
            BasebandEvent::DtmfStartConfirmed { reason } => self.calls.on_dtmf_start_confirmed(out, reason),
            BasebandEvent::DtmfStopConfirmed { reason } => self.calls.on_dtmf_stop_confirmed(out, reason),
            BasebandEvent::NetworkStartConfirmed {
                context_id,
                error,
                local_addr,
                dns1,
                dns2,
            } => self.data.on_network_start_confirmed(
                out,
                &mut self.interfaces,
                context_id,
                error,
                network_params(local_addr, dns1, dns2),
            ),
            BasebandEvent::NetworkStopped { context_id } => {
                self.data.on_network_stopped(out, &mut self.interfaces, context_id)
            }
            BasebandEvent::DataReceived { context_id, len } => self.data.on_data_received(context_id, len),
        }
    }

    fn flush(&mut self, out: Outbox) {
        for effect in out.into_effects() {
            match effect {
                Effect::Request(request) => {
                    debug!("-> baseband {}", request.name());
                    self.baseband.send(request);
                }
                Effect::Complete(completion) => {
                    metrics::record_completion(completion.status);
                    self.client.complete(completion);
                }
                Effect::Notify(event) => {
                    debug!("-> client {}", event.name());
                    self.client.unsolicited(event);
                }
            }
        }
        metrics::update_live_contexts(self.calls.calls().len(), self.data.bearers().len());
    }
}
