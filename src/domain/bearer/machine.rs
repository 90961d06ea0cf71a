//! Bearer setup state machine

use crate::domain::bearer::entity::BearerState;
use crate::domain::bearer::store::{BearerHandle, BearerStore};
use crate::domain::bearer::value_object::{
    BearerType, DataCallDescriptor, NetworkParams, NetworkStartRequest, PdpFailCause,
};
use crate::domain::correlation::PendingToken;
use crate::domain::effects::{BasebandRequest, Notification, Outbox, Payload};
use crate::domain::ports::InterfaceProvider;
use crate::domain::shared::error::{DomainError, Result};
use crate::domain::shared::value_objects::{ClientToken, ContextId, LocalId};
use chrono::Duration;
use serde::Deserialize;
use tracing::{debug, info, trace, warn};

/// Parameters of a setup-data-connection command
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataCallRequest {
    pub apn: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// "IP", "IPV6", "IPV4V6" or "PPP"
    pub protocol: String,
}

/// Failure remembered until the client asks for it once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastFailure {
    pub local_id: LocalId,
    pub cause: PdpFailCause,
}

#[derive(Debug)]
pub struct DataControl {
    bearers: BearerStore,
    last_failure: Option<LastFailure>,
}

impl DataControl {
    pub fn new(max_bearers: usize, ifname_prefix: &str) -> Self {
        Self {
            bearers: BearerStore::new(max_bearers, ifname_prefix),
            last_failure: None,
        }
    }

    pub fn bearers(&self) -> &BearerStore {
        &self.bearers
    }

    pub fn last_failure(&self) -> Option<LastFailure> {
        self.last_failure
    }

    pub fn setup(
        &mut self,
        out: &mut Outbox,
        interfaces: &mut dyn InterfaceProvider,
        token: ClientToken,
        request: &DataCallRequest,
    ) -> Result<()> {
        let bearer_type = BearerType::parse(&request.protocol)?;
        let network = NetworkStartRequest::new(
            &request.apn,
            request.username.as_deref(),
            request.password.as_deref(),
        )?;

        let (handle, bearer) = self.bearers.start(interfaces, bearer_type)?;
        bearer.pending_token = Some(PendingToken::new(token, out.now()));
        info!(
            "Requesting {} data connection to APN '{}' on {} ({})",
            bearer_type, request.apn, bearer.ifname, handle
        );
        out.request(BasebandRequest::NetworkStart(network));
        Ok(())
    }

    pub fn on_network_start_confirmed(
        &mut self,
        out: &mut Outbox,
        interfaces: &mut dyn InterfaceProvider,
        context_id: ContextId,
        error: u32,
        params: NetworkParams,
    ) -> Result<()> {
        let handle = self.bearers.find_by_remote_id(None)?;

        if error != 0 {
            warn!("Network start for context {} failed (error {:#x})", context_id, error);
            return self.fail_setup(out, interfaces, handle);
        }

        if let Err(e) = self.bearers.bind_remote_id(handle, context_id) {
            self.fail_setup(out, interfaces, handle)?;
            return Err(DomainError::ProtocolError(format!(
                "network start confirmed with unusable context id: {}",
                e
            )));
        }

        let bearer = self
            .bearers
            .get_mut(handle)
            .ok_or_else(|| DomainError::NotRegistered(handle.to_string()))?;
        let descriptor =
            DataCallDescriptor::derive(bearer.local_id, bearer.bearer_type, &bearer.ifname, &params);
        info!(
            "Data connection up: cid {}, type {}, iface {}, ip {}, gateway {}, dnses {}",
            descriptor.cid,
            descriptor.bearer_type,
            descriptor.ifname,
            descriptor.addresses,
            descriptor.gateways,
            descriptor.dnses
        );
        bearer.descriptor = Some(descriptor.clone());
        match bearer.pending_token.take() {
            Some(pending) => out.succeed(pending.token(), Payload::DataCall(descriptor)),
            None => warn!("Bearer {} came up with no token parked", bearer.local_id),
        }
        Ok(())
    }

    /// Records the failure, fails the parked token and tears the bearer down
    ///
    /// Teardown cannot wait for the client to query the cause, since it may
    /// never ask.
    fn fail_setup(
        &mut self,
        out: &mut Outbox,
        interfaces: &mut dyn InterfaceProvider,
        handle: BearerHandle,
    ) -> Result<()> {
        let bearer = self.bearers.stop(interfaces, handle)?;
        self.last_failure = Some(LastFailure {
            local_id: bearer.local_id,
            cause: PdpFailCause::ErrorUnspecified,
        });
        if let Some(pending) = bearer.pending_token {
            out.fail(pending.token());
        }
        Ok(())
    }

    /// Tears the bearer down; a setup still in flight fails its own token first
    pub fn deactivate(
        &mut self,
        out: &mut Outbox,
        interfaces: &mut dyn InterfaceProvider,
        token: ClientToken,
        local_id: LocalId,
    ) -> Result<()> {
        let handle = self.bearers.find_by_local_id(local_id)?;
        let bearer = self.bearers.stop(interfaces, handle)?;
        if let Some(pending) = bearer.pending_token {
            debug!("Deactivation aborts setup of bearer {}", local_id);
            out.fail(pending.token());
        }
        out.succeed(token, Payload::None);
        info!("Data connection {} deactivated", local_id);
        Ok(())
    }

    /// Returns the remembered cause once, then `ErrorUnspecified`
    pub fn last_fail_cause(&mut self, out: &mut Outbox, token: ClientToken) -> Result<()> {
        let cause = match self.last_failure.take() {
            Some(failure) => {
                debug!("Last data failure was on bearer {}", failure.local_id);
                failure.cause
            }
            None => PdpFailCause::ErrorUnspecified,
        };
        out.succeed(token, Payload::FailCause(cause.code()));
        Ok(())
    }

    pub fn data_call_list(&mut self, out: &mut Outbox, token: ClientToken) -> Result<()> {
        let list = self
            .bearers
            .bound()
            .filter_map(|b| b.descriptor().cloned())
            .collect();
        out.succeed(token, Payload::DataCallList(list));
        Ok(())
    }

    /// The baseband dropped a bound bearer
    pub fn on_network_stopped(
        &mut self,
        out: &mut Outbox,
        interfaces: &mut dyn InterfaceProvider,
        context_id: ContextId,
    ) -> Result<()> {
        let handle = self.bearers.find_by_remote_id(Some(context_id))?;
        let bearer = self.bearers.stop(interfaces, handle)?;
        out.notify(Notification::DataCallListChanged);
        warn!("Baseband lost data connection {} (context {})", bearer.local_id, context_id);
        Ok(())
    }

    pub fn on_data_received(&mut self, context_id: ContextId, len: usize) -> Result<()> {
        trace!("{} bytes received on context {}, not handled here", len, context_id);
        Ok(())
    }

    /// Fails a setup parked for at least `timeout` as if the baseband had refused it
    pub fn expire(&mut self, out: &mut Outbox, interfaces: &mut dyn InterfaceProvider, timeout: Duration) -> usize {
        let now = out.now();
        let Ok(handle) = self.bearers.find_by_remote_id(None) else {
            return 0;
        };
        let expired = self
            .bearers
            .get(handle)
            .filter(|b| b.state() == BearerState::Requested)
            .and_then(|b| b.pending_token())
            .is_some_and(|p| p.is_expired(now, timeout));
        if !expired {
            return 0;
        }

        warn!("Data setup in {} timed out", handle);
        match self.fail_setup(out, interfaces, handle) {
            Ok(()) => 1,
            Err(e) => {
                warn!("Couldn't tear down timed out bearer: {}", e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::effects::Status;
    use crate::domain::ports::MockInterfaceProvider;
    use chrono::Utc;

    fn interfaces() -> MockInterfaceProvider {
        let mut interfaces = MockInterfaceProvider::new();
        interfaces.expect_open().returning(|_| Ok(()));
        interfaces.expect_close().return_const(());
        interfaces
    }

    fn request(apn: &str, protocol: &str) -> DataCallRequest {
        DataCallRequest {
            apn: apn.to_string(),
            username: None,
            password: None,
            protocol: protocol.to_string(),
        }
    }

    fn params() -> NetworkParams {
        NetworkParams {
            local_addr: 0x0A00_0001,
            dns1: 0x0101_0101,
            dns2: 0x0808_0808,
        }
    }

    fn outbox() -> Outbox {
        Outbox::new(Utc::now())
    }

    #[test]
    fn test_setup_success() {
        let mut ifs = interfaces();
        let mut data = DataControl::new(4, "tun");

        let mut out = outbox();
        data.setup(&mut out, &mut ifs, ClientToken::new(1), &request("internet", "IP"))
            .unwrap();
        assert!(out.completions().is_empty());
        match out.requests()[0] {
            BasebandRequest::NetworkStart(req) => assert_eq!(req.apn.as_str(), "internet"),
            other => panic!("unexpected request {:?}", other),
        }

        let mut out = outbox();
        data.on_network_start_confirmed(&mut out, &mut ifs, ContextId::new(5), 0, params())
            .unwrap();
        let completions = out.completions();
        assert_eq!(completions[0].token, ClientToken::new(1));
        let Payload::DataCall(descriptor) = &completions[0].payload else {
            panic!("expected a descriptor");
        };
        assert_eq!(descriptor.ifname, "tun0");
        assert_eq!(descriptor.addresses, "10.0.0.1/32");
        assert_eq!(descriptor.dnses, "1.1.1.1 8.8.8.8");

        let handle = data.bearers().find_by_remote_id(Some(ContextId::new(5))).unwrap();
        assert_eq!(data.bearers().get(handle).unwrap().state(), BearerState::Bound);
    }

    #[test]
    fn test_unknown_type_rejected_before_allocation() {
        let mut ifs = MockInterfaceProvider::new();
        ifs.expect_open().never();
        let mut data = DataControl::new(4, "tun");

        let mut out = outbox();
        let err = data
            .setup(&mut out, &mut ifs, ClientToken::new(1), &request("internet", "X.25"))
            .unwrap_err();
        assert!(matches!(err, DomainError::MalformedInput(_)));
        assert!(out.is_empty());
        assert!(data.bearers().is_empty());
    }

    #[test]
    fn test_oversized_apn_rejected() {
        let mut ifs = MockInterfaceProvider::new();
        ifs.expect_open().never();
        let mut data = DataControl::new(4, "tun");
        let apn = "a".repeat(101);
        assert!(matches!(
            data.setup(&mut outbox(), &mut ifs, ClientToken::new(1), &request(&apn, "IP")),
            Err(DomainError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_setup_failure_and_fail_cause_query() {
        let mut ifs = interfaces();
        let mut data = DataControl::new(4, "tun");
        data.setup(&mut outbox(), &mut ifs, ClientToken::new(1), &request("internet", "IP"))
            .unwrap();

        let mut out = outbox();
        data.on_network_start_confirmed(&mut out, &mut ifs, ContextId::new(5), 1, params())
            .unwrap();
        assert_eq!(out.completions()[0].status, Status::GenericFailure);
        assert!(data.bearers().is_empty());
        assert_eq!(
            data.last_failure(),
            Some(LastFailure {
                local_id: LocalId::new(1),
                cause: PdpFailCause::ErrorUnspecified
            })
        );

        let mut out = outbox();
        data.last_fail_cause(&mut out, ClientToken::new(2)).unwrap();
        assert_eq!(out.completions()[0].payload, Payload::FailCause(0xFFFF));
        assert!(data.last_failure().is_none());
    }

    #[test]
    fn test_confirmation_without_negotiating_bearer() {
        let mut ifs = interfaces();
        let mut data = DataControl::new(4, "tun");
        let mut out = outbox();
        assert!(matches!(
            data.on_network_start_confirmed(&mut out, &mut ifs, ContextId::new(1), 0, params()),
            Err(DomainError::NotFound(_))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_deactivate() {
        let mut ifs = interfaces();
        let mut data = DataControl::new(4, "tun");
        data.setup(&mut outbox(), &mut ifs, ClientToken::new(1), &request("internet", "PPP"))
            .unwrap();
        data.on_network_start_confirmed(&mut outbox(), &mut ifs, ContextId::new(9), 0, params())
            .unwrap();

        let mut out = outbox();
        data.deactivate(&mut out, &mut ifs, ClientToken::new(2), LocalId::new(1))
            .unwrap();
        assert_eq!(out.completions().len(), 1);
        assert!(out.completions()[0].is_success());
        assert!(out.notifications().is_empty());
        assert!(data.bearers().is_empty());

        assert!(matches!(
            data.deactivate(&mut outbox(), &mut ifs, ClientToken::new(3), LocalId::new(1)),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn test_deactivate_during_setup_fails_setup_token() {
        let mut ifs = interfaces();
        let mut data = DataControl::new(4, "tun");
        data.setup(&mut outbox(), &mut ifs, ClientToken::new(1), &request("internet", "IP"))
            .unwrap();

        let mut out = outbox();
        data.deactivate(&mut out, &mut ifs, ClientToken::new(2), LocalId::new(1))
            .unwrap();
        let completions = out.completions();
        assert_eq!(completions.len(), 2);
        assert_eq!(completions[0].token, ClientToken::new(1));
        assert_eq!(completions[0].status, Status::GenericFailure);
        assert!(completions[1].is_success());
        assert!(!data.bearers().is_negotiating());
    }

    #[test]
    fn test_data_call_list_and_network_loss() {
        let mut ifs = interfaces();
        let mut data = DataControl::new(4, "tun");

        let mut out = outbox();
        data.data_call_list(&mut out, ClientToken::new(1)).unwrap();
        assert_eq!(out.completions()[0].payload, Payload::DataCallList(vec![]));

        data.setup(&mut outbox(), &mut ifs, ClientToken::new(2), &request("internet", "IP"))
            .unwrap();
        data.on_network_start_confirmed(&mut outbox(), &mut ifs, ContextId::new(4), 0, params())
            .unwrap();
        data.setup(&mut outbox(), &mut ifs, ClientToken::new(3), &request("mms", "IP"))
            .unwrap();

        let mut out = outbox();
        data.data_call_list(&mut out, ClientToken::new(4)).unwrap();
        let Payload::DataCallList(list) = &out.completions()[0].payload else {
            panic!("expected a list");
        };
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].cid, 1);

        let mut out = outbox();
        data.on_network_stopped(&mut out, &mut ifs, ContextId::new(4)).unwrap();
        assert_eq!(out.notifications(), vec![Notification::DataCallListChanged]);
        assert_eq!(data.bearers().len(), 1);
    }

    #[test]
    fn test_expire_stuck_setup() {
        let mut ifs = interfaces();
        let mut data = DataControl::new(4, "tun");
        let start = Utc::now();
        data.setup(&mut Outbox::new(start), &mut ifs, ClientToken::new(1), &request("internet", "IP"))
            .unwrap();

        let mut out = Outbox::new(start + Duration::seconds(10));
        assert_eq!(data.expire(&mut out, &mut ifs, Duration::seconds(30)), 0);

        let mut out = Outbox::new(start + Duration::seconds(30));
        assert_eq!(data.expire(&mut out, &mut ifs, Duration::seconds(30)), 1);
        assert_eq!(out.completions()[0].status, Status::GenericFailure);
        assert!(data.bearers().is_empty());
        assert!(data.last_failure().is_some());
    }
}
