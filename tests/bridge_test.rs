//! Bridge Integration Tests
//!
//! Drive the bridge with commands and baseband events and check what comes
//! out on the outbound channel.

use chrono::{DateTime, Duration, Utc};
use modemlink::application::{BasebandEvent, Bridge, ClientRequest, Command};
use modemlink::config::Config;
use modemlink::domain::bearer::DataCallRequest;
use modemlink::domain::call::{CallState, CallType};
use modemlink::domain::effects::{BasebandRequest, Completion, Notification, Payload, Status};
use modemlink::domain::shared::value_objects::{CallId, ClientToken, ContextId, LocalId};
use modemlink::infrastructure::{Outbound, OutboundChannel, VirtualInterfaces};
use std::net::Ipv4Addr;
use tokio::sync::mpsc::UnboundedReceiver;

type TestBridge = Bridge<OutboundChannel, OutboundChannel, VirtualInterfaces>;

fn setup_bridge(config: Config) -> (TestBridge, UnboundedReceiver<Outbound>) {
    let (channel, rx) = OutboundChannel::new();
    let bridge = Bridge::new(&config, channel.clone(), channel, VirtualInterfaces::new());
    (bridge, rx)
}

fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut records = Vec::new();
    while let Ok(record) = rx.try_recv() {
        records.push(record);
    }
    records
}

fn completions(records: &[Outbound]) -> Vec<&Completion> {
    records
        .iter()
        .filter_map(|r| match r {
            Outbound::Completion(c) => Some(c),
            _ => None,
        })
        .collect()
}

fn notifications(records: &[Outbound]) -> Vec<Notification> {
    records
        .iter()
        .filter_map(|r| match r {
            Outbound::Unsolicited(u) => Some(u.notification),
            _ => None,
        })
        .collect()
}

fn requests(records: &[Outbound]) -> Vec<&BasebandRequest> {
    records
        .iter()
        .filter_map(|r| match r {
            Outbound::Request(req) => Some(req),
            _ => None,
        })
        .collect()
}

fn command(bridge: &mut TestBridge, token: u64, command: Command, now: DateTime<Utc>) {
    bridge.handle_request(
        ClientRequest {
            token: ClientToken::new(token),
            command,
        },
        now,
    );
}

fn incoming(bridge: &mut TestBridge, id: u32, number: &str, now: DateTime<Utc>) {
    bridge.handle_event(
        BasebandEvent::IncomingCall {
            call_id: CallId::new(id),
            number: number.to_string(),
            call_type: CallType::Voice,
        },
        now,
    );
}

fn data_request(apn: &str) -> DataCallRequest {
    DataCallRequest {
        apn: apn.to_string(),
        username: None,
        password: None,
        protocol: "IP".to_string(),
    }
}

#[test]
fn test_dial_round_trip() {
    let (mut bridge, mut rx) = setup_bridge(Config::default());
    let now = Utc::now();

    command(
        &mut bridge,
        1,
        Command::Dial {
            number: "12345".to_string(),
        },
        now,
    );
    let records = drain(&mut rx);
    assert!(completions(&records).is_empty());
    assert!(matches!(
        requests(&records)[..],
        [BasebandRequest::CallSetup { .. }]
    ));

    bridge.handle_event(BasebandEvent::CallSetupAssigned { call_id: CallId::new(7) }, now);
    let records = drain(&mut rx);
    assert_eq!(notifications(&records), vec![Notification::CallStateChanged]);
    let done = completions(&records);
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].token, ClientToken::new(1));
    assert!(done[0].is_success());

    bridge.handle_event(BasebandEvent::RemoteConnected { call_id: CallId::new(7) }, now);
    let records = drain(&mut rx);
    assert_eq!(notifications(&records), vec![Notification::CallStateChanged]);
    assert!(completions(&records).is_empty());

    command(&mut bridge, 2, Command::CurrentCalls, now);
    let records = drain(&mut rx);
    let Payload::CallList(entries) = &completions(&records)[0].payload else {
        panic!("expected a call list");
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].state, CallState::Active);
    assert_eq!(entries[0].index, 8);
    assert!(!entries[0].is_mobile_terminated);
}

#[test]
fn test_second_dial_rejected_without_mutation() {
    let (mut bridge, mut rx) = setup_bridge(Config::default());
    let now = Utc::now();

    command(&mut bridge, 1, Command::Dial { number: "111".to_string() }, now);
    drain(&mut rx);

    command(&mut bridge, 2, Command::Dial { number: "222".to_string() }, now);
    let records = drain(&mut rx);
    assert!(requests(&records).is_empty());
    let done = completions(&records);
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].token, ClientToken::new(2));
    assert_eq!(done[0].status, Status::GenericFailure);
    assert_eq!(bridge.calls().calls().len(), 1);

    // the first dial still completes
    bridge.handle_event(BasebandEvent::CallSetupAssigned { call_id: CallId::new(0) }, now);
    let records = drain(&mut rx);
    assert_eq!(completions(&records)[0].token, ClientToken::new(1));
}

#[test]
fn test_pool_bound_and_unique_ids() {
    let mut config = Config::default();
    config.core.max_calls = 2;
    let (mut bridge, mut rx) = setup_bridge(config);
    let now = Utc::now();

    incoming(&mut bridge, 1, "100", now);
    incoming(&mut bridge, 1, "101", now);
    assert_eq!(bridge.calls().calls().len(), 1);

    incoming(&mut bridge, 2, "102", now);
    incoming(&mut bridge, 3, "103", now);
    assert_eq!(bridge.calls().calls().len(), 2);

    let records = drain(&mut rx);
    assert_eq!(
        notifications(&records),
        vec![
            Notification::Ring,
            Notification::CallStateChanged,
            Notification::Ring,
            Notification::CallStateChanged
        ]
    );

    command(&mut bridge, 1, Command::Dial { number: "200".to_string() }, now);
    let records = drain(&mut rx);
    assert_eq!(completions(&records)[0].status, Status::GenericFailure);

    bridge.handle_event(
        BasebandEvent::CallEnded {
            call_id: CallId::new(1),
            cause: 16,
        },
        now,
    );
    incoming(&mut bridge, 3, "103", now);
    assert_eq!(bridge.calls().calls().len(), 2);
}

#[test]
fn test_current_calls_empty() {
    let (mut bridge, mut rx) = setup_bridge(Config::default());
    command(&mut bridge, 5, Command::CurrentCalls, Utc::now());

    let records = drain(&mut rx);
    let done = completions(&records);
    assert_eq!(done.len(), 1);
    assert!(done[0].is_success());
    assert_eq!(done[0].payload, Payload::None);
}

#[test]
fn test_address_classification() {
    let (mut bridge, mut rx) = setup_bridge(Config::default());
    let now = Utc::now();
    incoming(&mut bridge, 0, "+4930123456", now);
    incoming(&mut bridge, 1, "030123456", now);
    incoming(&mut bridge, 2, "", now);
    drain(&mut rx);

    command(&mut bridge, 1, Command::CurrentCalls, now);
    let records = drain(&mut rx);
    let Payload::CallList(entries) = &completions(&records)[0].payload else {
        panic!("expected a call list");
    };
    assert_eq!(entries.len(), 3);

    let by_index = |index: u32| entries.iter().find(|e| e.index == index).unwrap();
    assert_eq!(by_index(1).toa, 145);
    assert_eq!(by_index(1).number_presentation, 0);
    assert_eq!(by_index(2).toa, 129);
    assert_eq!(by_index(3).number_presentation, 2);
    assert!(by_index(3).is_mobile_terminated);
}

#[test]
fn test_hangup_resolves_once() {
    let (mut bridge, mut rx) = setup_bridge(Config::default());
    let now = Utc::now();
    incoming(&mut bridge, 4, "555", now);
    command(&mut bridge, 1, Command::Answer, now);
    drain(&mut rx);

    command(&mut bridge, 2, Command::Hangup { index: 5 }, now);
    let records = drain(&mut rx);
    assert!(completions(&records).is_empty());
    assert!(matches!(
        requests(&records)[..],
        [BasebandRequest::CallRelease { .. }]
    ));

    bridge.handle_event(
        BasebandEvent::CallEnded {
            call_id: CallId::new(4),
            cause: 16,
        },
        now,
    );
    let records = drain(&mut rx);
    let done = completions(&records);
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].token, ClientToken::new(2));

    // a duplicate end event finds nothing and completes nothing
    bridge.handle_event(
        BasebandEvent::CallEnded {
            call_id: CallId::new(4),
            cause: 16,
        },
        now,
    );
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn test_hangup_foreground_resume_background() {
    let (mut bridge, mut rx) = setup_bridge(Config::default());
    let now = Utc::now();

    incoming(&mut bridge, 0, "100", now);
    command(&mut bridge, 1, Command::Answer, now);
    command(&mut bridge, 2, Command::SwitchHoldingAndActive, now);
    incoming(&mut bridge, 1, "200", now);
    command(&mut bridge, 3, Command::Answer, now);
    drain(&mut rx);

    command(&mut bridge, 4, Command::HangupForegroundResumeBackground, now);
    let records = drain(&mut rx);
    let sent = requests(&records);
    assert_eq!(sent.len(), 2);
    assert_eq!(
        sent.iter()
            .filter(|r| matches!(r, BasebandRequest::CallRelease { call_id, .. } if *call_id == CallId::new(1)))
            .count(),
        1
    );
    assert_eq!(
        sent.iter()
            .filter(|r| matches!(r, BasebandRequest::CallActivate { call_id } if *call_id == CallId::new(0)))
            .count(),
        1
    );

    let calls = bridge.calls().calls();
    let held = calls.find_by_id(Some(CallId::new(0))).unwrap();
    assert_eq!(calls.get(held).unwrap().state(), CallState::Active);

    bridge.handle_event(
        BasebandEvent::CallEnded {
            call_id: CallId::new(1),
            cause: 16,
        },
        now,
    );
    let records = drain(&mut rx);
    assert_eq!(completions(&records)[0].token, ClientToken::new(4));
}

#[test]
fn test_dtmf_second_start_conflicts() {
    let (mut bridge, mut rx) = setup_bridge(Config::default());
    let now = Utc::now();
    incoming(&mut bridge, 0, "100", now);
    command(&mut bridge, 1, Command::Answer, now);
    drain(&mut rx);

    command(&mut bridge, 2, Command::DtmfStart { tone: '5' }, now);
    command(&mut bridge, 3, Command::DtmfStart { tone: '6' }, now);
    let records = drain(&mut rx);
    let done = completions(&records);
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].token, ClientToken::new(3));
    assert_eq!(done[0].status, Status::GenericFailure);

    bridge.handle_event(BasebandEvent::DtmfStartConfirmed { reason: 0 }, now);
    let records = drain(&mut rx);
    assert_eq!(completions(&records)[0].token, ClientToken::new(2));
    assert!(completions(&records)[0].is_success());
}

#[test]
fn test_bearer_setup_failure_path() {
    let (mut bridge, mut rx) = setup_bridge(Config::default());
    let now = Utc::now();

    command(&mut bridge, 1, Command::SetupDataCall(data_request("internet")), now);
    assert!(bridge.interfaces().is_open("tun0"));
    let records = drain(&mut rx);
    match requests(&records)[..] {
        [BasebandRequest::NetworkStart(req)] => assert_eq!(req.apn.as_str(), "internet"),
        ref other => panic!("unexpected requests {:?}", other),
    }

    bridge.handle_event(
        BasebandEvent::NetworkStartConfirmed {
            context_id: ContextId::new(1),
            error: 0x8001,
            local_addr: Ipv4Addr::UNSPECIFIED,
            dns1: Ipv4Addr::UNSPECIFIED,
            dns2: Ipv4Addr::UNSPECIFIED,
        },
        now,
    );
    let records = drain(&mut rx);
    let done = completions(&records);
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].token, ClientToken::new(1));
    assert_eq!(done[0].status, Status::GenericFailure);
    assert!(bridge.data().bearers().is_empty());
    assert!(!bridge.interfaces().is_open("tun0"));

    command(&mut bridge, 2, Command::LastDataCallFailCause, now);
    command(&mut bridge, 3, Command::LastDataCallFailCause, now);
    let records = drain(&mut rx);
    let done = completions(&records);
    assert_eq!(done[0].payload, Payload::FailCause(0xFFFF));
    assert!(done[0].is_success());
    assert_eq!(done[1].payload, Payload::FailCause(0xFFFF));
    assert!(bridge.data().last_failure().is_none());
}

#[test]
fn test_bearer_lifecycle() {
    let (mut bridge, mut rx) = setup_bridge(Config::default());
    let now = Utc::now();

    command(&mut bridge, 1, Command::SetupDataCall(data_request("internet")), now);
    bridge.handle_event(
        BasebandEvent::NetworkStartConfirmed {
            context_id: ContextId::new(3),
            error: 0,
            local_addr: Ipv4Addr::new(10, 64, 1, 2),
            dns1: Ipv4Addr::new(8, 8, 8, 8),
            dns2: Ipv4Addr::new(8, 8, 4, 4),
        },
        now,
    );
    let records = drain(&mut rx);
    let Payload::DataCall(descriptor) = &completions(&records)[0].payload else {
        panic!("expected a descriptor");
    };
    assert_eq!(descriptor.cid, 1);
    assert_eq!(descriptor.ifname, "tun0");
    assert_eq!(descriptor.addresses, "10.64.1.2/32");
    assert_eq!(descriptor.gateways, "10.64.1.2");
    assert_eq!(descriptor.dnses, "8.8.8.8 8.8.4.4");

    command(&mut bridge, 2, Command::SetupDataCall(data_request("mms")), now);
    assert!(bridge.interfaces().is_open("tun1"));
    drain(&mut rx);

    command(&mut bridge, 3, Command::DataCallList, now);
    let records = drain(&mut rx);
    let Payload::DataCallList(list) = &completions(&records)[0].payload else {
        panic!("expected a list");
    };
    assert_eq!(list.len(), 1);

    bridge.handle_event(BasebandEvent::NetworkStopped { context_id: ContextId::new(3) }, now);
    let records = drain(&mut rx);
    assert_eq!(notifications(&records), vec![Notification::DataCallListChanged]);
    assert!(!bridge.interfaces().is_open("tun0"));

    command(&mut bridge, 4, Command::DeactivateDataCall { cid: LocalId::new(2) }, now);
    let records = drain(&mut rx);
    let done = completions(&records);
    assert_eq!(done.len(), 2);
    assert_eq!(done[0].token, ClientToken::new(2));
    assert_eq!(done[0].status, Status::GenericFailure);
    assert_eq!(done[1].token, ClientToken::new(4));
    assert!(done[1].is_success());
    assert_eq!(bridge.interfaces().open_count(), 0);
}

#[test]
fn test_unavailable_interface_fails_setup() {
    let (channel, mut rx) = OutboundChannel::new();
    let mut interfaces = VirtualInterfaces::new();
    interfaces.mark_unavailable("tun0");
    let mut bridge = Bridge::new(&Config::default(), channel.clone(), channel, interfaces);

    command(&mut bridge, 1, Command::SetupDataCall(data_request("internet")), Utc::now());
    let records = drain(&mut rx);
    assert!(requests(&records).is_empty());
    assert_eq!(completions(&records)[0].status, Status::GenericFailure);
    assert!(bridge.data().bearers().is_empty());
}

#[test]
fn test_pending_tokens_expire() {
    let (mut bridge, mut rx) = setup_bridge(Config::default());
    let start = Utc::now();

    command(&mut bridge, 1, Command::Dial { number: "123".to_string() }, start);
    command(&mut bridge, 2, Command::SetupDataCall(data_request("internet")), start);
    drain(&mut rx);

    assert_eq!(bridge.expire_pending(start + Duration::seconds(5)), 0);
    assert_eq!(bridge.expire_pending(start + Duration::seconds(30)), 2);

    let records = drain(&mut rx);
    let mut failed: Vec<u64> = completions(&records)
        .iter()
        .filter(|c| c.status == Status::GenericFailure)
        .map(|c| c.token.value())
        .collect();
    failed.sort();
    assert_eq!(failed, vec![1, 2]);
    assert!(bridge.calls().calls().is_empty());
    assert!(bridge.data().bearers().is_empty());

    // late confirmations find nothing
    bridge.handle_event(BasebandEvent::CallSetupAssigned { call_id: CallId::new(0) }, start);
    assert!(completions(&drain(&mut rx)).is_empty());
}

#[test]
fn test_tones_go_to_resumed_call_after_foreground_hangup() {
    let (mut bridge, mut rx) = setup_bridge(Config::default());
    let now = Utc::now();

    incoming(&mut bridge, 0, "100", now);
    command(&mut bridge, 1, Command::Answer, now);
    command(&mut bridge, 2, Command::SwitchHoldingAndActive, now);
    incoming(&mut bridge, 1, "200", now);
    command(&mut bridge, 3, Command::Answer, now);
    command(&mut bridge, 4, Command::SwitchHoldingAndActive, now);
    command(&mut bridge, 5, Command::HangupForegroundResumeBackground, now);
    drain(&mut rx);

    command(&mut bridge, 6, Command::DtmfStart { tone: '5' }, now);
    let records = drain(&mut rx);
    assert!(matches!(
        requests(&records)[..],
        [BasebandRequest::DtmfStart { call_id, .. }] if *call_id == CallId::new(1)
    ));

    command(&mut bridge, 7, Command::SwitchHoldingAndActive, now);
    let records = drain(&mut rx);
    assert_eq!(
        requests(&records),
        vec![&BasebandRequest::CallHold { call_id: CallId::new(1) }]
    );
}

#[test]
fn test_reserved_call_id_dropped() {
    let (mut bridge, mut rx) = setup_bridge(Config::default());
    let now = Utc::now();

    incoming(&mut bridge, CallId::UNASSIGNED, "100", now);
    assert!(drain(&mut rx).is_empty());
    assert!(bridge.calls().calls().is_empty());

    command(&mut bridge, 1, Command::CurrentCalls, now);
    let records = drain(&mut rx);
    assert_eq!(completions(&records)[0].payload, Payload::None);
}

#[test]
fn test_one_shot_dtmf_completes_without_request() {
    let (mut bridge, mut rx) = setup_bridge(Config::default());
    let now = Utc::now();
    incoming(&mut bridge, 0, "100", now);
    command(&mut bridge, 1, Command::Answer, now);
    drain(&mut rx);

    command(&mut bridge, 2, Command::Dtmf { tone: '7' }, now);
    let records = drain(&mut rx);
    assert!(requests(&records).is_empty());
    assert_eq!(completions(&records).len(), 1);
    assert!(completions(&records)[0].is_success());
}
