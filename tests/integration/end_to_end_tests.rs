//! Poller ↔ service round trips over the loopback bus.

use super::mock_bus::{
    PEER, RecordingBus, RecordingSink, Transaction, peer, peer_address, peer_booted_at,
    peer_config,
};

use i2c_registry::client::Validity;
use i2c_registry::error::{BusError, ConfigError, TransactionError};
use i2c_registry::{
    ClientRegistryPoller, CycleOutcome, DecodeKind, KeyWidth, PollerState, Reading, RegistryEvent,
    RegistryKey, ServiceBuilder, config,
};

fn setup() -> (ClientRegistryPoller, RecordingBus, RecordingSink) {
    let (bus, _) = peer();
    (
        ClientRegistryPoller::new(&peer_config()).unwrap(),
        RecordingBus::new(bus),
        RecordingSink::new(),
    )
}

// ── Polling a sensor pair ─────────────────────────────────────

#[test]
fn one_cycle_reads_every_key_and_decodes_values() {
    let (mut poller, mut bus, mut sink) = setup();

    let report = poller.poll_cycle(&mut bus, &mut sink);

    assert_eq!(report.outcome, CycleOutcome::Success);
    assert_eq!(report.failed(), 0);
    assert_eq!(poller.state(), PollerState::Idle);
    assert_eq!(poller.last_outcome(), Some(CycleOutcome::Success));

    let rssi = poller.sensor(poller.find("wifi signal").unwrap()).unwrap();
    assert_eq!(rssi.last_known_value(), Some(Reading::SignalStrength(-60)));
    assert!(!rssi.is_stale());

    let uptime = poller.sensor(poller.find("uptime").unwrap()).unwrap();
    assert_eq!(uptime.last_known_value(), Some(Reading::Counter(1234)));
    assert_eq!(uptime.validity(), Validity::Valid);

    let fan = poller.switch(poller.find("fan").unwrap()).unwrap();
    assert_eq!(fan.confirmed_state(), Some(false));

    assert!(bus.log.iter().all(|t| matches!(
        t,
        Transaction::Read { address: PEER, .. }
    )));
}

#[test]
fn events_follow_configuration_order_and_end_with_cycle_completed() {
    let (mut poller, mut bus, mut sink) = setup();
    poller.poll_cycle(&mut bus, &mut sink);

    let keys: Vec<u16> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            RegistryEvent::SensorUpdated { key, .. } | RegistryEvent::SwitchConfirmed { key, .. } => {
                Some(key.get())
            }
            _ => None,
        })
        .collect();
    assert_eq!(keys, vec![0x10, 0x11, 0x21, 0x31]);
    assert!(matches!(
        sink.events.last(),
        Some(RegistryEvent::CycleCompleted {
            outcome: CycleOutcome::Success,
            failed: 0,
            ..
        })
    ));
}

#[test]
fn request_order_is_stable_across_cycles() {
    let (mut poller, mut bus, mut sink) = setup();
    poller.poll_cycle(&mut bus, &mut sink);
    let first = bus.read_requests();
    bus.log.clear();

    bus.inner.set_offline(peer_address(), true);
    poller.poll_cycle(&mut bus, &mut sink);
    let second = bus.read_requests();

    assert_eq!(first, vec![vec![0x10], vec![0x11], vec![0x21], vec![0x31]]);
    assert_eq!(first, second);
}

// ── Partial and total failure ─────────────────────────────────

#[test]
fn one_failed_key_does_not_stop_the_cycle() {
    let (mut poller, mut bus, mut sink) = setup();
    poller.poll_cycle(&mut bus, &mut sink);

    bus.inner.fail_next(BusError::ArbitrationLost);
    let report = poller.poll_cycle(&mut bus, &mut sink);

    assert_eq!(report.outcome, CycleOutcome::Failed);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.outcomes.len(), 4);

    let rssi = poller.sensor(poller.find("wifi signal").unwrap()).unwrap();
    assert!(rssi.is_stale());
    assert_eq!(rssi.last_known_value(), Some(Reading::SignalStrength(-60)));
    assert_eq!(
        rssi.last_error(),
        Some(TransactionError::Bus(BusError::ArbitrationLost))
    );

    let uptime = poller.sensor(poller.find("uptime").unwrap()).unwrap();
    assert!(!uptime.is_stale());
}

#[test]
fn offline_peer_keeps_values_and_goes_stale_once() {
    let (mut poller, mut bus, mut sink) = setup();
    poller.poll_cycle(&mut bus, &mut sink);
    sink.clear();

    let before = ["wifi signal", "uptime"]
        .map(|name| poller.sensor(poller.find(name).unwrap()).unwrap().last_known_value());

    bus.inner.set_offline(peer_address(), true);
    for cycle in 1..=3 {
        let report = poller.poll_cycle(&mut bus, &mut sink);
        assert_eq!(report.outcome, CycleOutcome::Failed);
        assert_eq!(report.failed(), 4);

        for (name, value) in ["wifi signal", "uptime"].iter().zip(before) {
            let s = poller.sensor(poller.find(name).unwrap()).unwrap();
            assert!(s.is_stale(), "{name} not stale after cycle {cycle}");
            assert_eq!(s.last_known_value(), value, "{name} changed in cycle {cycle}");
        }
    }

    for name in ["wifi signal", "uptime"] {
        let s = poller.sensor(poller.find(name).unwrap()).unwrap();
        assert!(s.is_stale(), "{name} should be stale");
        assert!(s.last_known_value().is_some(), "{name} lost its value");
        assert_eq!(s.last_error(), Some(TransactionError::Bus(BusError::Timeout)));
    }
    let fan = poller.switch(poller.find("fan").unwrap()).unwrap();
    assert_eq!(fan.confirmed_state(), Some(false));
    assert!(fan.is_stale());

    let stale = sink.count(|e| {
        matches!(
            e,
            RegistryEvent::SensorStale { .. } | RegistryEvent::SwitchStale { .. }
        )
    });
    assert_eq!(stale, 4, "one stale event per endpoint, not per cycle");
    assert_eq!(
        sink.count(|e| matches!(e, RegistryEvent::SensorUpdated { .. })),
        0
    );

    // Back online: fresh values, valid again.
    bus.inner.set_offline(peer_address(), false);
    let report = poller.poll_cycle(&mut bus, &mut sink);
    assert_eq!(report.outcome, CycleOutcome::Success);
    let rssi = poller.sensor(poller.find("wifi signal").unwrap()).unwrap();
    assert!(!rssi.is_stale());
    assert_eq!(rssi.last_error(), None);
}

#[test]
fn unknown_key_on_peer_is_a_failed_read() {
    let (bus, _) = peer();
    let mut bus = RecordingBus::new(bus);
    let mut cfg = peer_config();
    cfg.sensors.push(config::SensorConfig {
        name: "missing".into(),
        key: RegistryKey(0x7E),
        kind: DecodeKind::Measurement,
    });
    let mut poller = ClientRegistryPoller::new(&cfg).unwrap();
    let mut sink = RecordingSink::new();

    let report = poller.poll_cycle(&mut bus, &mut sink);
    assert_eq!(report.failed(), 1);
    let missing = poller.sensor(poller.find("missing").unwrap()).unwrap();
    assert_eq!(
        missing.last_error(),
        Some(TransactionError::Bus(BusError::NotAcknowledged))
    );
}

#[test]
fn width_mismatch_is_malformed_not_garbage() {
    let (bus, _) = peer();
    let mut bus = RecordingBus::new(bus);
    let mut cfg = peer_config();
    // Uptime is served as four bytes; ask for a one-byte signal instead.
    cfg.sensors[1].kind = DecodeKind::SignalStrength;
    let mut poller = ClientRegistryPoller::new(&cfg).unwrap();

    poller.poll_cycle(&mut bus, &mut RecordingSink::new());
    let uptime = poller.sensor(poller.find("uptime").unwrap()).unwrap();
    assert!(matches!(
        uptime.last_error(),
        Some(TransactionError::Malformed(_))
    ));
    assert_eq!(uptime.last_known_value(), None);
}

// ── Peer restart ──────────────────────────────────────────────

#[test]
fn uptime_going_backwards_reports_a_restart() {
    let (bus, _) = peer();
    let mut bus = RecordingBus::new(bus);
    let mut poller = ClientRegistryPoller::new(&peer_config()).unwrap();
    let mut sink = RecordingSink::new();
    poller.poll_cycle(&mut bus, &mut sink);
    sink.clear();

    // The peer reboots: a fresh service instance with a small uptime.
    let (rebooted, _) = peer_booted_at(3);
    bus.inner = rebooted;

    poller.poll_cycle(&mut bus, &mut sink);

    let uptime_id = poller.find("uptime").unwrap();
    let uptime = poller.sensor(uptime_id).unwrap();
    assert_eq!(uptime.restarts(), 1);
    assert_eq!(uptime.last_known_value(), Some(Reading::Counter(3)));

    let restart_at = sink
        .events
        .iter()
        .position(|e| matches!(e, RegistryEvent::PeerRestarted { previous: 1234, current: 3, .. }))
        .expect("restart event");
    let update_at = sink
        .events
        .iter()
        .position(|e| matches!(e, RegistryEvent::SensorUpdated { id, .. } if *id == uptime_id))
        .expect("uptime update");
    assert!(restart_at < update_at);
}

#[test]
fn service_holds_its_own_uptime_monotonic() {
    let (bus, handles) = peer();
    let mut bus = RecordingBus::new(bus);
    handles.uptime.set(10);
    bus.peer().update();
    assert_eq!(
        bus.peer().value(RegistryKey(0x11)),
        Some(Reading::Counter(1234))
    );
}

// ── Duplicate keys ────────────────────────────────────────────

#[test]
fn duplicate_key_is_fatal_on_the_slave() {
    let result = ServiceBuilder::new(PEER, KeyWidth::Bits8)
        .sensor("a", RegistryKey(0x10), DecodeKind::Counter, || None)
        .sensor("b", RegistryKey(0x10), DecodeKind::Counter, || None)
        .build();
    assert!(matches!(result, Err(ConfigError::DuplicateKey(0x10))));
}

#[test]
fn duplicate_key_is_fatal_on_the_master() {
    let doc = r#"{ "peers": [ { "name": "p", "address": 66, "sensors": [
        { "name": "a", "key": 16, "kind": "counter" },
        { "name": "b", "key": 16, "kind": "measurement" }
    ] } ] }"#;
    assert!(matches!(
        config::load(doc),
        Err(ConfigError::DuplicateKey(0x10))
    ));
}

// ── 16-bit keys ───────────────────────────────────────────────

#[test]
fn sixteen_bit_keys_round_trip() {
    let mut svc = ServiceBuilder::new(0x43, KeyWidth::Bits16)
        .sensor("temp", RegistryKey(0x0110), DecodeKind::MeasurementI16, || {
            Some(Reading::Measurement(-12.0))
        })
        .build()
        .unwrap();
    svc.update();
    let mut loopback = i2c_registry::adapters::loopback::LoopbackBus::new();
    loopback.attach(svc);
    let mut bus = RecordingBus::new(loopback);

    let doc = r#"{ "peers": [ { "name": "wide", "address": 67, "key_width": "16bit",
        "sensors": [ { "name": "temp", "key": 272, "kind": "measurement_i16" } ] } ] }"#;
    let cfg = config::load(doc).unwrap();
    let mut poller = ClientRegistryPoller::new(&cfg.peers[0]).unwrap();
    poller.poll_cycle(&mut bus, &mut RecordingSink::new());

    assert_eq!(bus.read_requests(), vec![vec![0x01, 0x10]]);
    let temp = poller.sensor(poller.find("temp").unwrap()).unwrap();
    assert_eq!(temp.last_known_value(), Some(Reading::Measurement(-12.0)));
}
