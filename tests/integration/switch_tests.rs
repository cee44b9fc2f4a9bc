//! Remote switch commands: write, then confirm on the next poll.

use super::mock_bus::{PeerHandles, RecordingBus, RecordingSink, peer, peer_config};

use i2c_registry::error::{BusError, SwitchError};
use i2c_registry::{ClientRegistryPoller, RegistryEvent, SwitchCommand};

fn setup() -> (ClientRegistryPoller, RecordingBus, RecordingSink, PeerHandles) {
    let (bus, handles) = peer();
    let mut poller = ClientRegistryPoller::new(&peer_config()).unwrap();
    let mut bus = RecordingBus::new(bus);
    let mut sink = RecordingSink::new();
    // Learn the current switch states first.
    poller.poll_cycle(&mut bus, &mut sink);
    bus.log.clear();
    sink.clear();
    (poller, bus, sink, handles)
}

// ── Command-pair switch ───────────────────────────────────────

#[test]
fn turn_on_writes_the_on_key_and_next_poll_confirms() {
    let (mut poller, mut bus, mut sink, handles) = setup();
    let fan = poller.find("fan").unwrap();

    poller
        .request_switch(fan, SwitchCommand::TurnOn, &mut bus)
        .unwrap();

    assert_eq!(bus.writes(), vec![vec![0x20, 0x01]]);
    assert!(handles.fan.get(), "peer relay should be on");
    let binding = poller.switch(fan).unwrap();
    assert_eq!(binding.pending_state(), Some(true));
    assert_eq!(binding.confirmed_state(), Some(false));

    poller.poll_cycle(&mut bus, &mut sink);

    let binding = poller.switch(fan).unwrap();
    assert_eq!(binding.confirmed_state(), Some(true));
    assert_eq!(binding.pending_state(), None);
    assert!(sink.events.iter().any(|e| matches!(
        e,
        RegistryEvent::SwitchConfirmed { id, on: true, .. } if *id == fan
    )));
}

#[test]
fn turn_on_twice_is_idempotent() {
    let (mut poller, mut bus, mut sink, handles) = setup();
    let fan = poller.find("fan").unwrap();

    poller.request_switch(fan, SwitchCommand::TurnOn, &mut bus).unwrap();
    poller.poll_cycle(&mut bus, &mut sink);
    poller.request_switch(fan, SwitchCommand::TurnOn, &mut bus).unwrap();
    poller.poll_cycle(&mut bus, &mut sink);

    assert!(handles.fan.get());
    assert_eq!(poller.switch(fan).unwrap().confirmed_state(), Some(true));
}

#[test]
fn toggle_on_a_command_pair_picks_the_opposite_key() {
    let (mut poller, mut bus, mut sink, handles) = setup();
    let fan = poller.find("fan").unwrap();

    poller.request_switch(fan, SwitchCommand::Toggle, &mut bus).unwrap();
    poller.poll_cycle(&mut bus, &mut sink);
    poller.request_switch(fan, SwitchCommand::Toggle, &mut bus).unwrap();

    assert_eq!(bus.writes(), vec![vec![0x20, 0x01], vec![0x22, 0x01]]);
    assert!(!handles.fan.get());
}

#[test]
fn command_pair_write_is_retried() {
    let (mut poller, mut bus, _sink, handles) = setup();
    let fan = poller.find("fan").unwrap();

    bus.inner.fail_next(BusError::Timeout);
    poller
        .request_switch(fan, SwitchCommand::TurnOn, &mut bus)
        .unwrap();

    assert_eq!(bus.writes().len(), 2);
    assert!(handles.fan.get());
}

#[test]
fn command_pair_gives_up_after_its_retries() {
    let (mut poller, mut bus, _sink, handles) = setup();
    let fan = poller.find("fan").unwrap();
    bus.inner.set_offline(super::mock_bus::peer_address(), true);

    let result = poller.request_switch(fan, SwitchCommand::TurnOn, &mut bus);

    assert_eq!(result, Err(SwitchError::Bus(BusError::Timeout)));
    // One attempt plus `write_retries` (2).
    assert_eq!(bus.writes().len(), 3);
    assert!(!handles.fan.get());
    assert_eq!(poller.switch(fan).unwrap().pending_state(), None);
}

// ── Toggle switch ─────────────────────────────────────────────

#[test]
fn two_toggles_return_to_the_original_state() {
    let (mut poller, mut bus, mut sink, handles) = setup();
    let lamp = poller.find("lamp").unwrap();
    let original = poller.switch(lamp).unwrap().confirmed_state();

    poller.request_switch(lamp, SwitchCommand::Toggle, &mut bus).unwrap();
    poller.poll_cycle(&mut bus, &mut sink);
    assert_eq!(poller.switch(lamp).unwrap().confirmed_state(), Some(true));

    poller.request_switch(lamp, SwitchCommand::Toggle, &mut bus).unwrap();
    poller.poll_cycle(&mut bus, &mut sink);

    assert_eq!(poller.switch(lamp).unwrap().confirmed_state(), original);
    assert!(!handles.lamp.get());
    assert_eq!(bus.writes(), vec![vec![0x30, 0x01], vec![0x30, 0x01]]);
}

#[test]
fn turn_on_when_already_on_sends_nothing() {
    let (mut poller, mut bus, mut sink, handles) = setup();
    let lamp = poller.find("lamp").unwrap();

    poller.request_switch(lamp, SwitchCommand::TurnOn, &mut bus).unwrap();
    poller.poll_cycle(&mut bus, &mut sink);
    poller.request_switch(lamp, SwitchCommand::TurnOn, &mut bus).unwrap();

    assert_eq!(bus.writes().len(), 1, "second TurnOn must not toggle back");
    assert!(handles.lamp.get());
}

#[test]
fn turn_on_with_unknown_state_is_refused() {
    let (bus, _) = peer();
    let mut bus = RecordingBus::new(bus);
    let mut poller = ClientRegistryPoller::new(&peer_config()).unwrap();
    let lamp = poller.find("lamp").unwrap();

    assert_eq!(
        poller.request_switch(lamp, SwitchCommand::TurnOn, &mut bus),
        Err(SwitchError::StateUnknown)
    );
    assert!(bus.writes().is_empty());
}

#[test]
fn failed_toggle_is_not_retried_and_clears_pending() {
    let (mut poller, mut bus, _sink, handles) = setup();
    let lamp = poller.find("lamp").unwrap();

    bus.inner.fail_next(BusError::NotAcknowledged);
    let result = poller.request_switch(lamp, SwitchCommand::Toggle, &mut bus);

    assert_eq!(result, Err(SwitchError::Bus(BusError::NotAcknowledged)));
    assert_eq!(bus.writes().len(), 1);
    assert!(!handles.lamp.get());
    assert_eq!(poller.switch(lamp).unwrap().pending_state(), None);
    assert!(poller.switch(lamp).unwrap().is_uncertain());
}

#[test]
fn toggle_with_a_lost_ack_does_not_toggle_back() {
    let (mut poller, mut bus, mut sink, handles) = setup();
    let lamp = poller.find("lamp").unwrap();

    bus.lost_acks = 1;
    let result = poller.request_switch(lamp, SwitchCommand::Toggle, &mut bus);
    assert_eq!(result, Err(SwitchError::Bus(BusError::Timeout)));
    assert!(handles.lamp.get(), "the toggle reached the peer");

    assert_eq!(
        poller.request_switch(lamp, SwitchCommand::TurnOn, &mut bus),
        Err(SwitchError::StateUnknown)
    );
    assert!(handles.lamp.get());
    assert_eq!(bus.writes().len(), 1);

    // The next poll reads the real state back; TurnOn is then a no-op.
    bus.peer().update();
    poller.poll_cycle(&mut bus, &mut sink);
    assert_eq!(poller.switch(lamp).unwrap().confirmed_state(), Some(true));
    poller.request_switch(lamp, SwitchCommand::TurnOn, &mut bus).unwrap();
    assert!(handles.lamp.get());
    assert_eq!(bus.writes().len(), 1);
}

// ── Peer-side changes ─────────────────────────────────────────

#[test]
fn local_change_on_the_peer_is_picked_up() {
    let (mut poller, mut bus, mut sink, handles) = setup();
    let fan = poller.find("fan").unwrap();

    handles.fan.set(true);
    bus.peer().update();
    poller.poll_cycle(&mut bus, &mut sink);

    assert_eq!(poller.switch(fan).unwrap().confirmed_state(), Some(true));
}

#[test]
fn sensor_is_not_a_switch() {
    let (mut poller, mut bus, _sink, _) = setup();
    let rssi = poller.find("wifi signal").unwrap();
    assert_eq!(
        poller.request_switch(rssi, SwitchCommand::TurnOn, &mut bus),
        Err(SwitchError::NotASwitch)
    );
}
