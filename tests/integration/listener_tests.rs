//! Integration tests for the leased listener registry over a radio link.

use caretaker::app::ports::NodeAddress;
use caretaker::listener::{AddOutcome, LEASE_MS, ListenerManager};
use caretaker::messenger::radio::{MessageType, RadioMessage, command, header};

use crate::mock_hw::MockRadio;

const KITCHEN: NodeAddress = NodeAddress::new(0x0013_a200_40a1_b2c3, 0x7e01);
const PORCH: NodeAddress = NodeAddress::new(0x0013_a200_40a1_b2c4, 0x7e02);
const GARAGE: NodeAddress = NodeAddress::new(0x0013_a200_40a1_b2c5, 0x7e03);

/// Route a received frame the way a radio endpoint's main loop does.
fn deliver<const N: usize>(
    reg: &mut ListenerManager<N>,
    radio: &mut MockRadio,
    frame: &[u8],
    from: NodeAddress,
    now: u64,
) -> bool {
    let msg = RadioMessage::parse(frame).unwrap();
    msg.kind == MessageType::Request && reg.process_message(radio, msg.command, from, now)
}

#[test]
fn subscribe_notify_unsubscribe() {
    let mut radio = MockRadio::default();
    let mut reg = ListenerManager::<4>::new();
    let add = [header(MessageType::Request, command::ADD_LISTENER)];
    let remove = [header(MessageType::Request, command::REMOVE_LISTENER)];

    assert!(deliver(&mut reg, &mut radio, &add, KITCHEN, 0));
    assert!(deliver(&mut reg, &mut radio, &add, PORCH, 0));
    assert_eq!(radio.sent.len(), 2);
    let ack = RadioMessage::parse(&radio.sent[0].1).unwrap();
    assert_eq!(ack.kind, MessageType::Response);
    assert_eq!(ack.command, command::ADD_LISTENER);

    radio.sent.clear();
    let state = [header(MessageType::Notify, command::SWITCH_READ), 1];
    assert_eq!(reg.notify_all(&mut radio, &state), 2);

    assert!(deliver(&mut reg, &mut radio, &remove, KITCHEN, 10));
    radio.sent.clear();
    reg.notify_all(&mut radio, &state);
    assert_eq!(radio.sent, vec![(PORCH, state.to_vec())]);
}

#[test]
fn non_registry_requests_are_left_to_the_device() {
    let mut radio = MockRadio::default();
    let mut reg = ListenerManager::<4>::new();
    let write = [header(MessageType::Request, command::SWITCH_WRITE), 1];
    assert!(!deliver(&mut reg, &mut radio, &write, KITCHEN, 0));
    assert!(radio.sent.is_empty());
    assert!(reg.is_empty());
}

#[test]
fn lease_lapses_after_ten_minutes_without_refresh() {
    let mut radio = MockRadio::default();
    let mut reg = ListenerManager::<4>::new();
    reg.add_listener(&mut radio, KITCHEN, 0);
    reg.add_listener(&mut radio, PORCH, 0);

    // Porch renews halfway through.
    assert_eq!(
        reg.add_listener(&mut radio, PORCH, LEASE_MS / 2),
        AddOutcome::Refreshed
    );

    assert_eq!(reg.check_leases(LEASE_MS), 0);
    assert_eq!(reg.check_leases(LEASE_MS + 1), 1);
    assert_eq!(reg.listener_addresses().collect::<Vec<_>>(), vec![PORCH]);

    assert_eq!(reg.check_leases(LEASE_MS / 2 + LEASE_MS + 1), 1);
    assert!(reg.is_empty());
}

#[test]
fn lapsed_listener_gets_no_notifications() {
    let mut radio = MockRadio::default();
    let mut reg = ListenerManager::<4>::new();
    reg.add_listener(&mut radio, KITCHEN, 0);
    reg.add_listener(&mut radio, PORCH, 0);
    reg.add_listener(&mut radio, PORCH, LEASE_MS / 2);
    radio.sent.clear();

    assert_eq!(reg.check_leases(LEASE_MS + 1), 1);
    let state = [header(MessageType::Notify, command::SWITCH_READ), 0];
    assert_eq!(reg.notify_all(&mut radio, &state), 1);
    assert_eq!(radio.sent, vec![(PORCH, state.to_vec())]);
    assert!(radio.sent.iter().all(|(to, _)| *to != KITCHEN));
}

#[test]
fn full_table_admits_newcomer_after_expiry() {
    let mut radio = MockRadio::default();
    let mut reg = ListenerManager::<2>::with_lease(1_000);
    reg.add_listener(&mut radio, KITCHEN, 0);
    reg.add_listener(&mut radio, PORCH, 500);
    assert_eq!(reg.add_listener(&mut radio, GARAGE, 600), AddOutcome::Dropped);

    reg.check_leases(1_001);
    assert_eq!(reg.add_listener(&mut radio, GARAGE, 1_001), AddOutcome::Added);
    assert_eq!(reg.len(), 2);
    assert_eq!(reg.lease_expiry(GARAGE), Some(2_001));
}

#[test]
fn unreachable_listener_does_not_block_others() {
    let mut radio = MockRadio::default();
    let mut reg = ListenerManager::<3>::new();
    reg.add_listener(&mut radio, KITCHEN, 0);
    reg.add_listener(&mut radio, PORCH, 0);
    reg.add_listener(&mut radio, GARAGE, 0);
    radio.sent.clear();

    radio.unreachable = Some(PORCH.addr64);
    let frame = [header(MessageType::Notify, command::SENSOR_READ), 0x12, 0x34];
    assert_eq!(reg.notify_all(&mut radio, &frame), 2);
    // Delivery failures do not cancel the subscription.
    assert_eq!(reg.len(), 3);
}
