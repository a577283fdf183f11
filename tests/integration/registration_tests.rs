//! Integration tests for server discovery, registration and the
//! operational message loop.

use caretaker::CaretakerDevice;
use caretaker::app::events::DeviceEvent;
use caretaker::config::DeviceConfig;
use caretaker::error::Error;
use caretaker::fsm::StateId;
use caretaker::identity::DeviceIdentity;
use caretaker::messenger::{Command, opcode};

use crate::mock_hw::{Dimmer, RnxvSim, SimPlatform, sim_ports};

type Device = CaretakerDevice<SimPlatform, Dimmer>;

const UUID: &str = "0b7e5c1a-2f44-4d0e-9a51-6c3b8e2d7f10";

fn provisioned_with(config: DeviceConfig) -> Device {
    let mut ports = sim_ports();
    DeviceIdentity::new(UUID, "Porch", "HomeNet", "secret99")
        .store(&mut ports.storage)
        .unwrap();
    CaretakerDevice::init(config, ports, Dimmer::default()).unwrap()
}

fn step(d: &mut Device, now: u64) {
    d.ports().clock.set(now);
    d.update();
}

fn sim(d: &mut Device) -> &mut RnxvSim {
    d.ports_mut().module.serial_mut()
}

/// Boot, join and answer the broadcast. Returns at
/// `WaitForRegisterResponse` with the data stream cleared.
fn discover(d: &mut Device) {
    step(d, 0); // Init -> ConnectNetwork
    step(d, 1); // -> WaitForBroadcastResponse
    sim(d).receive(b"*SERVER*\n10.0.0.2\r\n");
    step(d, 2); // -> RegisterWithServer
    assert_eq!(d.server_address().map(|s| s.as_str()), Some("10.0.0.2"));
    step(d, 3); // -> WaitForRegisterResponse
    assert_eq!(d.state(), StateId::WaitForRegisterResponse);
}

fn operational(d: &mut Device) {
    discover(d);
    sim(d).receive(b"2;");
    step(d, 10);
    assert!(d.is_operational());
    sim(d).take_data();
}

#[test]
fn discovery_pins_server_and_returns_to_data_mode() {
    let mut d = provisioned_with(DeviceConfig::default());
    discover(&mut d);
    let m = sim(&mut d);
    assert!(m.has_command("set i h 10.0.0.2"));
    assert!(m.has_command("set b i 0"));
    assert!(!m.in_command_mode());
    assert_eq!(
        m.take_data(),
        format!("1,{UUID},Dimmer,Porch,Hall dimmer,1,255;")
    );
}

#[test]
fn silent_broadcast_keeps_listening() {
    let mut d = provisioned_with(DeviceConfig::default());
    step(&mut d, 0);
    step(&mut d, 1);
    sim(&mut d).receive(b"*SERVER*\n10.0.");
    step(&mut d, 2);
    // Address line never completes.
    step(&mut d, 2 + 1_001);
    assert_eq!(d.state(), StateId::WaitForBroadcastResponse);
    assert!(d.server_address().is_none());

    sim(&mut d).receive(b"*SERVER*\n10.0.0.9\n");
    step(&mut d, 2_000);
    assert_eq!(d.state(), StateId::RegisterWithServer);
    assert_eq!(d.server_address().unwrap().as_str(), "10.0.0.9");
}

#[test]
fn registration_retries_every_timeout() {
    let mut d = provisioned_with(DeviceConfig::default());
    discover(&mut d);
    sim(&mut d).take_data();

    let mut t = 3;
    for attempt in 2..=4 {
        t += 20_001;
        step(&mut d, t);
        assert_eq!(d.state(), StateId::RegisterWithServer);
        t += 1;
        step(&mut d, t);
        assert_eq!(d.registration_attempts(), attempt);
        assert!(sim(&mut d).take_data().starts_with("1,"));
    }
    let sent = d
        .ports()
        .sink
        .events
        .iter()
        .filter(|e| matches!(e, DeviceEvent::RegistrationSent { .. }))
        .count();
    assert_eq!(sent, 4);
}

#[test]
fn operational_announces_state_then_pings_on_schedule() {
    let mut config = DeviceConfig::default();
    config.ping_interval_ms = 60_000;
    let mut d = provisioned_with(config);
    discover(&mut d);
    sim(&mut d).take_data();
    sim(&mut d).receive(b"2;");
    step(&mut d, 10);
    assert_eq!(d.state(), StateId::Operational);
    assert_eq!(d.adapter().announced, 1);
    assert!(d.ports().sink.events.contains(&DeviceEvent::Registered));

    step(&mut d, 11);
    assert_eq!(sim(&mut d).take_data(), "13,0;3;");

    step(&mut d, 60_011);
    assert_eq!(sim(&mut d).take_data(), "");
    step(&mut d, 60_012);
    assert_eq!(sim(&mut d).take_data(), "3;");
}

#[test]
fn operational_dispatches_adapter_commands() {
    let mut d = provisioned_with(DeviceConfig::default());
    operational(&mut d);

    sim(&mut d).receive(b"11,1,128;12;");
    step(&mut d, 20);
    assert_eq!(d.adapter().level, 128);
    assert!(sim(&mut d).take_data().ends_with("13,128;13,128;"));

    // Unknown opcode is ignored; malformed id is reported.
    sim(&mut d).receive(b"42,1;x;4;");
    step(&mut d, 30);
    assert_eq!(d.last_pong_ms(), Some(30));
    assert!(
        d.ports()
            .sink
            .events
            .iter()
            .any(|e| matches!(e, DeviceEvent::MalformedMessage(_)))
    );
}

#[test]
fn application_send_gated_on_operational() {
    let mut d = provisioned_with(DeviceConfig::default());
    let report = Command::new(opcode::PWM_STATE).arg(7);
    assert_eq!(d.send(&report), Err(Error::NotOperational));

    operational(&mut d);
    d.send(&report).unwrap();
    assert_eq!(sim(&mut d).take_data(), "13,7;");
}

#[test]
fn low_power_controls_module_sleep() {
    let mut config = DeviceConfig::default();
    config.features.low_power = true;
    let mut d = provisioned_with(config);
    operational(&mut d);

    d.module_sleep_after(30).unwrap();
    assert!(sim(&mut d).has_command("set s s 30"));
    d.module_wakeup().unwrap();
    assert!(sim(&mut d).has_command("set s s 0"));
    assert!(!sim(&mut d).in_command_mode());
}

#[test]
fn low_power_disabled_rejects_sleep() {
    let mut d = provisioned_with(DeviceConfig::default());
    assert!(matches!(
        d.module_sleep_after(30),
        Err(Error::FeatureDisabled(_))
    ));
}
