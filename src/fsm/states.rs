//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers, instantiated for the
//! board's [`Platform`] and the device's [`DeviceAdapter`]. No closures,
//! no dynamic dispatch.
//!
//! ```text
//!  INIT ──[held]──▶ FACTORY_RESET_CONFIRM ──[3 s]──▶ FACTORY_RESET ──▶ INIT
//!   │  ▲                    │ [released]
//!   │  └────────────────────┘
//!   │
//!   ├─[no identity]──▶ NEW_DEVICE ──▶ WAIT_FOR_DISCOVERY ──[*OPEN*]──▶ WAIT_FOR_SEND_INFO_ACK
//!   │                      ▲                                                  │ [*CLOS*]
//!   │                CONFIG_TIMEOUT ◀──[late]── WAIT_FOR_CONFIG ◀─────────────┘
//!   │                      ▲                        │ [*OPEN*]
//!   │                      └──[bad input]── CONFIGURE_DEVICE
//!   │                                               │ [4 lines + *CLOS*]
//!   └─[identity]──▶ CONNECT_NETWORK ◀───────────────┘
//!                        │
//!                        ▼
//!           WAIT_FOR_BROADCAST_RESPONSE ──[*SERVER*]──▶ REGISTER_WITH_SERVER ◀──[20 s]──┐
//!                                                               │                     │
//!                                                               ▼                     │
//!                                                   WAIT_FOR_REGISTER_RESPONSE ───────┘
//!                                                               │ [response]
//!                                                               ▼
//!                                                          OPERATIONAL
//! ```
//!
//! Module failures never leave a state: the step runs again next tick.

use log::{debug, info, warn};

use super::context::{DeviceContext, ServerAddress};
use super::{StateDescriptor, StateId};
use crate::app::descriptor::DeviceAdapter;
use crate::app::events::DeviceEvent;
use crate::app::ports::{ModulePort, Platform, TransportError};
use crate::drivers::blink::BlinkPattern;
use crate::identity::{self, DeviceIdentity};
use crate::messenger::{Command, opcode};
use crate::transport::commands;
use crate::transport::scanner::{CLOSE_MARKER, OPEN_MARKER, SERVER_MARKER};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the state table. Called once at startup.
pub fn build_state_table<P: Platform, A: DeviceAdapter>() -> [StateDescriptor<P, A>; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Init,
            name: "Init",
            on_enter: None,
            on_exit: None,
            on_update: init_update,
        },
        StateDescriptor {
            id: StateId::FactoryResetConfirm,
            name: "FactoryResetConfirm",
            on_enter: Some(factory_reset_confirm_enter),
            on_exit: None,
            on_update: factory_reset_confirm_update,
        },
        StateDescriptor {
            id: StateId::FactoryReset,
            name: "FactoryReset",
            on_enter: None,
            on_exit: None,
            on_update: factory_reset_update,
        },
        StateDescriptor {
            id: StateId::NewDevice,
            name: "NewDevice",
            on_enter: Some(new_device_enter),
            on_exit: None,
            on_update: new_device_update,
        },
        StateDescriptor {
            id: StateId::WaitForDiscovery,
            name: "WaitForDiscovery",
            on_enter: Some(wait_for_discovery_enter),
            on_exit: None,
            on_update: wait_for_discovery_update,
        },
        StateDescriptor {
            id: StateId::WaitForSendInfoAck,
            name: "WaitForSendInfoAck",
            on_enter: Some(wait_for_send_info_ack_enter),
            on_exit: None,
            on_update: wait_for_send_info_ack_update,
        },
        StateDescriptor {
            id: StateId::WaitForConfig,
            name: "WaitForConfig",
            on_enter: Some(wait_for_config_enter),
            on_exit: None,
            on_update: wait_for_config_update,
        },
        StateDescriptor {
            id: StateId::ConfigTimeout,
            name: "ConfigTimeout",
            on_enter: Some(config_timeout_enter),
            on_exit: None,
            on_update: config_timeout_update,
        },
        StateDescriptor {
            id: StateId::ConfigureDevice,
            name: "ConfigureDevice",
            on_enter: Some(configure_device_enter),
            on_exit: Some(configure_device_exit),
            on_update: configure_device_update,
        },
        StateDescriptor {
            id: StateId::ConnectNetwork,
            name: "ConnectNetwork",
            on_enter: Some(connect_network_enter),
            on_exit: None,
            on_update: connect_network_update,
        },
        StateDescriptor {
            id: StateId::WaitForBroadcastResponse,
            name: "WaitForBroadcastResponse",
            on_enter: Some(wait_for_broadcast_response_enter),
            on_exit: None,
            on_update: wait_for_broadcast_response_update,
        },
        StateDescriptor {
            id: StateId::RegisterWithServer,
            name: "RegisterWithServer",
            on_enter: None,
            on_exit: None,
            on_update: register_with_server_update,
        },
        StateDescriptor {
            id: StateId::WaitForRegisterResponse,
            name: "WaitForRegisterResponse",
            on_enter: Some(wait_for_register_response_enter),
            on_exit: None,
            on_update: wait_for_register_response_update,
        },
        StateDescriptor {
            id: StateId::Operational,
            name: "Operational",
            on_enter: Some(operational_enter),
            on_exit: Some(operational_exit),
            on_update: operational_update,
        },
    ]
}

/// Log and report a module failure; the caller stays in its state.
fn module_failed<P: Platform, A: DeviceAdapter>(
    ctx: &mut DeviceContext<P, A>,
    state: StateId,
    error: TransportError,
) -> Option<StateId> {
    warn!("{:?}: module command failed ({}), retrying", state, error);
    ctx.emit(DeviceEvent::ModuleError { state, error });
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  INIT: sample the button, then load the identity
// ═══════════════════════════════════════════════════════════════════════════

fn init_update<P: Platform, A: DeviceAdapter>(ctx: &mut DeviceContext<P, A>) -> Option<StateId> {
    let auto_config = ctx.config.features.auto_config;

    if auto_config {
        let pressed = ctx.button_pressed();
        if ctx.reset_latch {
            // Still held from the reset that just happened.
            if !pressed {
                ctx.reset_latch = false;
            }
        } else if pressed {
            return Some(StateId::FactoryResetConfirm);
        }
    }

    match DeviceIdentity::load(&ctx.ports.storage) {
        Ok(Some(identity)) => {
            info!("INIT: valid identity for '{}'", identity.name);
            if ctx.config.features.debug_logging {
                debug!(
                    "INIT: uuid={} name={} type={} ssid={} phrase=****",
                    identity.uuid, identity.name, ctx.descriptor.device_type, identity.ssid
                );
            }
            ctx.identity = Some(identity);
            Some(StateId::ConnectNetwork)
        }
        Ok(None) if auto_config => Some(StateId::NewDevice),
        Ok(None) => {
            if ctx.ticks_in_state <= 1 {
                warn!("INIT: no identity and pairing disabled, waiting for external provisioning");
            }
            None
        }
        Err(e) => {
            warn!("INIT: identity read failed: {}", e);
            ctx.emit(DeviceEvent::StorageFailed(e));
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  FACTORY RESET: confirm by holding, then erase
// ═══════════════════════════════════════════════════════════════════════════

fn factory_reset_confirm_enter<P: Platform, A: DeviceAdapter>(ctx: &mut DeviceContext<P, A>) {
    ctx.set_blink(Some(BlinkPattern::FactoryReset));
    ctx.arm_deadline(ctx.config.factory_reset_confirm_ms);
    info!(
        "FACTORY_RESET_CONFIRM: keep the button held for {} ms",
        ctx.config.factory_reset_confirm_ms
    );
}

fn factory_reset_confirm_update<P: Platform, A: DeviceAdapter>(
    ctx: &mut DeviceContext<P, A>,
) -> Option<StateId> {
    if !ctx.button_pressed() {
        info!("FACTORY_RESET_CONFIRM: released, cancelled");
        ctx.set_blink(None);
        return Some(StateId::Init);
    }
    if ctx.deadline_passed() {
        return Some(StateId::FactoryReset);
    }
    None
}

fn factory_reset_update<P: Platform, A: DeviceAdapter>(
    ctx: &mut DeviceContext<P, A>,
) -> Option<StateId> {
    if let Err(e) = identity::erase(&mut ctx.ports.storage) {
        warn!("FACTORY_RESET: erase failed: {}", e);
        ctx.emit(DeviceEvent::StorageFailed(e));
        return None;
    }
    ctx.identity = None;
    ctx.reset_latch = true;
    ctx.set_blink(None);
    ctx.emit(DeviceEvent::FactoryResetPerformed);
    Some(StateId::Init)
}

// ═══════════════════════════════════════════════════════════════════════════
//  PAIRING: access point, self-description, configuration lines
// ═══════════════════════════════════════════════════════════════════════════

fn new_device_enter<P: Platform, A: DeviceAdapter>(ctx: &mut DeviceContext<P, A>) {
    ctx.set_blink(Some(BlinkPattern::NewDevice));
    info!("NEW_DEVICE: opening pairing access point");
}

fn new_device_update<P: Platform, A: DeviceAdapter>(ctx: &mut DeviceContext<P, A>) -> Option<StateId> {
    let result = (|| {
        let module = &mut ctx.ports.module;
        commands::prepare(module, ctx.config.module_baud_rate)?;
        let mac = commands::read_hardware_address(module)?;
        let ssid = commands::pairing_ssid(&ctx.config.pairing_ssid_prefix, &mac);
        commands::configure_access_point(module, &ssid, &ctx.config)?;
        commands::commit(module)?;
        Ok::<_, TransportError>((mac, ssid))
    })();

    match result {
        Ok((mac, ssid)) => {
            info!("NEW_DEVICE: access point '{}' up (mac {})", ssid, mac);
            ctx.hardware_address = mac;
            ctx.emit(DeviceEvent::PairingStarted);
            Some(StateId::WaitForDiscovery)
        }
        Err(e) => module_failed(ctx, StateId::NewDevice, e),
    }
}

fn wait_for_discovery_enter<P: Platform, A: DeviceAdapter>(ctx: &mut DeviceContext<P, A>) {
    ctx.watch_for(OPEN_MARKER);
}

fn wait_for_discovery_update<P: Platform, A: DeviceAdapter>(
    ctx: &mut DeviceContext<P, A>,
) -> Option<StateId> {
    if !ctx.scan_for_marker() {
        return None;
    }
    ctx.set_blink(Some(BlinkPattern::Discovered));

    let info = format!(
        "\r\n{}\r\n{}\r\n{}\r\n",
        ctx.hardware_address, ctx.descriptor.device_type, ctx.descriptor.description
    );
    if let Err(e) = ctx.ports.module.write(info.as_bytes()) {
        // The app reconnects when it gets no answer.
        return module_failed(ctx, StateId::WaitForDiscovery, e);
    }
    ctx.emit(DeviceEvent::PairingAppConnected);
    Some(StateId::WaitForSendInfoAck)
}

fn wait_for_send_info_ack_enter<P: Platform, A: DeviceAdapter>(ctx: &mut DeviceContext<P, A>) {
    ctx.watch_for(CLOSE_MARKER);
}

fn wait_for_send_info_ack_update<P: Platform, A: DeviceAdapter>(
    ctx: &mut DeviceContext<P, A>,
) -> Option<StateId> {
    ctx.scan_for_marker().then_some(StateId::WaitForConfig)
}

fn wait_for_config_enter<P: Platform, A: DeviceAdapter>(ctx: &mut DeviceContext<P, A>) {
    ctx.watch_for(OPEN_MARKER);
    ctx.arm_deadline(ctx.config.config_timeout_ms);
}

fn wait_for_config_update<P: Platform, A: DeviceAdapter>(
    ctx: &mut DeviceContext<P, A>,
) -> Option<StateId> {
    if ctx.scan_for_marker() {
        return Some(StateId::ConfigureDevice);
    }
    ctx.deadline_passed().then_some(StateId::ConfigTimeout)
}

fn config_timeout_enter<P: Platform, A: DeviceAdapter>(ctx: &mut DeviceContext<P, A>) {
    warn!("CONFIG_TIMEOUT: no usable configuration, restarting pairing");
    ctx.emit(DeviceEvent::ConfigAborted);
}

fn config_timeout_update<P: Platform, A: DeviceAdapter>(
    _ctx: &mut DeviceContext<P, A>,
) -> Option<StateId> {
    Some(StateId::NewDevice)
}

fn configure_device_enter<P: Platform, A: DeviceAdapter>(ctx: &mut DeviceContext<P, A>) {
    ctx.config_fields.clear();
    ctx.watch_for(CLOSE_MARKER);
    ctx.arm_deadline(ctx.config.config_line_timeout_ms);
    // Greeting; the app starts sending once it sees a line.
    if let Err(e) = ctx.ports.module.write(b"\r\n") {
        warn!("CONFIGURE_DEVICE: greeting not sent: {}", e);
    }
}

fn configure_device_exit<P: Platform, A: DeviceAdapter>(ctx: &mut DeviceContext<P, A>) {
    ctx.config_fields.clear();
    ctx.line.clear();
}

fn configure_device_update<P: Platform, A: DeviceAdapter>(
    ctx: &mut DeviceContext<P, A>,
) -> Option<StateId> {
    let expected = ctx.config_fields.capacity();

    for _ in 0..ctx.byte_budget() {
        let Some(byte) = ctx.ports.module.read_byte() else {
            break;
        };

        if ctx.config_fields.len() < expected {
            let Some(line) = ctx.line.push(byte) else {
                continue;
            };
            if line.is_empty() {
                warn!("CONFIGURE_DEVICE: empty field {}", ctx.config_fields.len());
                return Some(StateId::ConfigTimeout);
            }
            let _ = ctx.config_fields.push(line);
            if ctx.config_fields.len() == expected {
                ctx.arm_deadline(ctx.config.config_close_timeout_ms);
            } else {
                ctx.arm_deadline(ctx.config.config_line_timeout_ms);
            }
        } else if ctx.scanner.push(byte) {
            return persist_configuration(ctx);
        }
    }

    if ctx.deadline_passed() {
        warn!(
            "CONFIGURE_DEVICE: timed out with {}/{} fields",
            ctx.config_fields.len(),
            expected
        );
        return Some(StateId::ConfigTimeout);
    }
    None
}

fn persist_configuration<P: Platform, A: DeviceAdapter>(
    ctx: &mut DeviceContext<P, A>,
) -> Option<StateId> {
    let [uuid, name, ssid, phrase] = [0, 1, 2, 3].map(|i| ctx.config_fields[i].as_str());
    let identity = DeviceIdentity::new(uuid, name, ssid, phrase);

    if let Err(e) = identity.store(&mut ctx.ports.storage) {
        warn!("CONFIGURE_DEVICE: could not persist configuration: {}", e);
        ctx.emit(DeviceEvent::StorageFailed(e));
        return Some(StateId::ConfigTimeout);
    }
    if ctx.config.features.debug_logging {
        debug!(
            "CONFIGURE_DEVICE: uuid={} name={} ssid={} phrase=****",
            identity.uuid, identity.name, identity.ssid
        );
    }
    ctx.identity = Some(identity);
    ctx.set_blink(None);
    ctx.emit(DeviceEvent::ConfigReceived);
    Some(StateId::ConnectNetwork)
}

// ═══════════════════════════════════════════════════════════════════════════
//  NETWORK: join, discover the server
// ═══════════════════════════════════════════════════════════════════════════

fn connect_network_enter<P: Platform, A: DeviceAdapter>(ctx: &mut DeviceContext<P, A>) {
    ctx.registered = false;
    ctx.server_address = None;
    if let Some(identity) = &ctx.identity {
        info!("CONNECT_NETWORK: joining '{}'", identity.ssid);
    }
}

fn connect_network_update<P: Platform, A: DeviceAdapter>(
    ctx: &mut DeviceContext<P, A>,
) -> Option<StateId> {
    let Some(identity) = ctx.identity.as_ref() else {
        warn!("CONNECT_NETWORK: no identity loaded");
        return Some(StateId::Init);
    };

    let module = &mut ctx.ports.module;
    let result = commands::prepare(module, ctx.config.module_baud_rate)
        .and_then(|()| commands::configure_station(module, identity, &ctx.config))
        .and_then(|()| commands::commit(module));

    match result {
        Ok(()) => Some(StateId::WaitForBroadcastResponse),
        Err(e) => module_failed(ctx, StateId::ConnectNetwork, e),
    }
}

fn wait_for_broadcast_response_enter<P: Platform, A: DeviceAdapter>(ctx: &mut DeviceContext<P, A>) {
    ctx.watch_for(SERVER_MARKER);
}

fn wait_for_broadcast_response_update<P: Platform, A: DeviceAdapter>(
    ctx: &mut DeviceContext<P, A>,
) -> Option<StateId> {
    if !ctx.marker_seen {
        if !ctx.scan_for_marker() {
            return None;
        }
        ctx.marker_seen = true;
        ctx.line.clear();
        ctx.arm_deadline(ctx.config.server_address_timeout_ms);
    }

    let budget = ctx.byte_budget();
    let module = &mut ctx.ports.module;
    let Some(line) = ctx.line.read(budget, || module.read_byte()) else {
        if ctx.deadline_passed() {
            debug!("WAIT_FOR_BROADCAST_RESPONSE: address line incomplete, waiting for next broadcast");
            ctx.watch_for(SERVER_MARKER);
        }
        return None;
    };

    let address = line.trim();
    if address.is_empty() {
        ctx.watch_for(SERVER_MARKER);
        return None;
    }
    let mut server = ServerAddress::new();
    for ch in address.chars() {
        if server.push(ch).is_err() {
            break;
        }
    }
    info!("WAIT_FOR_BROADCAST_RESPONSE: server at {}", server);

    let module = &mut ctx.ports.module;
    let result = commands::pin_server(module, &server).and_then(|()| module.enter_data_mode());
    if let Err(e) = result {
        ctx.watch_for(SERVER_MARKER);
        return module_failed(ctx, StateId::WaitForBroadcastResponse, e);
    }

    ctx.decoder.reset();
    ctx.server_address = Some(server.clone());
    ctx.emit(DeviceEvent::ServerDiscovered { address: server });
    Some(StateId::RegisterWithServer)
}

// ═══════════════════════════════════════════════════════════════════════════
//  REGISTRATION: request, wait, resend
// ═══════════════════════════════════════════════════════════════════════════

fn register_with_server_update<P: Platform, A: DeviceAdapter>(
    ctx: &mut DeviceContext<P, A>,
) -> Option<StateId> {
    let Some(identity) = ctx.identity.as_ref() else {
        return Some(StateId::Init);
    };

    let mut request = Command::new(opcode::REGISTER_REQUEST)
        .arg(&identity.uuid)
        .arg(ctx.descriptor.device_type)
        .arg(&identity.name)
        .arg(ctx.descriptor.description);
    ctx.adapter.registration_params(&mut request);

    if let Err(e) = ctx.send_command(&request) {
        return module_failed(ctx, StateId::RegisterWithServer, e);
    }
    ctx.registration_attempts += 1;
    let attempt = ctx.registration_attempts;
    info!("REGISTER_WITH_SERVER: request sent (attempt {})", attempt);
    ctx.emit(DeviceEvent::RegistrationSent { attempt });
    Some(StateId::WaitForRegisterResponse)
}

fn wait_for_register_response_enter<P: Platform, A: DeviceAdapter>(ctx: &mut DeviceContext<P, A>) {
    ctx.arm_deadline(ctx.config.registration_timeout_ms);
}

fn wait_for_register_response_update<P: Platform, A: DeviceAdapter>(
    ctx: &mut DeviceContext<P, A>,
) -> Option<StateId> {
    if ctx.deadline_passed() {
        warn!(
            "WAIT_FOR_REGISTER_RESPONSE: no answer within {} ms, resending",
            ctx.config.registration_timeout_ms
        );
        return Some(StateId::RegisterWithServer);
    }
    ctx.pump_messages().then_some(StateId::Operational)
}

// ═══════════════════════════════════════════════════════════════════════════
//  OPERATIONAL: application traffic and keepalive
// ═══════════════════════════════════════════════════════════════════════════

fn operational_enter<P: Platform, A: DeviceAdapter>(ctx: &mut DeviceContext<P, A>) {
    ctx.registered = true;
    // First ping goes out on the next tick.
    ctx.next_ping_ms = ctx.now_ms;
    info!(
        "OPERATIONAL: registered after {} attempt(s)",
        ctx.registration_attempts
    );
    ctx.emit(DeviceEvent::Registered);
    ctx.adapter.on_operational(&mut ctx.outbox);
    ctx.flush_outbox();
}

fn operational_exit<P: Platform, A: DeviceAdapter>(ctx: &mut DeviceContext<P, A>) {
    ctx.registered = false;
}

fn operational_update<P: Platform, A: DeviceAdapter>(
    ctx: &mut DeviceContext<P, A>,
) -> Option<StateId> {
    if ctx.now_ms > ctx.next_ping_ms {
        match ctx.send_command(&Command::new(opcode::PING_REQUEST)) {
            Ok(()) => ctx.emit(DeviceEvent::PingSent),
            Err(e) => warn!("OPERATIONAL: ping not sent: {}", e),
        }
        ctx.next_ping_ms = ctx.now_ms + u64::from(ctx.config.ping_interval_ms);
    }
    if ctx.pump_messages() {
        debug!("OPERATIONAL: duplicate registration response ignored");
    }
    None
}
