//! Caretaker device: the hexagonal core.
//!
//! [`CaretakerDevice`] owns the connectivity FSM and its context. Boards
//! construct it once with their ports and device adapter, then call
//! [`update`](CaretakerDevice::update) from the main loop as often as
//! possible. `update` never blocks on the network; every wait is a
//! deadline checked on the next call.
//!
//! ```text
//!  ModulePort ◀──▶ ┌──────────────────────────┐ ──▶ EventSink
//!  EepromPort ◀──▶ │     CaretakerDevice       │
//!   BoardPort ◀──▶ │  FSM · messenger · blink  │ ◀── DeviceAdapter
//!    TimePort ───▶ └──────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::fsm::context::{DeviceContext, ServerAddress};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::identity::DeviceIdentity;
use crate::messenger::Command;

use super::descriptor::{DeviceAdapter, HandlerTable};
use super::events::DeviceEvent;
use super::ports::{BoardPort, ModulePort, Platform, Ports, TimePort};

pub struct CaretakerDevice<P: Platform, A: DeviceAdapter> {
    fsm: Fsm<P, A>,
    ctx: DeviceContext<P, A>,
}

impl<P: Platform, A: DeviceAdapter> CaretakerDevice<P, A> {
    /// Validate the configuration, collect the adapter's message
    /// handlers and enter `Init`. The LED starts dark.
    pub fn init(config: DeviceConfig, ports: Ports<P>, mut adapter: A) -> Result<Self> {
        config.validate()?;

        let mut handlers = HandlerTable::new();
        adapter.register_message_handlers(&mut handlers)?;

        let mut ctx = DeviceContext::new(config, ports, adapter, handlers);
        ctx.now_ms = ctx.ports.clock.now_ms();
        if ctx.descriptor.led_pin.is_some() {
            ctx.ports.board.set_led(false);
        }

        let mut fsm = Fsm::new(build_state_table(), StateId::Init);
        fsm.start(&mut ctx);

        info!(
            "{} '{}' started, {} message handler(s)",
            ctx.descriptor.device_type,
            ctx.descriptor.description,
            ctx.handlers.len()
        );
        ctx.emit(DeviceEvent::Started(fsm.current_state()));
        Ok(Self { fsm, ctx })
    }

    /// One cooperative step: advance the blink pattern, then run at most
    /// one state's work.
    pub fn update(&mut self) {
        self.ctx.now_ms = self.ctx.ports.clock.now_ms();

        if let Some(level) = self.ctx.blink.tick(self.ctx.now_ms) {
            if self.ctx.descriptor.led_pin.is_some() {
                self.ctx.ports.board.set_led(level);
            }
        }

        let from = self.fsm.current_state();
        self.fsm.tick(&mut self.ctx);
        let to = self.fsm.current_state();
        if from != to {
            self.ctx.emit(DeviceEvent::StateChanged { from, to });
        }
    }

    pub fn is_operational(&self) -> bool {
        self.fsm.current_state() == StateId::Operational
    }

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Identity loaded at boot or received while pairing.
    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.ctx.identity.as_ref()
    }

    /// Address from the last broadcast response.
    pub fn server_address(&self) -> Option<&ServerAddress> {
        self.ctx.server_address.as_ref()
    }

    /// Registration requests sent since power-up.
    pub fn registration_attempts(&self) -> u32 {
        self.ctx.registration_attempts
    }

    /// Clock reading of the last ping response, if any.
    pub fn last_pong_ms(&self) -> Option<u64> {
        self.ctx.last_pong_ms
    }

    /// Publish an application message (state change notification).
    pub fn send(&mut self, command: &Command) -> Result<()> {
        if !self.is_operational() {
            return Err(Error::NotOperational);
        }
        self.ctx.send_command(command)?;
        Ok(())
    }

    /// Discard pending module input.
    pub fn flush_module(&mut self) {
        self.ctx.ports.module.flush();
    }

    /// Let the module sleep after `secs` idle seconds.
    pub fn module_sleep_after(&mut self, secs: u16) -> Result<()> {
        if !self.ctx.config.features.low_power {
            return Err(Error::FeatureDisabled("low_power"));
        }
        self.ctx.ports.module.sleep_after(secs).map_err(|e| {
            warn!("module sleep setup failed: {}", e);
            Error::from(e)
        })
    }

    pub fn module_wakeup(&mut self) -> Result<()> {
        if !self.ctx.config.features.low_power {
            return Err(Error::FeatureDisabled("low_power"));
        }
        self.ctx.ports.module.wake()?;
        Ok(())
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.ctx.config
    }

    pub fn adapter(&self) -> &A {
        &self.ctx.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.ctx.adapter
    }

    pub fn ports(&self) -> &Ports<P> {
        &self.ctx.ports
    }

    pub fn ports_mut(&mut self) -> &mut Ports<P> {
        &mut self.ctx.ports
    }
}
