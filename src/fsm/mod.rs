//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern ported to Rust:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                    │
//! │  ┌──────────────────┬───────────┬──────────┬─────────────────┐ │
//! │  │ StateId          │ on_enter  │ on_exit  │ on_update       │ │
//! │  ├──────────────────┼───────────┼──────────┼─────────────────┤ │
//! │  │ Init             │ —         │ —        │ fn(ctx)->Option │ │
//! │  │ NewDevice        │ fn(ctx)   │ —        │ fn(ctx)->Option │ │
//! │  │ ...              │           │          │                 │ │
//! │  │ Operational      │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option │ │
//! │  └──────────────────┴───────────┴──────────┴─────────────────┘ │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer. All functions receive `&mut DeviceContext` which
//! holds the ports, the adapter, config, and timing.

pub mod context;
pub mod states;

use context::DeviceContext;
use log::info;

use crate::app::descriptor::DeviceAdapter;
use crate::app::ports::Platform;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all connectivity states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Init = 0,
    FactoryResetConfirm = 1,
    FactoryReset = 2,
    NewDevice = 3,
    WaitForDiscovery = 4,
    WaitForSendInfoAck = 5,
    WaitForConfig = 6,
    ConfigTimeout = 7,
    ConfigureDevice = 8,
    ConnectNetwork = 9,
    WaitForBroadcastResponse = 10,
    RegisterWithServer = 11,
    WaitForRegisterResponse = 12,
    Operational = 13,
}

impl StateId {
    /// Total number of states: used to size the table array.
    pub const COUNT: usize = 14;

    pub const ALL: [StateId; Self::COUNT] = [
        Self::Init,
        Self::FactoryResetConfirm,
        Self::FactoryReset,
        Self::NewDevice,
        Self::WaitForDiscovery,
        Self::WaitForSendInfoAck,
        Self::WaitForConfig,
        Self::ConfigTimeout,
        Self::ConfigureDevice,
        Self::ConnectNetwork,
        Self::WaitForBroadcastResponse,
        Self::RegisterWithServer,
        Self::WaitForRegisterResponse,
        Self::Operational,
    ];

    /// Convert a table index back to `StateId`. Out-of-range indices
    /// assert in debug builds and fall back to `Init` in release.
    pub fn from_index(idx: usize) -> Self {
        match Self::ALL.get(idx) {
            Some(id) => *id,
            None => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Init
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn<P, A> = fn(&mut DeviceContext<P, A>);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn<P, A> = fn(&mut DeviceContext<P, A>) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
pub struct StateDescriptor<P: Platform, A: DeviceAdapter> {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn<P, A>>,
    pub on_exit: Option<StateActionFn<P, A>>,
    pub on_update: StateUpdateFn<P, A>,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table and threads a [`DeviceContext`] through every
/// handler call.
pub struct Fsm<P: Platform, A: DeviceAdapter> {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor<P, A>; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Monotonically increasing tick counter.
    tick_count: u64,
    /// Tick at which the current state was entered.
    state_entry_tick: u64,
}

impl<P: Platform, A: DeviceAdapter> Fsm<P, A> {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor<P, A>; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut DeviceContext<P, A>) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        ctx.state_entered_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick: at most one `on_update`, followed by
    /// the transition it requests.
    pub fn tick(&mut self, ctx: &mut DeviceContext<P, A>) {
        self.tick_count += 1;
        ctx.ticks_in_state = self.tick_count - self.state_entry_tick;

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Force an immediate transition, running exit and enter actions.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut DeviceContext<P, A>) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    pub fn state_name(&self) -> &'static str {
        self.table[self.current].name
    }

    /// How many ticks the FSM has been in the current state.
    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut DeviceContext<P, A>) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.ticks_in_state = 0;
        ctx.state_entered_ms = ctx.now_ms;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
