//! Leased listener registry for radio-linked devices.
//!
//! Remote nodes subscribe with `ADD_LISTENER` and receive every
//! notification the device publishes until they unsubscribe or their
//! lease runs out. Slots are fixed at compile time; a full table drops
//! new subscribers silently.
//!
//! ```text
//!   ADD_LISTENER ──▶ [known?] ──yes──▶ refresh lease ──▶ ack
//!                        │ no
//!                        ▼
//!                   [free slot?] ──yes──▶ occupy + lease ──▶ ack
//!                        │ no
//!                        ▼
//!                      drop
//! ```

use log::{debug, warn};

use crate::app::ports::{NodeAddress, RadioLink};
use crate::messenger::radio::{MessageType, command, header};

/// Default subscription lifetime (10 minutes).
pub const LEASE_MS: u64 = 600_000;

/// Result of an `ADD_LISTENER` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A free slot was occupied.
    Added,
    /// The address was already subscribed; its lease was renewed.
    Refreshed,
    /// No slot was free, or the address was the empty address.
    Dropped,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    address: NodeAddress,
    expires_ms: u64,
}

impl Slot {
    const FREE: Self = Self {
        address: NodeAddress::EMPTY,
        expires_ms: 0,
    };

    fn is_free(&self) -> bool {
        self.address.is_empty()
    }
}

pub struct ListenerManager<const N: usize> {
    slots: [Slot; N],
    lease_ms: u64,
}

impl<const N: usize> Default for ListenerManager<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ListenerManager<N> {
    pub const fn new() -> Self {
        Self::with_lease(LEASE_MS)
    }

    pub const fn with_lease(lease_ms: u64) -> Self {
        Self {
            slots: [Slot::FREE; N],
            lease_ms,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn lease_ms(&self) -> u64 {
        self.lease_ms
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_free()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn listener_addresses(&self) -> impl Iterator<Item = NodeAddress> + '_ {
        self.slots
            .iter()
            .filter(|s| !s.is_free())
            .map(|s| s.address)
    }

    /// Expiry of the lease held by `addr`, if subscribed.
    pub fn lease_expiry(&self, addr: NodeAddress) -> Option<u64> {
        self.find(addr).map(|i| self.slots[i].expires_ms)
    }

    /// Slots are matched on the 64-bit address; the 16-bit network
    /// address changes whenever the node rejoins.
    fn find(&self, addr: NodeAddress) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| !s.is_free() && s.address.addr64 == addr.addr64)
    }

    /// Subscribe `addr`, or renew its lease. Acknowledged unless dropped.
    pub fn add_listener(
        &mut self,
        link: &mut impl RadioLink,
        addr: NodeAddress,
        now_ms: u64,
    ) -> AddOutcome {
        if addr.is_empty() {
            warn!("listener: ignoring subscription from empty address");
            return AddOutcome::Dropped;
        }

        let (index, outcome) = match self.find(addr) {
            Some(i) => (i, AddOutcome::Refreshed),
            None => match self.slots.iter().position(Slot::is_free) {
                Some(i) => (i, AddOutcome::Added),
                None => {
                    debug!("listener: table full, dropping {:016x}", addr.addr64);
                    return AddOutcome::Dropped;
                }
            },
        };

        self.slots[index] = Slot {
            address: addr,
            expires_ms: now_ms + self.lease_ms,
        };
        ack(link, addr, command::ADD_LISTENER);
        debug!("listener: {:?} {:016x} in slot {}", outcome, addr.addr64, index);
        outcome
    }

    /// Unsubscribe `addr`. Returns `false` if it was not subscribed.
    pub fn remove_listener(&mut self, link: &mut impl RadioLink, addr: NodeAddress) -> bool {
        let Some(index) = self.find(addr) else {
            return false;
        };
        self.slots[index] = Slot::FREE;
        ack(link, addr, command::REMOVE_LISTENER);
        true
    }

    /// Free every slot whose lease has passed. Nobody is told.
    pub fn check_leases(&mut self, now_ms: u64) -> usize {
        let mut expired = 0;
        for slot in self.slots.iter_mut().filter(|s| !s.is_free()) {
            if now_ms > slot.expires_ms {
                debug!("listener: lease of {:016x} expired", slot.address.addr64);
                *slot = Slot::FREE;
                expired += 1;
            }
        }
        expired
    }

    /// Send `payload` to every subscriber. Returns how many sends succeeded.
    pub fn notify_all(&self, link: &mut impl RadioLink, payload: &[u8]) -> usize {
        let mut delivered = 0;
        for addr in self.listener_addresses() {
            match link.send(addr, payload) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("listener: notify {:016x} failed: {}", addr.addr64, e),
            }
        }
        delivered
    }

    /// Handle the registry commands of an inbound request. Returns `true`
    /// if `command` was one of them.
    pub fn process_message(
        &mut self,
        link: &mut impl RadioLink,
        command: u8,
        from: NodeAddress,
        now_ms: u64,
    ) -> bool {
        match command {
            command::ADD_LISTENER => {
                self.add_listener(link, from, now_ms);
                true
            }
            command::REMOVE_LISTENER => {
                self.remove_listener(link, from);
                true
            }
            _ => false,
        }
    }
}

fn ack(link: &mut impl RadioLink, to: NodeAddress, cmd: u8) {
    if let Err(e) = link.send(to, &[header(MessageType::Response, cmd)]) {
        warn!("listener: ack to {:016x} failed: {}", to.addr64, e);
    }
}
