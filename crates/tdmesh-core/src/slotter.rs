//! TDMA slot state machine
//!
//! Drives one device through the repeating phases of the air schedule:
//!
//! ```text
//!               ┌──────────────┐
//!        ┌─────►│ WAIT_REFRESH │◄──── cycles_per_refresh cycles done
//!        │      └──────┬───────┘
//!        │             ▼
//!        │      ┌──────────────┐  recv batch     ┌──────────────┐
//!   refresh     │     RECV     ├────────────────►│     SEND     │
//!        │      └──────▲───────┘  complete       └──────┬───────┘
//!        │             └────────── next cycle ──────────┘
//!        │
//!        └── (ERROR is absorbing and reached only from bad slot input)
//! ```
//!
//! `next_state()` advances exactly one logical slot per call within a
//! batch; `get_slot_wait()` tells the caller how many slots to sleep
//! before acting on the state it just entered, honoring the inter-cycle
//! gap and the post-refresh gap. The caller owns real time; the slotter
//! only counts slots.

use crate::address::{BATCH_GAP, CYCLE_GAP, SLOT_ERROR, SLOT_NONE};
use crate::resolver::SlotterInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of the TDMA cycle a device is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotterState {
    /// Holding for the coordinator's next re-synchronization.
    WaitRefresh,
    /// Listening for one batch of child transmissions.
    Recv,
    /// Transmitting one batch upstream.
    Send,
    /// Slot computation failed; absorbing.
    Error,
}

impl fmt::Display for SlotterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotterState::WaitRefresh => "wait-refresh",
            SlotterState::Recv => "recv",
            SlotterState::Send => "send",
            SlotterState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Cycle-accurate slot scheduler for one device.
///
/// The schedule constants are fixed at construction; only `state`,
/// `cur_cycle` and `cur_device` mutate, and only through [`next_state`]
/// and [`reset`].
///
/// [`next_state`]: Slotter::next_state
/// [`reset`]: Slotter::reset
#[derive(Debug, Clone)]
pub struct Slotter {
    send_slot: u8,
    send_count: u8,
    recv_slot: u8,
    recv_count: u8,
    total_slots: u8,
    cycles_per_refresh: u8,
    state: SlotterState,
    cur_cycle: u8,
    cur_device: u8,
}

/// Schedule equality: two slotters are interchangeable iff their five
/// schedule constants match. Live state and the refresh divider are not
/// compared.
impl PartialEq for Slotter {
    fn eq(&self, rhs: &Self) -> bool {
        self.send_slot == rhs.send_slot
            && self.send_count == rhs.send_count
            && self.recv_slot == rhs.recv_slot
            && self.recv_count == rhs.recv_count
            && self.total_slots == rhs.total_slots
    }
}

impl Slotter {
    /// Build a slotter from raw schedule constants. Starts in
    /// [`SlotterState::WaitRefresh`], or [`SlotterState::Error`] if either
    /// slot carries the error sentinel.
    pub const fn new(
        send_slot: u8,
        total_slots: u8,
        cycles_per_refresh: u8,
        send_count: u8,
        recv_slot: u8,
        recv_count: u8,
    ) -> Self {
        let state = if send_slot != SLOT_ERROR && recv_slot != SLOT_ERROR {
            SlotterState::WaitRefresh
        } else {
            SlotterState::Error
        };
        Slotter {
            send_slot,
            send_count,
            recv_slot,
            recv_count,
            total_slots,
            cycles_per_refresh,
            state,
            cur_cycle: 0,
            cur_device: 0,
        }
    }

    /// End devices transmit one slot and never listen.
    pub const fn end_device(send_slot: u8, total_slots: u8, cycles_per_refresh: u8) -> Self {
        Self::new(send_slot, total_slots, cycles_per_refresh, 1, SLOT_NONE, 0)
    }

    /// The error slotter: starts and stays in [`SlotterState::Error`].
    pub const fn error() -> Self {
        Self::new(SLOT_ERROR, 0, 0, 0, SLOT_ERROR, 0)
    }

    /// Seed a slotter from resolved schedule constants.
    pub fn from_info(info: &SlotterInfo) -> Self {
        Self::new(
            info.self_slot,
            info.total_slots,
            info.cycles_per_refresh,
            info.send_count,
            info.child_slot,
            info.recv_count,
        )
    }

    pub fn state(&self) -> SlotterState {
        self.state
    }

    pub fn send_slot(&self) -> u8 {
        self.send_slot
    }

    pub fn recv_slot(&self) -> u8 {
        self.recv_slot
    }

    /// Advance one logical slot. Within a batch the state is unchanged and
    /// the caller waits a single slot to the next consecutive device; at
    /// batch boundaries the phase flips, and after `cycles_per_refresh`
    /// full cycles the device drops back to [`SlotterState::WaitRefresh`].
    pub fn next_state(&mut self) -> SlotterState {
        match self.state {
            SlotterState::Error => {}
            SlotterState::WaitRefresh => {
                self.cur_device = 0;
                if self.recv_slot != SLOT_NONE {
                    self.state = SlotterState::Recv;
                } else if self.send_slot != SLOT_NONE {
                    self.state = SlotterState::Send;
                }
                // a device with neither slot (bare coordinator) keeps waiting
            }
            SlotterState::Recv => {
                self.cur_device += 1;
                if self.cur_device == self.recv_count {
                    self.cur_device = 0;
                    if self.send_slot != SLOT_NONE {
                        self.state = SlotterState::Send;
                    } else {
                        // no upstream: the recv batch is the whole cycle
                        self.advance_cycle();
                    }
                }
            }
            SlotterState::Send => {
                self.cur_device += 1;
                if self.cur_device == self.send_count {
                    self.cur_device = 0;
                    self.advance_cycle();
                }
            }
        }
        self.state
    }

    fn advance_cycle(&mut self) {
        self.cur_cycle += 1;
        if self.cur_cycle == self.cycles_per_refresh {
            self.cur_cycle = 0;
            self.state = SlotterState::WaitRefresh;
        } else if self.recv_slot != SLOT_NONE {
            self.state = SlotterState::Recv;
        } else {
            self.state = SlotterState::Send;
        }
    }

    /// Slots to sleep before acting on the current state. Only meaningful
    /// at the start of a batch; mid-batch (and while waiting for a
    /// refresh, which is timed off the real-time clock instead) this
    /// returns 0 and the caller advances one consecutive slot.
    pub fn get_slot_wait(&self) -> u16 {
        let total = self.total_slots as u16;
        match self.state {
            SlotterState::Send if self.cur_device == 0 => {
                if self.recv_slot == SLOT_NONE {
                    // end device: gaps are all on the send side
                    if self.cur_cycle == 0 {
                        self.send_slot as u16 + CYCLE_GAP + BATCH_GAP
                    } else {
                        total + CYCLE_GAP - 1
                    }
                } else {
                    // gap between the last expected inbound slot and our
                    // own; refresh and cycle gaps were paid entering recv
                    (self.send_slot as u16)
                        .saturating_sub(self.recv_slot as u16 + self.recv_count as u16)
                }
            }
            SlotterState::Recv if self.cur_device == 0 => {
                if self.cur_cycle == 0 {
                    self.recv_slot as u16 + BATCH_GAP
                } else if self.send_slot != SLOT_NONE {
                    (total + CYCLE_GAP).saturating_sub(
                        self.send_slot as u16 + self.send_count as u16 - self.recv_slot as u16,
                    )
                } else {
                    // coordinator: from the end of its recv batch
                    (total + CYCLE_GAP).saturating_sub(self.recv_count as u16 + 1)
                }
            }
            _ => 0,
        }
    }

    /// Return to the post-boot state: waiting for a refresh, counters
    /// cleared. Error slotters stay in error.
    pub fn reset(&mut self) {
        if self.state != SlotterState::Error {
            self.state = SlotterState::WaitRefresh;
        }
        self.cur_cycle = 0;
        self.cur_device = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_device_cycle() {
        // send_slot=3, total=5, two cycles per refresh
        let mut slotter = Slotter::end_device(3, 5, 2);
        assert_eq!(slotter.state(), SlotterState::WaitRefresh);

        assert_eq!(slotter.next_state(), SlotterState::Send);
        assert_eq!(slotter.get_slot_wait(), 3 + CYCLE_GAP + BATCH_GAP);

        assert_eq!(slotter.next_state(), SlotterState::Send);
        assert_eq!(slotter.get_slot_wait(), 5 + CYCLE_GAP - 1);

        assert_eq!(slotter.next_state(), SlotterState::WaitRefresh);
        assert_eq!(slotter.get_slot_wait(), 0);
    }

    #[test]
    fn test_router_cycle() {
        // R1 of the two-tier example: recv slots 0-1, send slot 2, 4 total
        let mut slotter = Slotter::new(2, 4, 2, 1, 0, 2);

        assert_eq!(slotter.next_state(), SlotterState::Recv);
        assert_eq!(slotter.get_slot_wait(), 0 + BATCH_GAP);
        assert_eq!(slotter.next_state(), SlotterState::Recv); // second child
        assert_eq!(slotter.get_slot_wait(), 0); // consecutive slot

        assert_eq!(slotter.next_state(), SlotterState::Send);
        assert_eq!(slotter.get_slot_wait(), 0); // recv ends at 1, send at 2

        // second cycle
        assert_eq!(slotter.next_state(), SlotterState::Recv);
        assert_eq!(slotter.get_slot_wait(), 4 + CYCLE_GAP - (2 + 1 - 0));
        slotter.next_state();
        assert_eq!(slotter.next_state(), SlotterState::Send);

        assert_eq!(slotter.next_state(), SlotterState::WaitRefresh);
    }

    #[test]
    fn test_closure_counts() {
        // one full refresh period = 1 wake-up transition plus one call per
        // scheduled slot per cycle
        let recv_count = 3u32;
        let send_count = 1u32;
        let cycles = 4u32;
        let mut slotter = Slotter::new(5, 9, cycles as u8, send_count as u8, 2, recv_count as u8);

        let calls = 1 + cycles * (recv_count + send_count);
        for i in 0..calls - 1 {
            let state = slotter.next_state();
            assert_ne!(state, SlotterState::WaitRefresh, "returned early at call {i}");
        }
        assert_eq!(slotter.next_state(), SlotterState::WaitRefresh);
        // counters are cleared for the next period
        assert_eq!(slotter.next_state(), SlotterState::Recv);
        assert_eq!(slotter.get_slot_wait(), 2 + BATCH_GAP);
    }

    #[test]
    fn test_coordinator_cycles_without_send() {
        // coordinator of the two-tier example: recv slots 2-3, no send
        let mut slotter = Slotter::new(SLOT_NONE, 4, 2, 0, 2, 2);

        assert_eq!(slotter.next_state(), SlotterState::Recv);
        assert_eq!(slotter.get_slot_wait(), 2 + BATCH_GAP);
        assert_eq!(slotter.next_state(), SlotterState::Recv); // second child
        assert_eq!(slotter.get_slot_wait(), 0);

        // batch done: straight into the next cycle's recv
        assert_eq!(slotter.next_state(), SlotterState::Recv);
        assert_eq!(slotter.get_slot_wait(), 4 + CYCLE_GAP - 2 - 1);
        slotter.next_state();
        assert_eq!(slotter.next_state(), SlotterState::WaitRefresh);
    }

    #[test]
    fn test_bare_coordinator_keeps_waiting() {
        let mut slotter = Slotter::new(SLOT_NONE, 0, 1, 0, SLOT_NONE, 0);
        assert_eq!(slotter.next_state(), SlotterState::WaitRefresh);
        assert_eq!(slotter.get_slot_wait(), 0);
    }

    #[test]
    fn test_error_is_absorbing() {
        let mut slotter = Slotter::error();
        assert_eq!(slotter.state(), SlotterState::Error);
        assert_eq!(slotter.next_state(), SlotterState::Error);
        assert_eq!(slotter.get_slot_wait(), 0);
        slotter.reset();
        assert_eq!(slotter.state(), SlotterState::Error);
    }

    #[test]
    fn test_error_info_seeds_error_state() {
        use crate::resolver::SlotterInfo;
        let slotter = Slotter::from_info(&SlotterInfo::ERROR);
        assert_eq!(slotter.state(), SlotterState::Error);
    }

    #[test]
    fn test_reset_mid_cycle() {
        let mut slotter = Slotter::end_device(1, 3, 4);
        slotter.next_state();
        slotter.next_state();
        slotter.reset();
        assert_eq!(slotter.state(), SlotterState::WaitRefresh);
        // first cycle again, refresh gap included
        assert_eq!(slotter.next_state(), SlotterState::Send);
        assert_eq!(slotter.get_slot_wait(), 1 + CYCLE_GAP + BATCH_GAP);
    }

    #[test]
    fn test_equality_ignores_live_state() {
        let mut a = Slotter::new(2, 4, 2, 1, 0, 2);
        let b = Slotter::new(2, 4, 7, 1, 0, 2); // refresh divider differs
        a.next_state();
        assert_eq!(a, b);
        assert_ne!(a, Slotter::new(3, 4, 2, 1, 0, 2));
    }
}
