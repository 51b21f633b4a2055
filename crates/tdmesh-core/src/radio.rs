//! Radio interface
//!
//! The core never touches hardware directly; it drives any transceiver
//! through this trait. A radio is a small state machine:
//!
//! ```text
//! DISABLED ◄──disable── SLEEP ◄──sleep── IDLE ──send/recv──► SEND/RECV
//!     └───────enable──────┘└─────wake──────┘   (transient, IDLE after)
//! ```
//!
//! Illegal movements are reported as errors and leave the state unchanged;
//! callers log and carry on, since a mis-stepped driver is a bug upstream,
//! not something the protocol can repair.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Nominal airtime of one schedule slot.
pub const SLOT_LENGTH_MILLIS: u64 = 10_000;

/// Grace period a transmitter gives its peer to start listening.
pub const SEND_DELAY_MILLIS: u64 = 500;

/// How long a receiver waits for a first edge before giving up.
pub const WIRE_RECV_TIMEOUT_MILLIS: u64 = 500 + SEND_DELAY_MILLIS;

/// Half-period of the bit clock, in microseconds.
pub const BIT_LENGTH_MICROS: u64 = 400;

/// Power/activity state of a transceiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadioState {
    Disabled,
    Sleep,
    Idle,
    Send,
    Recv,
}

impl RadioState {
    /// Whether `self -> to` is a legal explicit transition. Send/Recv are
    /// transient states owned by the driver itself.
    pub fn can_move_to(self, to: RadioState) -> bool {
        matches!(
            (self, to),
            (RadioState::Disabled, RadioState::Sleep)
                | (RadioState::Sleep, RadioState::Disabled)
                | (RadioState::Sleep, RadioState::Idle)
                | (RadioState::Idle, RadioState::Sleep)
        )
    }
}

/// Driver-level failures surfaced to the protocol stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("illegal radio transition {from:?} -> {to:?}")]
    InvalidTransition { from: RadioState, to: RadioState },
    #[error("radio must be idle to {op} (currently {state:?})")]
    NotIdle {
        op: &'static str,
        state: RadioState,
    },
}

/// Contract between the protocol core and a physical transceiver.
///
/// `send` and `recv` are synchronous from the core's perspective; the
/// slotter has already arranged for both ends to be on the air in the
/// same slot.
pub trait Radio {
    /// Monotonic time since the radio's clock started.
    fn get_time(&self) -> Duration;

    fn get_state(&self) -> RadioState;

    /// DISABLED -> SLEEP.
    fn enable(&mut self) -> Result<(), RadioError>;

    /// SLEEP -> DISABLED.
    fn disable(&mut self) -> Result<(), RadioError>;

    /// IDLE -> SLEEP.
    fn sleep(&mut self) -> Result<(), RadioError>;

    /// SLEEP -> IDLE.
    fn wake(&mut self) -> Result<(), RadioError>;

    /// Listen for one frame. Valid only from IDLE; blocks up to
    /// [`WIRE_RECV_TIMEOUT_MILLIS`]. On success returns the raw frame and
    /// the timestamp of the first edge heard, for schedule resynching.
    fn recv(&mut self) -> Result<Option<(Vec<u8>, Duration)>, RadioError>;

    /// Clock one frame out. Valid only from IDLE.
    fn send(&mut self, frame: &[u8]) -> Result<(), RadioError>;
}
