//! Simulated radio medium
//!
//! A single shared channel in memory, for exercising the stack without
//! hardware: every [`SimRadio`] cloned off a [`SimMedium`] hears every
//! frame put on the air. Time is a software clock the test (or the CLI)
//! advances explicitly, so runs are deterministic.
//!
//! The execution model matches the real target: one cooperative task,
//! no threads, so the shared state lives behind `Rc<RefCell<..>>`.

use crate::radio::{Radio, RadioError, RadioState, SEND_DELAY_MILLIS};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;
use tracing::warn;

/// Counters for what happened on the air.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediumStats {
    pub frames_sent: u64,
    pub frames_delivered: u64,
    /// A send happened while another frame was still on the air.
    pub collisions: u64,
}

#[derive(Debug, Default)]
struct MediumInner {
    now: Duration,
    /// Frames on the air, with their first-edge timestamps.
    frames: VecDeque<(Vec<u8>, Duration)>,
    stats: MediumStats,
}

/// The shared channel.
#[derive(Debug, Clone, Default)]
pub struct SimMedium {
    inner: Rc<RefCell<MediumInner>>,
}

impl SimMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new radio to this channel, powered off.
    pub fn radio(&self) -> SimRadio {
        SimRadio {
            medium: Rc::clone(&self.inner),
            state: RadioState::Disabled,
        }
    }

    /// Step the shared clock.
    pub fn advance(&self, by: Duration) {
        self.inner.borrow_mut().now += by;
    }

    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    pub fn stats(&self) -> MediumStats {
        self.inner.borrow().stats
    }
}

/// A transceiver on a [`SimMedium`].
#[derive(Debug)]
pub struct SimRadio {
    medium: Rc<RefCell<MediumInner>>,
    state: RadioState,
}

impl SimRadio {
    fn move_to(&mut self, to: RadioState) -> Result<(), RadioError> {
        if !self.state.can_move_to(to) {
            let err = RadioError::InvalidTransition {
                from: self.state,
                to,
            };
            warn!(%err, "radio transition ignored");
            return Err(err);
        }
        self.state = to;
        Ok(())
    }
}

impl Radio for SimRadio {
    fn get_time(&self) -> Duration {
        self.medium.borrow().now
    }

    fn get_state(&self) -> RadioState {
        self.state
    }

    fn enable(&mut self) -> Result<(), RadioError> {
        self.move_to(RadioState::Sleep)
    }

    fn disable(&mut self) -> Result<(), RadioError> {
        self.move_to(RadioState::Disabled)
    }

    fn sleep(&mut self) -> Result<(), RadioError> {
        self.move_to(RadioState::Sleep)
    }

    fn wake(&mut self) -> Result<(), RadioError> {
        self.move_to(RadioState::Idle)
    }

    fn recv(&mut self) -> Result<Option<(Vec<u8>, Duration)>, RadioError> {
        if self.state != RadioState::Idle {
            return Err(RadioError::NotIdle {
                op: "recv",
                state: self.state,
            });
        }
        let mut medium = self.medium.borrow_mut();
        let frame = medium.frames.pop_front();
        if frame.is_some() {
            medium.stats.frames_delivered += 1;
        }
        Ok(frame)
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        if self.state != RadioState::Idle {
            return Err(RadioError::NotIdle {
                op: "send",
                state: self.state,
            });
        }
        let mut medium = self.medium.borrow_mut();
        if !medium.frames.is_empty() {
            medium.stats.collisions += 1;
        }
        let first_edge = medium.now + Duration::from_millis(SEND_DELAY_MILLIS);
        medium.frames.push_back((frame.to_vec(), first_edge));
        medium.stats.frames_sent += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_sequence() {
        let medium = SimMedium::new();
        let mut radio = medium.radio();
        assert_eq!(radio.get_state(), RadioState::Disabled);
        radio.enable().unwrap();
        radio.wake().unwrap();
        assert_eq!(radio.get_state(), RadioState::Idle);
        radio.sleep().unwrap();
        radio.disable().unwrap();
    }

    #[test]
    fn test_illegal_transition_keeps_state() {
        let medium = SimMedium::new();
        let mut radio = medium.radio();
        assert!(radio.wake().is_err()); // still disabled
        assert_eq!(radio.get_state(), RadioState::Disabled);
    }

    #[test]
    fn test_send_recv_roundtrip() {
        let medium = SimMedium::new();
        let mut tx = medium.radio();
        let mut rx = medium.radio();
        for r in [&mut tx, &mut rx] {
            r.enable().unwrap();
            r.wake().unwrap();
        }

        medium.advance(Duration::from_millis(1000));
        tx.send(b"frame").unwrap();
        let (bytes, stamp) = rx.recv().unwrap().expect("frame on the air");
        assert_eq!(bytes, b"frame");
        assert_eq!(stamp, Duration::from_millis(1000 + SEND_DELAY_MILLIS));
        assert!(rx.recv().unwrap().is_none());

        let stats = medium.stats();
        assert_eq!(stats.frames_sent, 1);
        assert_eq!(stats.frames_delivered, 1);
        assert_eq!(stats.collisions, 0);
    }

    #[test]
    fn test_send_requires_idle() {
        let medium = SimMedium::new();
        let mut radio = medium.radio();
        radio.enable().unwrap();
        assert_eq!(
            radio.send(b"x").unwrap_err(),
            RadioError::NotIdle {
                op: "send",
                state: RadioState::Sleep
            }
        );
    }

    #[test]
    fn test_collision_counted() {
        let medium = SimMedium::new();
        let mut a = medium.radio();
        let mut b = medium.radio();
        for r in [&mut a, &mut b] {
            r.enable().unwrap();
            r.wake().unwrap();
        }
        a.send(b"one").unwrap();
        b.send(b"two").unwrap();
        assert_eq!(medium.stats().collisions, 1);
    }
}
