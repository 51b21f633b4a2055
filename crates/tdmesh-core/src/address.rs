//! Device addressing and schedule sentinels
//!
//! Every device in the tree carries a 16-bit nibble-packed address that
//! encodes its position: the first-tier router on its path from the root,
//! the second-tier router below that, and its own end-device index.
//!
//! ```text
//! ┌────────────┬────────────┬─────────────────────────┐
//! │ bits 15:12 │ bits 11:8  │ bits 7:0                │
//! │ 1st router │ 2nd router │ end-device index        │
//! │ index (F1) │ index (F2) │ (NN)                    │
//! └────────────┴────────────┴─────────────────────────┘
//! ```
//!
//! All indices are 1-based; a zero field means "not at this tier". The
//! coordinator is the all-zero address. Parents are derivable from the
//! bits alone, so no routing tables are needed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of bytes compared when matching device names.
pub const STRING_MAX: usize = 32;

/// Largest router index that fits a nibble; more routers under one parent
/// cannot be addressed.
pub const ROUTER_INDEX_MAX: u8 = 15;

/// Slot value meaning "this device has no slot of this kind".
pub const SLOT_NONE: u8 = 254;

/// Slot value meaning "slot computation failed".
pub const SLOT_ERROR: u8 = 255;

/// Dead slots between the end of one data cycle and the start of the next.
pub const CYCLE_GAP: u16 = 2;

/// Dead slots between the end of a refresh and the first data slot.
pub const BATCH_GAP: u16 = 4;

/// The role a device plays in the tree, inferred from its address bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    /// Resolution failed or the address is a sentinel
    Error,
    /// Leaf node; transmits its own readings and nothing else
    EndDevice,
    /// Router directly under the coordinator
    FirstRouter,
    /// Router under a first-tier router
    SecondRouter,
    /// The unique root of the tree; receive-only
    Coordinator,
}

impl DeviceType {
    /// Routers carry children; the coordinator does too but is not a router.
    pub fn is_router(&self) -> bool {
        matches!(self, DeviceType::FirstRouter | DeviceType::SecondRouter)
    }

    /// Whether this device can have children in a valid topology.
    pub fn has_children(&self) -> bool {
        self.is_router() || *self == DeviceType::Coordinator
    }
}

/// Nibble-packed 16-bit device address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Addr(u16);

impl Addr {
    /// The coordinator's reserved address.
    pub const COORDINATOR: Addr = Addr(0x0000);

    /// "Not found / no parent" sentinel.
    pub const NONE: Addr = Addr(0xFFFF);

    /// Resolution-failure sentinel, distinct from [`Addr::NONE`].
    pub const ERROR: Addr = Addr(0xFFFE);

    /// Pack tier indices into an address. Indices are 1-based; pass 0 for
    /// tiers the device is not behind.
    pub fn new(first_router: u8, second_router: u8, end_device: u8) -> Self {
        debug_assert!(first_router <= ROUTER_INDEX_MAX);
        debug_assert!(second_router <= ROUTER_INDEX_MAX);
        Addr(((first_router as u16) << 12) | ((second_router as u16) << 8) | end_device as u16)
    }

    /// Create from a raw 16-bit word.
    pub const fn from_u16(word: u16) -> Self {
        Addr(word)
    }

    /// The raw 16-bit word.
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Index of the first-tier router on the path from the root (0 if at
    /// or above that tier).
    pub fn first_router_index(&self) -> u8 {
        (self.0 >> 12) as u8
    }

    /// Index of the second-tier router on the path (0 if none).
    pub fn second_router_index(&self) -> u8 {
        ((self.0 >> 8) & 0x0F) as u8
    }

    /// The device's own end-device index under its router (0 for routers).
    pub fn end_device_index(&self) -> u8 {
        (self.0 & 0x00FF) as u8
    }

    pub fn is_none(&self) -> bool {
        *self == Addr::NONE
    }

    pub fn is_error(&self) -> bool {
        *self == Addr::ERROR
    }

    /// Infer the device role from the address bits.
    pub fn device_type(&self) -> DeviceType {
        if self.is_none() || self.is_error() {
            DeviceType::Error
        } else if self.0 == 0 {
            DeviceType::Coordinator
        } else if self.end_device_index() != 0 {
            DeviceType::EndDevice
        } else if self.second_router_index() != 0 {
            DeviceType::SecondRouter
        } else {
            DeviceType::FirstRouter
        }
    }

    /// Derive the parent's address: zero the nibbles below the device's own
    /// tier. The coordinator has no parent.
    pub fn parent(&self) -> Addr {
        match self.device_type() {
            DeviceType::EndDevice => Addr(self.0 & 0xFF00),
            DeviceType::SecondRouter => Addr(self.0 & 0xF000),
            DeviceType::FirstRouter => Addr::COORDINATOR,
            DeviceType::Coordinator => Addr::NONE,
            DeviceType::Error => Addr::ERROR,
        }
    }
}

impl fmt::Debug for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Addr::NONE => write!(f, "Addr(NONE)"),
            Addr::ERROR => write!(f, "Addr(ERROR)"),
            _ => write!(f, "Addr(0x{:04x})", self.0),
        }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Addr::NONE => write!(f, "----"),
            _ => write!(f, "{:04x}", self.0),
        }
    }
}

impl From<u16> for Addr {
    fn from(word: u16) -> Self {
        Addr(word)
    }
}
