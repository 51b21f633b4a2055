//! # tdmesh core
//!
//! Protocol core for a low-power wireless sensor mesh arranged as a
//! three-level tree (coordinator → routers → routers → end devices)
//! sharing one radio channel under a TDMA schedule.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application buffers                      │
//! └─────────────────────────────────────────────────────────────┘
//!                  │ bytes                  ▲ bytes
//!                  ▼                        │
//! ┌─────────────────────────────────────────────────────────────┐
//! │  PacketSorter     fragments ⇄ streams, duplicate dropping   │
//! └─────────────────────────────────────────────────────────────┘
//!                  │ Fragment               ▲ Fragment
//!                  ▼                        │
//! ┌──────────────────────────┐   ┌─────────────────────────────┐
//! │  Slotter                 │   │  Fragment codec             │
//! │  when to be on the air   │   │  7-byte header framing      │
//! └──────────────────────────┘   └─────────────────────────────┘
//!                  │ slot waits             │ raw frames
//!                  ▼                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Radio trait          (hardware driver lives elsewhere)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything a node needs at runtime is derived once at boot by
//! [`NetworkInfo::resolve`] from the shared topology description and the
//! node's own name: its nibble-packed [`Addr`], its parent, and the
//! schedule constants that seed its [`Slotter`].
//!
//! ## Example
//!
//! ```rust
//! use tdmesh_core::{NetworkInfo, Slotter, SlotterState, Topology};
//!
//! let topo = Topology::from_json(r#"{
//!     "root": { "name": "C", "type": 1, "children": [
//!         { "name": "E1", "type": 0 } ] },
//!     "config": { "cycles_per_refresh": 5 } }"#).unwrap();
//!
//! let info = NetworkInfo::resolve(&topo, "E1").unwrap();
//! let mut slotter = Slotter::from_info(&info.slotter);
//! assert_eq!(slotter.next_state(), SlotterState::Send);
//! ```
//!
//! Execution is single-threaded cooperative: no locks, no blocking waits,
//! bounded buffers throughout.

pub mod address;
pub mod fragment;
pub mod radio;
pub mod resolver;
pub mod sim;
pub mod slots;
pub mod slotter;
pub mod sorter;
pub mod topology;

// Re-export main types
pub use address::{
    Addr, DeviceType, BATCH_GAP, CYCLE_GAP, ROUTER_INDEX_MAX, SLOT_ERROR, SLOT_NONE, STRING_MAX,
};
pub use fragment::{crc16_ccitt, Fingerprint, FrameError, Fragment, FRAME_MAX, PAYLOAD_MAX};
pub use radio::{Radio, RadioError, RadioState};
pub use resolver::{NetworkInfo, RouterInfo, SlotterInfo};
pub use sim::{MediumStats, SimMedium, SimRadio};
pub use slots::{Schedule, SlotEntry};
pub use slotter::{Slotter, SlotterState};
pub use sorter::{PacketSorter, SorterConfig};
pub use topology::{DeviceKind, NetConfig, NodeDesc, Topology, TopologyError};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::address::{Addr, DeviceType, SLOT_ERROR, SLOT_NONE};
    pub use crate::fragment::Fragment;
    pub use crate::radio::{Radio, RadioState};
    pub use crate::resolver::NetworkInfo;
    pub use crate::slotter::{Slotter, SlotterState};
    pub use crate::sorter::PacketSorter;
    pub use crate::topology::Topology;
}
