//! Slot schedule pre-pass
//!
//! One walk over the topology annotates every transmitting device with its
//! global slot, its address, and the weight of its subtree, so that later
//! queries (self slot, first-child slot, descendant count) are lookups
//! instead of repeated tree scans.
//!
//! ## Schedule shape
//!
//! The cycle is laid out post-order: a device's descendants all transmit
//! before it does, so a router hears its subtree first and relays the
//! aggregate upstream in its own slot. Among siblings, routers are
//! scheduled before end devices (routers have higher priority). Each
//! device owns exactly one slot per cycle; a router flagged `sensor`
//! owns a second one for its own reading.
//!
//! ```text
//! C ── R1 ── E1        slot 0: E1 → R1
//!  │    └── E2         slot 1: E2 → R1
//!  └── E3              slot 2: R1 → C
//!                      slot 3: E3 → C
//! ```

use crate::address::{Addr, ROUTER_INDEX_MAX, SLOT_NONE};
use crate::topology::{names_match, NodeDesc, Topology, TopologyError};
use serde::Serialize;
use tracing::{debug, warn};

/// Largest slot count a schedule may reach; the values above are sentinels.
pub const SLOT_COUNT_MAX: u16 = 254;

/// One transmitting device's place in the cycle.
#[derive(Debug, Clone, Serialize)]
pub struct SlotEntry {
    pub name: String,
    pub address: Addr,
    pub parent: Addr,
    /// 1 = directly under the coordinator.
    pub tier: u8,
    /// First slot of this device's transmit batch.
    pub slot: u8,
    /// Slots the batch occupies (2 for a sensor-flagged router).
    pub width: u8,
    /// Slots consumed by this device and everything below it.
    pub subtree_weight: u8,
    /// Transmit slot of the highest-priority direct child, [`SLOT_NONE`]
    /// for leaves.
    pub child_slot: u8,
    pub router_children: u8,
    pub device_children: u8,
}

/// The annotated cycle: every device below the coordinator, in slot order.
#[derive(Debug, Clone, Serialize)]
pub struct Schedule {
    entries: Vec<SlotEntry>,
    total_slots: u8,
    root_child_slot: u8,
}

impl Schedule {
    /// Walk the whole tree once, assigning addresses and slots and
    /// validating tier fan-out and depth along the way.
    pub fn build(topology: &Topology) -> Result<Schedule, TopologyError> {
        let mut entries = Vec::new();
        let mut cursor: u16 = 0;
        let root_child_slot =
            schedule_children(&topology.root, Addr::COORDINATOR, 1, &mut cursor, &mut entries)?;
        debug!(total_slots = cursor, devices = entries.len(), "slot schedule built");
        Ok(Schedule {
            entries,
            total_slots: cursor as u8,
            root_child_slot,
        })
    }

    /// Number of slots in one full data cycle.
    pub fn total_slots(&self) -> u8 {
        self.total_slots
    }

    /// All transmitting devices in slot order.
    pub fn entries(&self) -> &[SlotEntry] {
        &self.entries
    }

    /// Slot of the coordinator's highest-priority child, [`SLOT_NONE`] if
    /// the tree has no devices.
    pub fn first_child_slot(&self) -> u8 {
        self.root_child_slot
    }

    /// Look a device up by (bounded) name.
    pub fn find(&self, name: &str) -> Option<&SlotEntry> {
        self.entries.iter().find(|e| names_match(&e.name, name))
    }

    /// Look a device up by address.
    pub fn find_addr(&self, address: Addr) -> Option<&SlotEntry> {
        self.entries.iter().find(|e| e.address == address)
    }
}

/// Schedule `parent`'s children (routers first, then end devices, declared
/// order within each kind) and return the slot of the highest-priority
/// child. `tier` is the tier the children occupy.
fn schedule_children(
    parent: &NodeDesc,
    parent_addr: Addr,
    tier: u8,
    cursor: &mut u16,
    entries: &mut Vec<SlotEntry>,
) -> Result<u8, TopologyError> {
    let mut first_child_slot = SLOT_NONE;
    let mut router_index: u8 = 0;
    let mut device_index: u16 = 0;

    for child in parent.children.iter().filter(|c| c.is_router()) {
        router_index += 1;
        if router_index > ROUTER_INDEX_MAX {
            return Err(TopologyError::RouterOverflow(parent.name.clone()));
        }
        if tier > 2 {
            return Err(TopologyError::DepthExceeded(child.name.clone()));
        }
        let address = match tier {
            1 => Addr::new(router_index, 0, 0),
            _ => Addr::new(parent_addr.first_router_index(), router_index, 0),
        };

        // descendants transmit first, then the router itself
        let start = *cursor;
        let child_slot = schedule_children(child, address, tier + 1, cursor, entries)?;
        let slot = *cursor;
        let width: u8 = if child.sensor { 2 } else { 1 };
        *cursor += width as u16;
        if *cursor > SLOT_COUNT_MAX {
            return Err(TopologyError::SlotOverflow(*cursor));
        }
        let (routers, devices) = child.child_counts();
        entries.push(SlotEntry {
            name: child.name.clone(),
            address,
            parent: parent_addr,
            tier,
            slot: slot as u8,
            width,
            subtree_weight: (*cursor - start) as u8,
            child_slot,
            router_children: routers as u8,
            device_children: devices as u8,
        });
        if first_child_slot == SLOT_NONE {
            first_child_slot = slot as u8;
        }
    }

    for child in parent.children.iter().filter(|c| !c.is_router()) {
        device_index += 1;
        if device_index > u8::MAX as u16 {
            return Err(TopologyError::NodeOverflow(parent.name.clone()));
        }
        if !child.children.is_empty() {
            warn!(name = %child.name, "end device has children; they are unreachable");
        }
        let address = Addr::new(
            parent_addr.first_router_index(),
            parent_addr.second_router_index(),
            device_index as u8,
        );
        let slot = *cursor;
        *cursor += 1;
        if *cursor > SLOT_COUNT_MAX {
            return Err(TopologyError::SlotOverflow(*cursor));
        }
        entries.push(SlotEntry {
            name: child.name.clone(),
            address,
            parent: parent_addr,
            tier,
            slot: slot as u8,
            width: 1,
            subtree_weight: 1,
            child_slot: SLOT_NONE,
            router_children: 0,
            device_children: 0,
        });
        if first_child_slot == SLOT_NONE {
            first_child_slot = slot as u8;
        }
    }

    Ok(first_child_slot)
}
