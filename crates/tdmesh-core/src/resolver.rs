//! Topology resolution
//!
//! At boot a node knows only its own name and the shared network
//! description. [`NetworkInfo::resolve`] walks the tree once and produces
//! everything the node needs at runtime: its address, its parent, the
//! shape of its direct children, and its place in the slot schedule.
//!
//! The walk keeps two 1-based sibling counters per tier (end devices and
//! routers count separately) and threads the partial address through the
//! recursion as an explicit value: a match deep in the tree returns the
//! low bits, and each unwinding frame ORs in its own router index.

use crate::address::{Addr, DeviceType, ROUTER_INDEX_MAX, SLOT_ERROR, SLOT_NONE};
use crate::slots::Schedule;
use crate::topology::{names_match, DeviceKind, NodeDesc, Topology, TopologyError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Routing identity of one device: who it is, who it answers to, and how
/// many direct children it coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterInfo {
    pub device_type: DeviceType,
    pub address: Addr,
    pub parent: Addr,
    /// Direct router children only.
    pub router_count: u8,
    /// Direct end-device children only.
    pub node_count: u8,
}

impl RouterInfo {
    /// Sentinel carried by a node whose resolution failed.
    pub const ERROR: RouterInfo = RouterInfo {
        device_type: DeviceType::Error,
        address: Addr::ERROR,
        parent: Addr::ERROR,
        router_count: 0,
        node_count: 0,
    };
}

/// Schedule constants for one device, ready to seed a
/// [`Slotter`](crate::slotter::Slotter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotterInfo {
    /// First slot of this device's transmit batch; [`SLOT_NONE`] for the
    /// coordinator.
    pub self_slot: u8,
    /// Transmit slot of the highest-priority direct child; [`SLOT_NONE`]
    /// for end devices.
    pub child_slot: u8,
    /// Slots consumed by all descendants (not counting this device's own
    /// transmit).
    pub child_slot_count: u8,
    /// Slots in one full data cycle.
    pub total_slots: u8,
    /// Slots in this device's own transmit batch (0 for the coordinator,
    /// 2 for a sensor-flagged router).
    pub send_count: u8,
    /// Slots this device stays in receive, from the first child's slot up
    /// to its own transmit.
    pub recv_count: u8,
    /// Data cycles between refreshes.
    pub cycles_per_refresh: u8,
}

impl SlotterInfo {
    /// Sentinel that seeds a [`Slotter`](crate::slotter::Slotter) straight
    /// into its absorbing error state.
    pub const ERROR: SlotterInfo = SlotterInfo {
        self_slot: SLOT_ERROR,
        child_slot: SLOT_ERROR,
        child_slot_count: 0,
        total_slots: 0,
        send_count: 0,
        recv_count: 0,
        cycles_per_refresh: 0,
    };
}

/// Everything a node derives from the topology at boot. Computed once,
/// read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub router: RouterInfo,
    pub slotter: SlotterInfo,
}

impl NetworkInfo {
    /// Combined resolution-failure sentinel.
    pub const ERROR: NetworkInfo = NetworkInfo {
        router: RouterInfo::ERROR,
        slotter: SlotterInfo::ERROR,
    };

    /// Resolve `self_name` against the topology.
    pub fn resolve(topology: &Topology, self_name: &str) -> Result<NetworkInfo, TopologyError> {
        if topology.config.cycles_per_refresh == 0 {
            return Err(TopologyError::ZeroRefresh);
        }
        let cycles_per_refresh = topology.config.cycles_per_refresh;

        let schedule = Schedule::build(topology)?;
        let total_slots = schedule.total_slots();
        let root = &topology.root;

        if names_match(&root.name, self_name) {
            let (routers, devices) = root.child_counts();
            let child_slot = schedule.first_child_slot();
            let recv_count = if child_slot == SLOT_NONE {
                0
            } else {
                total_slots - child_slot
            };
            return Ok(NetworkInfo {
                router: RouterInfo {
                    device_type: DeviceType::Coordinator,
                    address: Addr::COORDINATOR,
                    parent: Addr::NONE,
                    router_count: routers as u8,
                    node_count: devices as u8,
                },
                slotter: SlotterInfo {
                    self_slot: SLOT_NONE,
                    child_slot,
                    child_slot_count: total_slots,
                    total_slots,
                    send_count: 0,
                    recv_count,
                    cycles_per_refresh,
                },
            });
        }

        let found = walk(root, self_name, 1)?
            .ok_or_else(|| TopologyError::NameNotFound(self_name.to_string()))?;
        let address = Addr::from_u16(found.address);
        let device_type = address.device_type();
        let (routers, devices) = found.node.child_counts();
        debug!(name = self_name, %address, ?device_type, "resolved device");

        // the schedule assigned the same addresses, so the entry must exist
        let entry = schedule
            .find_addr(address)
            .ok_or_else(|| TopologyError::NameNotFound(self_name.to_string()))?;
        let recv_count = if entry.child_slot == SLOT_NONE {
            0
        } else {
            entry.slot - entry.child_slot
        };

        Ok(NetworkInfo {
            router: RouterInfo {
                device_type,
                address,
                parent: address.parent(),
                router_count: routers as u8,
                node_count: devices as u8,
            },
            slotter: SlotterInfo {
                self_slot: entry.slot,
                child_slot: entry.child_slot,
                child_slot_count: entry.subtree_weight - entry.width,
                total_slots,
                send_count: entry.width,
                recv_count,
                cycles_per_refresh,
            },
        })
    }
}

struct Found<'a> {
    node: &'a NodeDesc,
    address: u16,
}

/// Depth-first search for `self_name` below `parent`. `tier` is the tier
/// the children occupy (1 = directly under the coordinator). Returns the
/// partial address accumulated so far; each caller ORs in its own router
/// index while unwinding.
fn walk<'a>(
    parent: &'a NodeDesc,
    self_name: &str,
    tier: u8,
) -> Result<Option<Found<'a>>, TopologyError> {
    let mut router_index: u8 = 0;
    let mut device_index: u16 = 0;

    for child in &parent.children {
        match child.kind {
            DeviceKind::EndDevice => {
                device_index += 1;
                if device_index > u8::MAX as u16 {
                    return Err(TopologyError::NodeOverflow(parent.name.clone()));
                }
                if names_match(&child.name, self_name) {
                    return Ok(Some(Found {
                        node: child,
                        address: device_index,
                    }));
                }
            }
            DeviceKind::Router => {
                router_index += 1;
                if router_index > ROUTER_INDEX_MAX {
                    return Err(TopologyError::RouterOverflow(parent.name.clone()));
                }
                if tier > 2 {
                    return Err(TopologyError::DepthExceeded(child.name.clone()));
                }
                let shift = if tier == 1 { 12 } else { 8 };
                if names_match(&child.name, self_name) {
                    return Ok(Some(Found {
                        node: child,
                        address: (router_index as u16) << shift,
                    }));
                }
                if let Some(mut found) = walk(child, self_name, tier + 1)? {
                    found.address |= (router_index as u16) << shift;
                    return Ok(Some(found));
                }
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Topology;

    fn two_tier() -> Topology {
        Topology::from_json(
            r#"{ "root": { "name": "C", "type": 1, "children": [
                    { "name": "R1", "type": 1, "children": [
                        { "name": "E1", "type": 0 },
                        { "name": "E2", "type": 0 } ] },
                    { "name": "E3", "type": 0 } ] },
                 "config": { "cycles_per_refresh": 5 } }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_coordinator_only() {
        let topo = Topology::from_json(
            r#"{ "root": { "name": "C", "type": 1, "children": [] },
                 "config": { "cycles_per_refresh": 2 } }"#,
        )
        .unwrap();
        let info = NetworkInfo::resolve(&topo, "C").unwrap();
        assert_eq!(info.router.device_type, DeviceType::Coordinator);
        assert_eq!(info.router.address, Addr::COORDINATOR);
        assert_eq!(info.router.parent, Addr::NONE);
        assert_eq!(info.slotter.self_slot, SLOT_NONE);
        assert_eq!(info.slotter.child_slot, SLOT_NONE);
        assert_eq!(info.slotter.child_slot_count, 0);
    }

    #[test]
    fn test_single_end_device() {
        let topo = Topology::from_json(
            r#"{ "root": { "name": "C", "type": 1, "children": [
                    { "name": "E1", "type": 0 } ] },
                 "config": { "cycles_per_refresh": 2 } }"#,
        )
        .unwrap();
        let info = NetworkInfo::resolve(&topo, "E1").unwrap();
        assert_eq!(info.router.device_type, DeviceType::EndDevice);
        assert_eq!(info.router.address, Addr::from_u16(0x0001));
        assert_eq!(info.router.parent, Addr::COORDINATOR);
        assert_eq!(info.slotter.self_slot, 0);
        assert_eq!(info.slotter.child_slot, SLOT_NONE);
    }

    #[test]
    fn test_first_router() {
        let info = NetworkInfo::resolve(&two_tier(), "R1").unwrap();
        assert_eq!(info.router.device_type, DeviceType::FirstRouter);
        assert_eq!(info.router.address, Addr::from_u16(0x1000));
        assert_eq!(info.router.parent, Addr::COORDINATOR);
        assert_eq!((info.router.router_count, info.router.node_count), (0, 2));
        assert_eq!(info.slotter.self_slot, 2);
        assert_eq!(info.slotter.child_slot, 0);
        assert_eq!(info.slotter.child_slot_count, 2);
        assert_eq!(info.slotter.recv_count, 2);
        assert_eq!(info.slotter.send_count, 1);
    }

    #[test]
    fn test_end_device_under_root_keeps_own_counter() {
        // E3 is the first end device under the root even though R1 is
        // declared before it
        let info = NetworkInfo::resolve(&two_tier(), "E3").unwrap();
        assert_eq!(info.router.address, Addr::from_u16(0x0001));
        assert_eq!(info.router.parent, Addr::COORDINATOR);
        assert_eq!(info.slotter.self_slot, 3);
    }

    #[test]
    fn test_three_tier_addresses() {
        let topo = Topology::from_json(
            r#"{ "root": { "name": "C", "type": 1, "children": [
                    { "name": "R1", "type": 1, "children": [
                        { "name": "R2", "type": 1, "children": [
                            { "name": "E1", "type": 0 } ] },
                        { "name": "E2", "type": 0 } ] } ] },
                 "config": { "cycles_per_refresh": 5 } }"#,
        )
        .unwrap();

        let e1 = NetworkInfo::resolve(&topo, "E1").unwrap();
        assert_eq!(e1.router.address, Addr::from_u16(0x1101));
        assert_eq!(e1.router.parent, Addr::from_u16(0x1100));

        let r2 = NetworkInfo::resolve(&topo, "R2").unwrap();
        assert_eq!(r2.router.device_type, DeviceType::SecondRouter);
        assert_eq!(r2.router.address, Addr::from_u16(0x1100));
        assert_eq!(r2.router.parent, Addr::from_u16(0x1000));
    }

    #[test]
    fn test_name_not_found() {
        assert_eq!(
            NetworkInfo::resolve(&two_tier(), "nope").unwrap_err(),
            TopologyError::NameNotFound("nope".into())
        );
    }

    #[test]
    fn test_zero_refresh_rejected() {
        let topo = Topology::from_json(
            r#"{ "root": { "name": "C", "type": 1, "children": [] },
                 "config": { "cycles_per_refresh": 0 } }"#,
        )
        .unwrap();
        assert_eq!(
            NetworkInfo::resolve(&topo, "C").unwrap_err(),
            TopologyError::ZeroRefresh
        );
    }

    #[test]
    fn test_coordinator_recv_window() {
        let info = NetworkInfo::resolve(&two_tier(), "C").unwrap();
        // listens from R1's slot through the end of the cycle
        assert_eq!(info.slotter.child_slot, 2);
        assert_eq!(info.slotter.recv_count, 2);
        assert_eq!(info.slotter.child_slot_count, 4);
        assert_eq!(info.slotter.send_count, 0);
    }

    #[test]
    fn test_error_sentinels() {
        assert_eq!(NetworkInfo::ERROR.router.device_type, DeviceType::Error);
        assert_eq!(NetworkInfo::ERROR.slotter.self_slot, SLOT_ERROR);
    }
}
