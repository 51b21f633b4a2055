//! Topology description
//!
//! A network is authored as a JSON tree of named devices. The root object
//! is the coordinator itself plus a `config` block; every other node is a
//! router (`"type": 1`) or an end device (`"type": 0`):
//!
//! ```json
//! {
//!   "root": {
//!     "name": "C", "type": 1,
//!     "children": [
//!       { "name": "R1", "type": 1, "sensor": true,
//!         "children": [ { "name": "E1", "type": 0 } ] },
//!       { "name": "E2", "type": 0 }
//!     ]
//!   },
//!   "config": { "cycles_per_refresh": 5 }
//! }
//! ```
//!
//! The description is immutable after boot; the resolver and the slot
//! pre-pass read it, nothing writes it.

use crate::address::STRING_MAX;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while turning a topology into routing and slot state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("device `{0}` does not appear in the topology")]
    NameNotFound(String),
    #[error("more than 15 router children under `{0}`")]
    RouterOverflow(String),
    #[error("more than 255 end-device children under `{0}`")]
    NodeOverflow(String),
    #[error("router `{0}` is nested below the second router tier")]
    DepthExceeded(String),
    #[error("schedule requires {0} slots, more than the 254 supported")]
    SlotOverflow(u16),
    #[error("cycles_per_refresh must be at least 1")]
    ZeroRefresh,
}

/// What kind of node a topology entry describes. On the wire this is the
/// JSON `type` field: 0 for an end device, 1 for a router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DeviceKind {
    EndDevice,
    Router,
}

impl TryFrom<u8> for DeviceKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DeviceKind::EndDevice),
            1 => Ok(DeviceKind::Router),
            other => Err(format!("invalid device type {other} (expected 0 or 1)")),
        }
    }
}

impl From<DeviceKind> for u8 {
    fn from(kind: DeviceKind) -> u8 {
        match kind {
            DeviceKind::EndDevice => 0,
            DeviceKind::Router => 1,
        }
    }
}

/// One node of the authored tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDesc {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    /// Routers with a sensor attached transmit a reading of their own in
    /// addition to relaying their subtree.
    #[serde(default)]
    pub sensor: bool,
    #[serde(default)]
    pub children: Vec<NodeDesc>,
}

impl NodeDesc {
    pub fn is_router(&self) -> bool {
        self.kind == DeviceKind::Router
    }

    /// The highest-priority direct child: the first router child if any,
    /// otherwise the first end-device child.
    pub fn first_child(&self) -> Option<&NodeDesc> {
        self.children
            .iter()
            .find(|c| c.is_router())
            .or_else(|| self.children.first())
    }

    /// Count direct children: `(routers, end devices)`.
    pub fn child_counts(&self) -> (usize, usize) {
        let routers = self.children.iter().filter(|c| c.is_router()).count();
        (routers, self.children.len() - routers)
    }
}

/// Network-wide settings carried alongside the tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NetConfig {
    /// Data cycles between coordinator-driven re-synchronizations.
    pub cycles_per_refresh: u8,
}

/// The full authored network description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    pub root: NodeDesc,
    pub config: NetConfig,
}

impl Topology {
    /// Parse a topology from its JSON form. Structural problems (missing
    /// `type`, a null child entry, malformed JSON) fail here.
    pub fn from_json(json: &str) -> serde_json::Result<Topology> {
        serde_json::from_str(json)
    }
}

/// Bounded device-name comparison: only the first [`STRING_MAX`] bytes
/// participate, mirroring the fixed-size name buffers on the nodes.
pub fn names_match(a: &str, b: &str) -> bool {
    let a = &a.as_bytes()[..a.len().min(STRING_MAX)];
    let b = &b.as_bytes()[..b.len().min(STRING_MAX)];
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let topo = Topology::from_json(
            r#"{ "root": { "name": "C", "type": 1, "children": [] },
                 "config": { "cycles_per_refresh": 5 } }"#,
        )
        .unwrap();
        assert_eq!(topo.root.name, "C");
        assert_eq!(topo.root.kind, DeviceKind::Router);
        assert!(topo.root.children.is_empty());
        assert_eq!(topo.config.cycles_per_refresh, 5);
    }

    #[test]
    fn test_parse_defaults() {
        let topo = Topology::from_json(
            r#"{ "root": { "name": "C", "type": 1,
                           "children": [ { "name": "E1", "type": 0 } ] },
                 "config": { "cycles_per_refresh": 2 } }"#,
        )
        .unwrap();
        let e1 = &topo.root.children[0];
        assert!(!e1.sensor);
        assert!(e1.children.is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_type() {
        let err = Topology::from_json(
            r#"{ "root": { "name": "C", "type": 7, "children": [] },
                 "config": { "cycles_per_refresh": 1 } }"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_parse_rejects_missing_type() {
        let err = Topology::from_json(
            r#"{ "root": { "name": "C", "type": 1,
                           "children": [ { "name": "E1" } ] },
                 "config": { "cycles_per_refresh": 1 } }"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_parse_rejects_null_child() {
        let err = Topology::from_json(
            r#"{ "root": { "name": "C", "type": 1, "children": [ null ] },
                 "config": { "cycles_per_refresh": 1 } }"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_names_match_is_bounded() {
        let long_a = "a".repeat(40);
        let long_b = format!("{}bbbb", "a".repeat(STRING_MAX));
        assert!(names_match(&long_a, &long_a));
        // differ only past the comparison window
        assert!(names_match(&long_a, &long_b));
        assert!(!names_match("E1", "E2"));
    }

    #[test]
    fn test_first_child_prefers_routers() {
        let topo = Topology::from_json(
            r#"{ "root": { "name": "C", "type": 1, "children": [
                    { "name": "E1", "type": 0 },
                    { "name": "R1", "type": 1, "children": [] } ] },
                 "config": { "cycles_per_refresh": 1 } }"#,
        )
        .unwrap();
        assert_eq!(topo.root.first_child().unwrap().name, "R1");
        assert_eq!(topo.root.child_counts(), (1, 1));
    }
}
