//! The canonical graph operations.
//!
//! Every mutation of the document graph is one of four operations, each
//! atomic and independently invertible. The operation records carry enough
//! state (`Delete` keeps the full node, `Set` keeps the old value, deltas
//! are reversible) that inverting a recorded op list rewinds the graph
//! exactly — the change history depends on this.

use folio_delta::{ArrayDelta, TextDelta};
use serde_json::Value;

use crate::node::{Node, NodeId, PropertyPath};

// ── Deltas ────────────────────────────────────────────────────────────────

/// Structural diff payload of an `Update` operation, dispatched by the
/// target property's value type.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyDelta {
    Text(TextDelta),
    Array(ArrayDelta<Value>),
}

impl PropertyDelta {
    pub fn invert(&self) -> PropertyDelta {
        match self {
            PropertyDelta::Text(delta) => PropertyDelta::Text(folio_delta::invert(delta)),
            PropertyDelta::Array(delta) => PropertyDelta::Array(delta.invert()),
        }
    }
}

// ── Operations ────────────────────────────────────────────────────────────

/// A primitive graph mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Register a new node. Fails when the id is already present.
    Create { node: Node },
    /// Remove a node. The record is kept so the inverse restores it; the
    /// caller is responsible for detaching references first — the graph
    /// does not cascade.
    Delete { node: Node },
    /// Replace one property wholesale.
    Set {
        path: PropertyPath,
        old: Value,
        new: Value,
    },
    /// Apply a structural delta to one property.
    Update {
        path: PropertyPath,
        delta: PropertyDelta,
    },
}

impl Operation {
    /// Id of the node this operation touches.
    pub fn node_id(&self) -> &NodeId {
        match self {
            Operation::Create { node } | Operation::Delete { node } => &node.id,
            Operation::Set { path, .. } | Operation::Update { path, .. } => &path.node,
        }
    }

    /// Property path for `Set`/`Update`; `None` for whole-node operations.
    pub fn path(&self) -> Option<&PropertyPath> {
        match self {
            Operation::Set { path, .. } | Operation::Update { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The operation undoing this one.
    pub fn invert(&self) -> Operation {
        match self {
            Operation::Create { node } => Operation::Delete { node: node.clone() },
            Operation::Delete { node } => Operation::Create { node: node.clone() },
            Operation::Set { path, old, new } => Operation::Set {
                path: path.clone(),
                old: new.clone(),
                new: old.clone(),
            },
            Operation::Update { path, delta } => Operation::Update {
                path: path.clone(),
                delta: delta.invert(),
            },
        }
    }
}
