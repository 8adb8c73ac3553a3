//! Error taxonomy for the document model.
//!
//! Structural violations and precondition violations are fatal to the
//! in-flight edit: an [`Err`] aborts the surrounding session and the scratch
//! state is discarded. Unsupported-operation outcomes (merging incompatible
//! types, splitting a non-splittable node, a diverged history merge) are NOT
//! errors — they are ordinary `bool`/`Option` return values that callers
//! branch on.

use folio_delta::DeltaError;
use thiserror::Error;

use crate::node::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    // ── Structural violations ─────────────────────────────────────────────
    #[error("duplicate node id: {0}")]
    DuplicateId(NodeId),
    #[error("unknown node id: {0}")]
    UnknownNode(NodeId),
    #[error("unknown node type: {0}")]
    UnknownType(String),
    #[error("node {0} appears in more than one place of a view")]
    DuplicateInView(NodeId),
    #[error("node {node} property {property}: {reason}")]
    SchemaViolation {
        node: NodeId,
        property: String,
        reason: String,
    },
    #[error("annotation {0} range exceeds the bounds of its target property")]
    RangeOutOfBounds(NodeId),
    #[error("no container registered for view {0}")]
    UnknownContainer(NodeId),

    // ── Precondition violations ───────────────────────────────────────────
    #[error("selection must be collapsed")]
    SelectionNotCollapsed,
    #[error("selection does not address a node in the container")]
    SelectionOutOfView,

    // ── History ───────────────────────────────────────────────────────────
    #[error("unknown change ref: {0}")]
    UnknownChange(u64),
    #[error("change ref {0} already recorded")]
    DuplicateChange(u64),

    // ── Explicit stubs ────────────────────────────────────────────────────
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error(transparent)]
    Delta(#[from] DeltaError),
}
