//! Annotator — keeps annotations correctly anchored under every mutation.
//!
//! # Overview
//!
//! Annotations reference text they do not own: an inline annotation anchors
//! `[start, end)` into some node's text property, a multi-node annotation
//! anchors two independent `(path, offset)` points. Whenever the graph
//! applies an operation, [`react`] computes the fix-up operations that keep
//! every affected annotation consistent:
//!
//! - a text delta on an anchored property re-ranges each annotation through
//!   the range transform, using the annotation type's expansion policy for
//!   boundary tie-breaks; a range that collapses means the annotated text is
//!   gone and the annotation is deleted;
//! - deleting a node, or wholesale-replacing an anchored property, deletes
//!   every annotation anchored there — there is no text left to point at.
//!
//! The fix-ups are themselves ordinary operations and flow back through the
//! graph pipeline, so indexes see them like any other mutation.

use std::collections::BTreeSet;

use folio_delta::{transform_anchor, transform_range, AnchorSide, TextDelta};
use serde_json::{json, Value};

use crate::container::Container;
use crate::document::DocumentState;
use crate::error::DocumentError;
use crate::node::{Node, NodeId, PropertyPath};
use crate::operation::{Operation, PropertyDelta};
use crate::selection::{Coordinate, Selection};

// ── Reconciliation ────────────────────────────────────────────────────────

/// Compute the fix-up operations entailed by an applied operation.
pub fn react(op: &Operation, state: &DocumentState) -> Result<Vec<Operation>, DocumentError> {
    match op {
        Operation::Update {
            path,
            delta: PropertyDelta::Text(delta),
        } => react_to_text_delta(path, delta, state),
        Operation::Set { path, .. } => react_to_path_reset(path, state),
        Operation::Delete { node } => react_to_node_delete(&node.id, state),
        _ => Ok(Vec::new()),
    }
}

fn react_to_text_delta(
    path: &PropertyPath,
    delta: &TextDelta,
    state: &DocumentState,
) -> Result<Vec<Operation>, DocumentError> {
    let mut ops = Vec::new();

    for ann_id in state.annotation_index.at_path(path) {
        let ann = state.get(&ann_id)?;
        let (start, end) = ann.range()?;
        let expand = state.schema.expansion(&ann.node_type);
        match transform_range(start, end, delta, expand) {
            Some((new_start, new_end)) => {
                if (new_start, new_end) != (start, end) {
                    ops.push(set_op(state, &ann_id, "range", json!([new_start, new_end]))?);
                }
            }
            // The annotated text vanished.
            None => ops.push(delete_op(state, &ann_id)?),
        }
    }

    for ann_id in state.fragment_index.at_node(&path.node) {
        let ann = state.get(&ann_id)?;
        let expand = state.schema.expansion(&ann.node_type);
        let (start_path, start_offset) = ann.start_anchor()?;
        let (end_path, end_offset) = ann.end_anchor()?;

        let new_start = if start_path == *path {
            transform_anchor(start_offset, delta, AnchorSide::Start, expand)
        } else {
            start_offset
        };
        let new_end = if end_path == *path {
            transform_anchor(end_offset, delta, AnchorSide::End, expand)
        } else {
            end_offset
        };

        if start_path == end_path && new_start >= new_end {
            ops.push(delete_op(state, &ann_id)?);
            continue;
        }
        if new_start != start_offset {
            ops.push(set_op(state, &ann_id, "start_offset", json!(new_start))?);
        }
        if new_end != end_offset {
            ops.push(set_op(state, &ann_id, "end_offset", json!(new_end))?);
        }
    }

    Ok(ops)
}

/// A wholesale property replacement invalidates every range anchored into
/// the replaced value.
fn react_to_path_reset(
    path: &PropertyPath,
    state: &DocumentState,
) -> Result<Vec<Operation>, DocumentError> {
    let mut ops = Vec::new();
    for ann_id in state.annotation_index.at_path(path) {
        ops.push(delete_op(state, &ann_id)?);
    }
    for ann_id in state.fragment_index.at_node(&path.node) {
        let ann = state.get(&ann_id)?;
        let anchored = ann.start_anchor()?.0 == *path || ann.end_anchor()?.0 == *path;
        if anchored {
            ops.push(delete_op(state, &ann_id)?);
        }
    }
    Ok(ops)
}

fn react_to_node_delete(
    node: &NodeId,
    state: &DocumentState,
) -> Result<Vec<Operation>, DocumentError> {
    let mut ops = Vec::new();
    for ann_id in state.annotation_index.at_node(node) {
        ops.push(delete_op(state, &ann_id)?);
    }
    for ann_id in state.fragment_index.at_node(node) {
        ops.push(delete_op(state, &ann_id)?);
    }
    Ok(ops)
}

fn set_op(
    state: &DocumentState,
    node: &NodeId,
    property: &str,
    new: Value,
) -> Result<Operation, DocumentError> {
    let old = state
        .get(node)?
        .get(property)
        .cloned()
        .unwrap_or(Value::Null);
    Ok(Operation::Set {
        path: PropertyPath::new(node.clone(), property),
        old,
        new,
    })
}

fn delete_op(state: &DocumentState, node: &NodeId) -> Result<Operation, DocumentError> {
    Ok(Operation::Delete {
        node: state.get(node)?.clone(),
    })
}

// ── Selection queries ─────────────────────────────────────────────────────

/// All annotations overlapping the selection, inline and multi-node.
///
/// Overlap is `(annEnd > selStart) && (annStart < selEnd)` with boundary
/// ties admitted by the annotation type's expansion flags, so a zero-width
/// cursor exactly at a bold run's edge is "inside" it only when the type
/// expands across that edge.
pub fn annotations_for_selection(
    state: &DocumentState,
    container: &Container,
    selection: &Selection,
) -> Result<Vec<NodeId>, DocumentError> {
    let sel = selection.normalized();
    let ranges = sel.ranges(container, &state.store, &state.schema)?;
    let mut out = Vec::new();
    let mut seen: BTreeSet<NodeId> = BTreeSet::new();

    for range in &ranges {
        let Some(property) = &range.property else {
            continue;
        };
        let path = PropertyPath::new(range.node.clone(), property.as_str());
        for ann_id in state.annotation_index.at_path(&path) {
            let ann = state.get(&ann_id)?;
            let (start, end) = ann.range()?;
            let expand = state.schema.expansion(&ann.node_type);
            let left = end > range.start || (expand.right && end == range.start);
            let right = start < range.end || (expand.left && start == range.end);
            if left && right && seen.insert(ann_id.clone()) {
                out.push(ann_id);
            }
        }
    }

    for range in &ranges {
        for ann_id in state.fragment_index.at_node(&range.node) {
            if seen.contains(&ann_id) {
                continue;
            }
            let ann = state.get(&ann_id)?;
            let expand = state.schema.expansion(&ann.node_type);
            let (start_path, start_offset) = ann.start_anchor()?;
            let (end_path, end_offset) = ann.end_anchor()?;
            let (Some(start_pos), Some(end_pos)) = (
                container.position_of(&start_path.node),
                container.position_of(&end_path.node),
            ) else {
                continue;
            };
            let ann_start = Coordinate::new(start_pos, start_offset);
            let ann_end = Coordinate::new(end_pos, end_offset);
            let left = ann_end > sel.start || (expand.right && ann_end == sel.start);
            let right = ann_start < sel.end || (expand.left && ann_start == sel.end);
            if left && right && seen.insert(ann_id.clone()) {
                out.push(ann_id);
            }
        }
    }

    Ok(out)
}

// ── Copy & transfer ───────────────────────────────────────────────────────

/// Clone the annotations overlapping `[start, end)` of one text property,
/// with ranges clamped to the cut and rebased to fragment-local coordinates.
/// The clones keep their anchor node id — the paster remaps ids.
pub fn copy_annotations(
    state: &DocumentState,
    path: &PropertyPath,
    start: usize,
    end: usize,
) -> Result<Vec<Node>, DocumentError> {
    let mut out = Vec::new();
    for ann_id in state.annotation_index.at_path(path) {
        let ann = state.get(&ann_id)?;
        let (ann_start, ann_end) = ann.range()?;
        if ann_end <= start || ann_start >= end {
            continue;
        }
        let mut clone = ann.clone();
        clone.properties.insert(
            "range".to_string(),
            json!([ann_start.max(start) - start, ann_end.min(end) - start]),
        );
        out.push(clone);
    }
    Ok(out)
}

/// Fix-ups moving annotations across a split or merge seam.
///
/// Every annotation on `from` whose range begins at or after `from_offset`
/// is re-homed to `to` with its range rebased by `to_offset`. An annotation
/// straddling the seam is truncated on the `from` side and, when its type is
/// splittable, cloned onto the `to` side for the cut-away part. Multi-node
/// anchor points at or after the seam are re-homed the same way.
pub fn transfer_annotations(
    state: &DocumentState,
    from: &PropertyPath,
    from_offset: usize,
    to: &PropertyPath,
    to_offset: usize,
) -> Result<Vec<Operation>, DocumentError> {
    let mut ops = Vec::new();

    for ann_id in state.annotation_index.at_path(from) {
        let ann = state.get(&ann_id)?;
        let (start, end) = ann.range()?;
        if start >= from_offset {
            ops.push(set_op(state, &ann_id, "path", to.to_value())?);
            ops.push(set_op(
                state,
                &ann_id,
                "range",
                json!([start - from_offset + to_offset, end - from_offset + to_offset]),
            )?);
        } else if end > from_offset {
            ops.push(set_op(state, &ann_id, "range", json!([start, from_offset]))?);
            if state.schema.get(&ann.node_type)?.splittable {
                let mut clone = ann.clone();
                clone.id = NodeId::random(&ann.node_type);
                clone
                    .properties
                    .insert("path".to_string(), to.to_value());
                clone.properties.insert(
                    "range".to_string(),
                    json!([to_offset, end - from_offset + to_offset]),
                );
                ops.push(Operation::Create { node: clone });
            }
        }
    }

    for ann_id in state.fragment_index.at_node(&from.node) {
        let ann = state.get(&ann_id)?;
        let (start_path, start_offset) = ann.start_anchor()?;
        if start_path == *from && start_offset >= from_offset {
            ops.push(set_op(state, &ann_id, "start_path", to.to_value())?);
            ops.push(set_op(
                state,
                &ann_id,
                "start_offset",
                json!(start_offset - from_offset + to_offset),
            )?);
        }
        let (end_path, end_offset) = ann.end_anchor()?;
        if end_path == *from && end_offset >= from_offset {
            ops.push(set_op(state, &ann_id, "end_path", to.to_value())?);
            ops.push(set_op(
                state,
                &ann_id,
                "end_offset",
                json!(end_offset - from_offset + to_offset),
            )?);
        }
    }

    Ok(ops)
}
