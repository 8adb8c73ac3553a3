//! Edit sessions — speculative, transactional manipulation of a document.
//!
//! # Overview
//!
//! A [`Session`] runs against a scratch clone of the document state. Every
//! high-level algorithm here (split, merge, join, delete-selection, paste)
//! emits primitive operations through the normal graph pipeline, so indexes,
//! containers, and annotations stay synchronized between consecutive
//! primitives *inside* the session. Nothing becomes observable until the
//! session commits: [`Document::edit`](crate::document::Document::edit)
//! swaps the scratch state in and records the session's complete op list as
//! one history change, or drops the scratch on error.
//!
//! Unsupported outcomes are ordinary values: `split_node` returns `None`
//! for a non-splittable type, `merge_nodes`/`join` return `false` for
//! incompatible types. Callers branch; nothing unwinds.

use std::collections::BTreeMap;

use folio_delta::{delete_at, insert_at, ArrayDelta, TextDelta};
use serde_json::{json, Value};

use crate::annotator;
use crate::document::DocumentState;
use crate::error::DocumentError;
use crate::node::{Node, NodeId, PropertyPath};
use crate::operation::{Operation, PropertyDelta};
use crate::selection::{Coordinate, Selection};

// ── Clipboard ─────────────────────────────────────────────────────────────

/// Detached document content: ordered leaf nodes plus the annotations
/// anchored into them (with fragment-local ranges). Produced by copy/cut,
/// consumed by paste. Node ids inside a fragment are placeholders — paste
/// mints fresh ids and remaps annotation anchors.
#[derive(Debug, Clone, Default)]
pub struct DocumentFragment {
    pub nodes: Vec<Node>,
    pub annotations: Vec<Node>,
}

impl DocumentFragment {
    pub fn new(nodes: Vec<Node>, annotations: Vec<Node>) -> Self {
        Self { nodes, annotations }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Copy the selected content out of the document without mutating it.
///
/// Each spanned leaf contributes one node clone (text clamped to the
/// selected slice) and the annotations overlapping that slice, rebased to
/// slice-local coordinates — each per-leaf range is copied independently
/// and the results unioned.
pub fn copy_selection(
    state: &DocumentState,
    view: &NodeId,
    selection: &Selection,
) -> Result<DocumentFragment, DocumentError> {
    let container = state.container(view)?;
    let ranges = selection
        .normalized()
        .ranges(container, &state.store, &state.schema)?;
    let mut nodes = Vec::new();
    let mut annotations = Vec::new();
    for range in ranges {
        let mut node = state.get(&range.node)?.clone();
        if let Some(property) = &range.property {
            let text = node.string_prop(property)?;
            let slice: String = text
                .chars()
                .skip(range.start)
                .take(range.end - range.start)
                .collect();
            node.properties.insert(property.clone(), json!(slice));
            annotations.extend(annotator::copy_annotations(
                state,
                &PropertyPath::new(range.node.clone(), property.as_str()),
                range.start,
                range.end,
            )?);
        }
        nodes.push(node);
    }
    Ok(DocumentFragment { nodes, annotations })
}

// ── Session ───────────────────────────────────────────────────────────────

/// A speculative edit against a scratch state clone.
pub struct Session {
    state: DocumentState,
    ops: Vec<Operation>,
}

impl Session {
    pub(crate) fn new(state: DocumentState) -> Self {
        Self {
            state,
            ops: Vec::new(),
        }
    }

    pub(crate) fn into_parts(self) -> (DocumentState, Vec<Operation>) {
        (self.state, self.ops)
    }

    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    /// Feed one operation (plus its annotation fix-ups) through the
    /// pipeline, recording everything actually applied.
    pub fn apply(&mut self, op: Operation) -> Result<(), DocumentError> {
        let applied = self.state.apply(op)?;
        self.ops.extend(applied);
        Ok(())
    }

    // ── Primitive helpers ─────────────────────────────────────────────────

    pub fn create(&mut self, node: Node) -> Result<NodeId, DocumentError> {
        let id = node.id.clone();
        self.apply(Operation::Create { node })?;
        Ok(id)
    }

    pub fn delete(&mut self, id: &NodeId) -> Result<(), DocumentError> {
        let node = self.state.get(id)?.clone();
        self.apply(Operation::Delete { node })
    }

    pub fn set(&mut self, path: PropertyPath, new: Value) -> Result<(), DocumentError> {
        let old = self
            .state
            .get(&path.node)?
            .get(&path.property)
            .cloned()
            .unwrap_or(Value::Null);
        self.apply(Operation::Set { path, old, new })
    }

    pub fn update_text(&mut self, path: PropertyPath, delta: TextDelta) -> Result<(), DocumentError> {
        self.apply(Operation::Update {
            path,
            delta: PropertyDelta::Text(delta),
        })
    }

    pub fn update_array(
        &mut self,
        path: PropertyPath,
        delta: ArrayDelta<Value>,
    ) -> Result<(), DocumentError> {
        self.apply(Operation::Update {
            path,
            delta: PropertyDelta::Array(delta),
        })
    }

    // ── Structural helpers ────────────────────────────────────────────────

    /// The composite (or the view node itself) whose id list holds `id`,
    /// plus that owner's items property.
    fn owner_of(&self, view: &NodeId, id: &NodeId) -> Result<(NodeId, String), DocumentError> {
        let container = self.state.container(view)?;
        let owner = match container.parent_of(id) {
            Some(parent) => parent.clone(),
            None if container.contains(id) => view.clone(),
            None => return Err(DocumentError::SelectionOutOfView),
        };
        let owner_type = self.state.get(&owner)?.node_type.clone();
        let items = self
            .state
            .schema
            .items_property(&owner_type)
            .map(str::to_string)
            .ok_or_else(|| DocumentError::UnknownContainer(owner.clone()))?;
        Ok((owner, items))
    }

    fn index_in(&self, owner: &NodeId, items: &str, id: &NodeId) -> Result<usize, DocumentError> {
        self.state
            .get(owner)?
            .id_list_prop(items)?
            .iter()
            .position(|entry| entry == id)
            .ok_or_else(|| DocumentError::UnknownNode(id.clone()))
    }

    fn remove_id(&mut self, owner: &NodeId, items: &str, id: &NodeId) -> Result<usize, DocumentError> {
        let pos = self.index_in(owner, items, id)?;
        self.update_array(
            PropertyPath::new(owner.clone(), items),
            ArrayDelta::Delete {
                pos,
                value: json!(id.as_str()),
            },
        )?;
        Ok(pos)
    }

    fn insert_id(
        &mut self,
        owner: &NodeId,
        items: &str,
        pos: usize,
        id: &NodeId,
    ) -> Result<(), DocumentError> {
        self.update_array(
            PropertyPath::new(owner.clone(), items),
            ArrayDelta::Insert {
                pos,
                value: json!(id.as_str()),
            },
        )
    }

    fn insert_after(&mut self, view: &NodeId, anchor: &NodeId, id: &NodeId) -> Result<(), DocumentError> {
        let (owner, items) = self.owner_of(view, anchor)?;
        let pos = self.index_in(&owner, &items, anchor)?;
        self.insert_id(&owner, &items, pos + 1, id)
    }

    /// Remove `id` from whichever id list holds it. Returns the owning
    /// composite, or `None` when `id` was a top-level entry of the view.
    fn detach(&mut self, view: &NodeId, id: &NodeId) -> Result<Option<NodeId>, DocumentError> {
        let (owner, items) = self.owner_of(view, id)?;
        self.remove_id(&owner, &items, id)?;
        Ok(if owner == *view { None } else { Some(owner) })
    }

    /// Delete emptied composites, walking up as deletions cascade.
    fn prune_if_empty(&mut self, view: &NodeId, composite: NodeId) -> Result<(), DocumentError> {
        let mut current = Some(composite);
        while let Some(id) = current {
            if id == *view || !self.state.contains(&id) {
                break;
            }
            let node_type = self.state.get(&id)?.node_type.clone();
            let Some(items) = self.state.schema.items_property(&node_type).map(str::to_string)
            else {
                break;
            };
            if !self.state.get(&id)?.id_list_prop(&items)?.is_empty() {
                break;
            }
            let parent = self.detach(view, &id)?;
            self.delete(&id)?;
            current = parent;
        }
        Ok(())
    }

    // ── Manipulation algorithms ───────────────────────────────────────────

    /// Split a text node at `char_pos`: a new node of the type's configured
    /// split successor takes the tail text and the annotations beyond the
    /// seam, and lands immediately after the original. Returns `None` for
    /// types that declare no split successor.
    pub fn split_node(
        &mut self,
        view: &NodeId,
        node_id: &NodeId,
        char_pos: usize,
    ) -> Result<Option<NodeId>, DocumentError> {
        let node = self.state.get(node_id)?.clone();
        let spec = self.state.schema.get(&node.node_type)?;
        let (Some(target_type), Some(text_prop)) =
            (spec.split_into.clone(), spec.text_property.clone())
        else {
            return Ok(None);
        };
        let Some(target_prop) = self
            .state
            .schema
            .text_property(&target_type)
            .map(str::to_string)
        else {
            return Ok(None);
        };

        let text = node.string_prop(&text_prop)?.to_string();
        let char_pos = char_pos.min(text.chars().count());
        let tail: String = text.chars().skip(char_pos).collect();

        let new_id = NodeId::random(&target_type);
        self.create(Node::new(new_id.clone(), target_type).with(&target_prop, json!(tail)))?;

        // Re-home the annotations first; the truncation delta below then
        // only sees ranges that end at or before the seam.
        let from = PropertyPath::new(node_id.clone(), text_prop);
        let to = PropertyPath::new(new_id.clone(), target_prop);
        for op in annotator::transfer_annotations(&self.state, &from, char_pos, &to, 0)? {
            self.apply(op)?;
        }
        if !tail.is_empty() {
            self.update_text(from, delete_at(char_pos, &tail))?;
        }
        self.insert_after(view, node_id, &new_id)?;
        Ok(Some(new_id))
    }

    /// Append `source`'s content to `target`, move its annotations across,
    /// and delete it. Returns `false` when `source`'s type does not declare
    /// `target`'s type mergeable.
    pub fn merge_nodes(
        &mut self,
        view: &NodeId,
        source: &NodeId,
        target: &NodeId,
    ) -> Result<bool, DocumentError> {
        let source_node = self.state.get(source)?.clone();
        let target_node = self.state.get(target)?.clone();
        let source_spec = self.state.schema.get(&source_node.node_type)?;
        if !source_spec.mergeable_with.contains(&target_node.node_type) {
            return Ok(false);
        }
        let (Some(source_prop), Some(target_prop)) = (
            source_spec.text_property.clone(),
            self.state
                .schema
                .text_property(&target_node.node_type)
                .map(str::to_string),
        ) else {
            return Ok(false);
        };

        let target_len = target_node.text_len(&target_prop)?;
        let source_text = source_node.string_prop(&source_prop)?.to_string();
        let source_path = PropertyPath::new(source.clone(), source_prop);
        let target_path = PropertyPath::new(target.clone(), target_prop);

        if !source_text.is_empty() {
            self.update_text(target_path.clone(), insert_at(target_len, &source_text))?;
        }
        for op in
            annotator::transfer_annotations(&self.state, &source_path, 0, &target_path, target_len)?
        {
            self.apply(op)?;
        }
        self.detach(view, source)?;
        self.delete(source)?;
        Ok(true)
    }

    /// Composite-aware merge of two leaves. After the leaf merge, walks the
    /// two parent chains upward: at each level where the parents differ and
    /// are mutually joinable, splices the second parent's remaining children
    /// into the first at the insertion point and deletes the emptied parent.
    /// Handles arbitrary nesting depth.
    pub fn join(
        &mut self,
        view: &NodeId,
        first: &NodeId,
        second: &NodeId,
    ) -> Result<bool, DocumentError> {
        // Parent chains captured before the merge removes `second`.
        let (mut parent_a, mut parent_b) = {
            let container = self.state.container(view)?;
            (
                container.parent_of(first).cloned(),
                container.parent_of(second).cloned(),
            )
        };
        if !self.merge_nodes(view, second, first)? {
            return Ok(false);
        }

        let mut anchor = first.clone();
        while let (Some(a), Some(b)) = (parent_a.clone(), parent_b.clone()) {
            if a == b {
                break;
            }
            let (grand_a, grand_b) = {
                let container = self.state.container(view)?;
                (
                    container.parent_of(&a).cloned(),
                    container.parent_of(&b).cloned(),
                )
            };
            let a_type = self.state.get(&a)?.node_type.clone();
            let b_type = self.state.get(&b)?.node_type.clone();
            if !self.state.schema.get(&b_type)?.mergeable_with.contains(&a_type) {
                break;
            }
            let a_items = self
                .state
                .schema
                .items_property(&a_type)
                .map(str::to_string)
                .ok_or_else(|| DocumentError::UnknownContainer(a.clone()))?;
            let b_items = self
                .state
                .schema
                .items_property(&b_type)
                .map(str::to_string)
                .ok_or_else(|| DocumentError::UnknownContainer(b.clone()))?;

            // Splice b's remaining children into a, right after the branch
            // that led down to the merged leaf. Each child is removed before
            // it is inserted so no id is ever doubly referenced.
            let children = self.state.get(&b)?.id_list_prop(&b_items)?;
            let base = self.index_in(&a, &a_items, &anchor)? + 1;
            for (offset, child) in children.iter().enumerate() {
                self.remove_id(&b, &b_items, child)?;
                self.insert_id(&a, &a_items, base + offset, child)?;
            }
            self.detach(view, &b)?;
            self.delete(&b)?;

            anchor = a;
            parent_a = grand_a;
            parent_b = grand_b;
        }
        Ok(true)
    }

    /// Delete the selected content. Fully covered leaves are detached and
    /// deleted (emptied composites pruned); partially covered text nodes
    /// lose the covered slice; a selection spanning nodes ends with an
    /// opportunistic join of the two remnants. Returns the collapsed
    /// selection at the deletion point.
    pub fn delete_selection(
        &mut self,
        view: &NodeId,
        selection: &Selection,
    ) -> Result<Selection, DocumentError> {
        let sel = selection.normalized();
        if sel.is_collapsed() {
            return Ok(sel);
        }
        let ranges = {
            let container = self.state.container(view)?;
            sel.ranges(container, &self.state.store, &self.state.schema)?
        };
        let first = ranges.first().cloned().expect("non-collapsed selection spans a node");
        let last = ranges.last().cloned().expect("non-collapsed selection spans a node");
        let spans = ranges.len() > 1;

        for range in &ranges {
            if range.fully_covers {
                let parent = self.detach(view, &range.node)?;
                self.delete(&range.node)?;
                if let Some(parent) = parent {
                    self.prune_if_empty(view, parent)?;
                }
            } else if let Some(property) = &range.property {
                let text = self.state.get(&range.node)?.string_prop(property)?.to_string();
                let deleted: String = text
                    .chars()
                    .skip(range.start)
                    .take(range.end - range.start)
                    .collect();
                if !deleted.is_empty() {
                    self.update_text(
                        PropertyPath::new(range.node.clone(), property.as_str()),
                        delete_at(range.start, &deleted),
                    )?;
                }
            }
        }

        if spans && !first.fully_covers && !last.fully_covers {
            self.join(view, &first.node, &last.node)?;
        }
        Ok(Selection::collapsed(sel.start.node_pos, sel.start.char_pos))
    }

    /// Type text at the selection (deleting it first when non-collapsed).
    /// Typing into a non-text leaf is a no-op.
    pub fn insert_text(
        &mut self,
        view: &NodeId,
        selection: &Selection,
        text: &str,
    ) -> Result<Selection, DocumentError> {
        let sel = if selection.is_collapsed() {
            selection.normalized()
        } else {
            self.delete_selection(view, selection)?
        };
        let Coordinate { node_pos, char_pos } = sel.start;
        let node_id = self
            .state
            .container(view)?
            .node_at(node_pos)
            .cloned()
            .ok_or(DocumentError::SelectionOutOfView)?;
        let node_type = self.state.get(&node_id)?.node_type.clone();
        let Some(property) = self.state.schema.text_property(&node_type).map(str::to_string)
        else {
            return Ok(sel);
        };
        if !text.is_empty() {
            self.update_text(PropertyPath::new(node_id, property), insert_at(char_pos, text))?;
        }
        Ok(Selection::collapsed(node_pos, char_pos + text.chars().count()))
    }

    /// Insert a new node at a collapsed selection. A cursor at the end of a
    /// node whose split successor matches the requested type reuses the
    /// split (yielding the empty successor); otherwise the node goes in
    /// after the cursor position, splitting the current node first when the
    /// cursor sits mid-text.
    pub fn insert_node(
        &mut self,
        view: &NodeId,
        selection: &Selection,
        node_type: Option<&str>,
        properties: &[(&str, Value)],
    ) -> Result<(NodeId, Selection), DocumentError> {
        if !selection.is_collapsed() {
            return Err(DocumentError::SelectionNotCollapsed);
        }
        let Coordinate { node_pos, char_pos } = selection.normalized().start;
        let current_id = self
            .state
            .container(view)?
            .node_at(node_pos)
            .cloned()
            .ok_or(DocumentError::SelectionOutOfView)?;
        let current_type = self.state.get(&current_id)?.node_type.clone();
        let spec = self.state.schema.get(&current_type)?.clone();
        let text_len = match &spec.text_property {
            Some(property) => self.state.get(&current_id)?.text_len(property)?,
            None => 0,
        };
        let requested = node_type
            .map(str::to_string)
            .or_else(|| spec.split_into.clone())
            .unwrap_or(current_type);

        if char_pos >= text_len
            && spec.split_into.as_deref() == Some(requested.as_str())
            && properties.is_empty()
        {
            if let Some(new_id) = self.split_node(view, &current_id, char_pos)? {
                return Ok((new_id, Selection::collapsed(node_pos + 1, 0)));
            }
        }

        if char_pos < text_len {
            self.split_node(view, &current_id, char_pos)?;
        }
        let new_id = NodeId::random(&requested);
        let mut node = Node::new(new_id.clone(), requested);
        for (property, value) in properties {
            node = node.with(property, value.clone());
        }
        self.create(node)?;
        self.insert_after(view, &current_id, &new_id)?;
        Ok((new_id, Selection::collapsed(node_pos + 1, 0)))
    }

    /// Copy the selection out of the session's current state.
    pub fn copy_selection(
        &self,
        view: &NodeId,
        selection: &Selection,
    ) -> Result<DocumentFragment, DocumentError> {
        copy_selection(&self.state, view, selection)
    }

    /// Copy, then delete. Returns the fragment and the collapsed selection.
    pub fn cut_selection(
        &mut self,
        view: &NodeId,
        selection: &Selection,
    ) -> Result<(DocumentFragment, Selection), DocumentError> {
        let fragment = self.copy_selection(view, selection)?;
        let sel = self.delete_selection(view, selection)?;
        Ok((fragment, sel))
    }

    /// Paste a fragment at a collapsed selection. A non-collapsed selection
    /// is a caller contract violation — delete it first.
    ///
    /// One same-type text node is inlined at the cursor; multi-node content
    /// goes in after a split at the cursor, and the first/last inserted
    /// nodes are opportunistically merged with their new neighbours.
    pub fn paste(
        &mut self,
        view: &NodeId,
        selection: &Selection,
        fragment: &DocumentFragment,
    ) -> Result<Selection, DocumentError> {
        if !selection.is_collapsed() {
            return Err(DocumentError::SelectionNotCollapsed);
        }
        if fragment.nodes.is_empty() {
            return Ok(*selection);
        }
        let Coordinate { node_pos, char_pos } = selection.normalized().start;
        let target_id = self
            .state
            .container(view)?
            .node_at(node_pos)
            .cloned()
            .ok_or(DocumentError::SelectionOutOfView)?;
        let target_type = self.state.get(&target_id)?.node_type.clone();
        let target_prop = self.state.schema.text_property(&target_type).map(str::to_string);

        // Fresh identity for everything pasted.
        let id_map: BTreeMap<NodeId, NodeId> = fragment
            .nodes
            .iter()
            .map(|node| (node.id.clone(), NodeId::random(&node.node_type)))
            .collect();

        if fragment.nodes.len() == 1 && fragment.nodes[0].node_type == target_type {
            if let Some(property) = &target_prop {
                let text = fragment.nodes[0].string_prop(property)?.to_string();
                let target_path = PropertyPath::new(target_id.clone(), property.as_str());
                if !text.is_empty() {
                    self.update_text(target_path.clone(), insert_at(char_pos, &text))?;
                }
                for ann in &fragment.annotations {
                    let (start, end) = ann.range()?;
                    let mut clone = ann.clone();
                    clone.id = NodeId::random(&ann.node_type);
                    clone
                        .properties
                        .insert("path".to_string(), target_path.to_value());
                    clone
                        .properties
                        .insert("range".to_string(), json!([start + char_pos, end + char_pos]));
                    self.create(clone)?;
                }
                return Ok(Selection::collapsed(node_pos, char_pos + text.chars().count()));
            }
        }

        let tail_id = self.split_node(view, &target_id, char_pos)?;

        let mut anchor = target_id.clone();
        let mut inserted: Vec<NodeId> = Vec::with_capacity(fragment.nodes.len());
        for node in &fragment.nodes {
            let new_id = id_map
                .get(&node.id)
                .expect("id map covers every fragment node")
                .clone();
            let mut copy = node.clone();
            copy.id = new_id.clone();
            self.create(copy)?;
            self.insert_after(view, &anchor, &new_id)?;
            anchor = new_id.clone();
            inserted.push(new_id);
        }
        for ann in &fragment.annotations {
            let path = ann.anchor_path()?;
            let Some(new_node) = id_map.get(&path.node) else {
                continue;
            };
            let mut clone = ann.clone();
            clone.id = NodeId::random(&ann.node_type);
            clone.properties.insert(
                "path".to_string(),
                PropertyPath::new(new_node.clone(), path.property.as_str()).to_value(),
            );
            self.create(clone)?;
        }

        let first = inserted.first().expect("fragment checked non-empty").clone();
        let last = inserted.last().expect("fragment checked non-empty").clone();
        let merged_left = self.merge_nodes(view, &first, &target_id)?;

        // The node that ends up holding the tail of the pasted content; its
        // pre-merge length is where the cursor lands.
        let cursor_node = if merged_left && last == first {
            target_id.clone()
        } else {
            last.clone()
        };
        let cursor_type = self.state.get(&cursor_node)?.node_type.clone();
        let cursor_offset = match self.state.schema.text_property(&cursor_type) {
            Some(property) => self.state.get(&cursor_node)?.text_len(property)?,
            None => 0,
        };
        if let Some(tail) = tail_id {
            self.merge_nodes(view, &tail, &cursor_node)?;
        }
        let cursor_pos = self
            .state
            .container(view)?
            .position_of(&cursor_node)
            .ok_or(DocumentError::SelectionOutOfView)?;
        Ok(Selection::collapsed(cursor_pos, cursor_offset))
    }
}
