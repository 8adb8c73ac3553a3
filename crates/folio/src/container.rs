//! Container — the flattened, addressable ordering of a view.
//!
//! # Overview
//!
//! A view is a composite node whose items property lists the document's
//! top-level nodes. Composites may nest arbitrarily (lists in lists,
//! figures with captions), but cursor addressing and multi-node selection
//! work over leaves, so the container derives:
//!
//! - `tree_view` — the view's own id list, pre-flattening;
//! - `list_view` — the fully flattened pre-order leaf sequence;
//! - `parents`  — node id → nearest enclosing composite (or none);
//! - `positions` — cached reverse index from leaf id to flat position.
//!
//! Derived state is rebuilt wholesale, never patched: [`Container::on_applied`]
//! performs a conservative dependency check (the view's own id list, or any
//! composite observed during the last rebuild) and triggers [`Container::rebuild`]
//! when it hits. Rebuild cost is linear in the nodes of the view, which is
//! not a hot path.
//!
//! The walk is an explicit work stack, not recursion, so nesting depth is
//! bounded only by memory. Visiting the same id twice is a hard
//! configuration error: nodes must be unique in one view.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::DocumentError;
use crate::node::{Node, NodeId, NodeStore};
use crate::operation::Operation;
use crate::schema::{NodeKind, Schema};

#[derive(Debug, Clone)]
pub struct Container {
    view: NodeId,
    items_property: String,
    tree_view: Vec<NodeId>,
    list_view: Vec<NodeId>,
    parents: BTreeMap<NodeId, Option<NodeId>>,
    positions: BTreeMap<NodeId, usize>,
    observed: BTreeSet<NodeId>,
}

impl Container {
    /// Build the container for `view`, which must be a composite node.
    pub fn new(view: NodeId, store: &NodeStore, schema: &Schema) -> Result<Self, DocumentError> {
        let view_node = store
            .get(&view)
            .ok_or_else(|| DocumentError::UnknownNode(view.clone()))?;
        let items_property = schema
            .items_property(&view_node.node_type)
            .ok_or_else(|| DocumentError::UnknownContainer(view.clone()))?
            .to_string();
        let mut container = Self {
            view,
            items_property,
            tree_view: Vec::new(),
            list_view: Vec::new(),
            parents: BTreeMap::new(),
            positions: BTreeMap::new(),
            observed: BTreeSet::new(),
        };
        container.rebuild(store, schema)?;
        Ok(container)
    }

    pub fn view(&self) -> &NodeId {
        &self.view
    }

    /// Recompute all derived state from the current graph.
    pub fn rebuild(&mut self, store: &NodeStore, schema: &Schema) -> Result<(), DocumentError> {
        self.tree_view.clear();
        self.list_view.clear();
        self.parents.clear();
        self.positions.clear();
        self.observed.clear();

        let view_node = store
            .get(&self.view)
            .ok_or_else(|| DocumentError::UnknownNode(self.view.clone()))?;
        self.tree_view = view_node.id_list_prop(&self.items_property)?;

        // Pre-order walk over an explicit stack.
        let mut stack: Vec<(NodeId, Option<NodeId>)> = self
            .tree_view
            .iter()
            .rev()
            .map(|id| (id.clone(), None))
            .collect();
        let mut seen: BTreeSet<NodeId> = BTreeSet::new();

        while let Some((id, parent)) = stack.pop() {
            if !seen.insert(id.clone()) {
                return Err(DocumentError::DuplicateInView(id));
            }
            let node = store
                .get(&id)
                .ok_or_else(|| DocumentError::UnknownNode(id.clone()))?;
            let node_type = schema.get(&node.node_type)?;
            self.parents.insert(id.clone(), parent);

            match (&node_type.kind, &node_type.items_property) {
                (NodeKind::Composite, Some(items_property)) => {
                    self.observed.insert(id.clone());
                    let children = node.id_list_prop(items_property)?;
                    for child in children.into_iter().rev() {
                        stack.push((child, Some(id.clone())));
                    }
                }
                _ => {
                    self.positions.insert(id.clone(), self.list_view.len());
                    self.list_view.push(id);
                }
            }
        }
        Ok(())
    }

    /// Dependency check after an applied operation; rebuilds when the
    /// operation touched the view's id list or any observed composite.
    pub fn on_applied(
        &mut self,
        op: &Operation,
        store: &NodeStore,
        schema: &Schema,
    ) -> Result<(), DocumentError> {
        let affected = match op.path() {
            Some(path) => {
                (path.node == self.view && path.property == self.items_property)
                    || self.observed.contains(&path.node)
            }
            // Create/delete of a node changes nothing until a view or
            // composite references it, which is a separate operation.
            None => false,
        };
        if affected {
            self.rebuild(store, schema)?;
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// The flattened leaf ordering.
    pub fn ids(&self) -> &[NodeId] {
        &self.list_view
    }

    /// The view's top-level id list, pre-flattening.
    pub fn tree_ids(&self) -> &[NodeId] {
        &self.tree_view
    }

    pub fn nodes<'a>(&self, store: &'a NodeStore) -> Vec<&'a Node> {
        self.list_view.iter().filter_map(|id| store.get(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.list_view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list_view.is_empty()
    }

    /// Is `id` anywhere in the view (leaf or composite)?
    pub fn contains(&self, id: &NodeId) -> bool {
        self.parents.contains_key(id)
    }

    /// Flat position of a leaf.
    pub fn position_of(&self, id: &NodeId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn node_at(&self, position: usize) -> Option<&NodeId> {
        self.list_view.get(position)
    }

    /// Nearest enclosing composite, `None` for top-level nodes (and for
    /// nodes outside the view).
    pub fn parent_of(&self, id: &NodeId) -> Option<&NodeId> {
        self.parents.get(id).and_then(|p| p.as_ref())
    }

    /// Previous leaf in the flat ordering, ignoring composite boundaries.
    pub fn predecessor(&self, id: &NodeId) -> Option<&NodeId> {
        let pos = self.position_of(id)?;
        pos.checked_sub(1).and_then(|p| self.list_view.get(p))
    }

    /// Next leaf in the flat ordering, ignoring composite boundaries.
    pub fn successor(&self, id: &NodeId) -> Option<&NodeId> {
        let pos = self.position_of(id)?;
        self.list_view.get(pos + 1)
    }

    /// First genuine leaf under `id`, descending into composites.
    pub fn first_leaf(
        &self,
        id: &NodeId,
        store: &NodeStore,
        schema: &Schema,
    ) -> Option<NodeId> {
        self.edge_leaf(id, store, schema, false)
    }

    /// Last genuine leaf under `id`, descending into composites.
    pub fn last_leaf(&self, id: &NodeId, store: &NodeStore, schema: &Schema) -> Option<NodeId> {
        self.edge_leaf(id, store, schema, true)
    }

    fn edge_leaf(
        &self,
        id: &NodeId,
        store: &NodeStore,
        schema: &Schema,
        last: bool,
    ) -> Option<NodeId> {
        let mut current = id.clone();
        loop {
            let node = store.get(&current)?;
            let Some(items_property) = schema.items_property(&node.node_type) else {
                return Some(current);
            };
            let children = node.id_list_prop(items_property).ok()?;
            let next = if last {
                children.last()
            } else {
                children.first()
            };
            current = next?.clone();
        }
    }
}
