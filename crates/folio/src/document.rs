//! The document graph and its operation pipeline.
//!
//! # Overview
//!
//! [`DocumentState`] is the cloneable backing store: schema handle, node
//! store, indexes, and containers. Cloning it produces the scratch copy a
//! speculative edit runs against; committing an edit swaps the scratch back
//! in. [`Document`] owns the live state plus the change [`History`] and the
//! observer callbacks.
//!
//! Applying an operation runs, synchronously and in order:
//! 1. node store mutation (with duplicate/unknown-id and schema checks),
//! 2. index callbacks for every registered index whose selector matches,
//! 3. container dependency checks and rebuilds,
//! 4. annotator reconciliation — fix-up operations (range adjustments,
//!    annotation deletions) are fed back through the same pipeline before
//!    the next caller-issued operation,
//! 5. observer notification (at the [`Document`] layer, once an edit is
//!    committed).
//!
//! Everything is single-threaded: each step completes before the call
//! returns, so no dependent structure ever observes a half-applied change.

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::annotator;
use crate::container::Container;
use crate::edit::Session;
use crate::error::DocumentError;
use crate::history::{Change, ChangeId, History};
use crate::index::{AnnotationIndex, DocumentIndex, FragmentIndex, PropertyIndex};
use crate::node::{Node, NodeId, NodeStore, PropertyPath};
use crate::operation::{Operation, PropertyDelta};
use crate::schema::{NodeKind, Schema};

// ── DocumentState ─────────────────────────────────────────────────────────

/// The complete mutable state of a document: node store, indexes, and
/// containers. `Clone` is the simulation snapshot.
#[derive(Debug, Clone)]
pub struct DocumentState {
    pub(crate) schema: Arc<Schema>,
    pub(crate) store: NodeStore,
    pub(crate) annotation_index: AnnotationIndex,
    pub(crate) fragment_index: FragmentIndex,
    pub(crate) property_indexes: IndexMap<String, PropertyIndex>,
    pub(crate) containers: IndexMap<NodeId, Container>,
}

impl DocumentState {
    pub fn new(schema: Schema) -> Self {
        let mut property_indexes = IndexMap::new();
        property_indexes.insert("type".to_string(), PropertyIndex::by_type());
        Self {
            schema: Arc::new(schema),
            store: NodeStore::new(),
            annotation_index: AnnotationIndex::default(),
            fragment_index: FragmentIndex::default(),
            property_indexes,
            containers: IndexMap::new(),
        }
    }

    // ── Queries ───────────────────────────────────────────────────────────

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn get(&self, id: &NodeId) -> Result<&Node, DocumentError> {
        self.store
            .get(id)
            .ok_or_else(|| DocumentError::UnknownNode(id.clone()))
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.store.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.store.len()
    }

    /// Read-only view of the backing node store.
    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn container(&self, view: &NodeId) -> Result<&Container, DocumentError> {
        self.containers
            .get(view)
            .ok_or_else(|| DocumentError::UnknownContainer(view.clone()))
    }

    pub fn annotation_index(&self) -> &AnnotationIndex {
        &self.annotation_index
    }

    pub fn fragment_index(&self) -> &FragmentIndex {
        &self.fragment_index
    }

    pub fn index(&self, name: &str) -> Option<&PropertyIndex> {
        self.property_indexes.get(name)
    }

    /// Resolve the annotations anchored at `path`.
    pub fn annotations_at(&self, path: &PropertyPath) -> Vec<&Node> {
        self.annotation_index
            .at_path(path)
            .iter()
            .filter_map(|id| self.store.get(id))
            .collect()
    }

    /// All live nodes of one type, via the built-in type index.
    pub fn nodes_of_type(&self, node_type: &str) -> Vec<&Node> {
        self.property_indexes
            .get("type")
            .map(|index| {
                index
                    .get(&[node_type])
                    .iter()
                    .filter_map(|id| self.store.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    // ── Registration ──────────────────────────────────────────────────────

    /// Register (and immediately build) the container for a view node.
    pub fn add_container(&mut self, view: NodeId) -> Result<(), DocumentError> {
        let container = Container::new(view.clone(), &self.store, &self.schema)?;
        self.containers.insert(view, container);
        Ok(())
    }

    /// Register a custom property index; it scans existing nodes once.
    pub fn add_index(&mut self, mut index: PropertyIndex) {
        index.initialize(&self.store, &self.schema);
        self.property_indexes.insert(index.name.clone(), index);
    }

    // ── Operation pipeline ────────────────────────────────────────────────

    /// Apply one caller-issued operation plus every annotation fix-up it
    /// entails. Returns all operations actually applied, in order.
    pub fn apply(&mut self, op: Operation) -> Result<Vec<Operation>, DocumentError> {
        let mut applied = Vec::new();
        let mut queue = VecDeque::from([op]);
        while let Some(op) = queue.pop_front() {
            self.apply_primitive(&op)?;
            let fixups = annotator::react(&op, self)?;
            applied.push(op);
            queue.extend(fixups);
        }
        Ok(applied)
    }

    /// Apply a recorded operation without annotator reconciliation — history
    /// rewind/forward replays complete op lists whose fix-ups are already
    /// part of the record.
    pub fn replay(&mut self, op: &Operation) -> Result<(), DocumentError> {
        self.apply_primitive(op)
    }

    fn apply_primitive(&mut self, op: &Operation) -> Result<(), DocumentError> {
        match op {
            Operation::Create { node } => {
                if self.store.contains_key(&node.id) {
                    return Err(DocumentError::DuplicateId(node.id.clone()));
                }
                let mut node = node.clone();
                self.schema.apply_defaults(&mut node)?;
                self.schema.validate(&node)?;
                self.check_annotation_admitted(&node)?;
                self.store.insert(node.id.clone(), node.clone());
                self.notify_create(&node);
            }
            Operation::Delete { node } => {
                let removed = self
                    .store
                    .shift_remove(&node.id)
                    .ok_or_else(|| DocumentError::UnknownNode(node.id.clone()))?;
                self.notify_delete(&removed);
            }
            Operation::Set { path, new, .. } => {
                let node = self
                    .store
                    .get_mut(&path.node)
                    .ok_or_else(|| DocumentError::UnknownNode(path.node.clone()))?;
                let old = node
                    .properties
                    .insert(path.property.clone(), new.clone())
                    .unwrap_or(Value::Null);
                let node = node.clone();
                self.notify_update(&node, &path.property, &old);
            }
            Operation::Update { path, delta } => {
                let node = self
                    .store
                    .get_mut(&path.node)
                    .ok_or_else(|| DocumentError::UnknownNode(path.node.clone()))?;
                let old = node.get(&path.property).cloned().ok_or_else(|| {
                    DocumentError::SchemaViolation {
                        node: path.node.clone(),
                        property: path.property.clone(),
                        reason: "missing".to_string(),
                    }
                })?;
                let new = match delta {
                    PropertyDelta::Text(text_delta) => {
                        let text = old.as_str().ok_or_else(|| DocumentError::SchemaViolation {
                            node: path.node.clone(),
                            property: path.property.clone(),
                            reason: "text delta applied to a non-string".to_string(),
                        })?;
                        Value::String(folio_delta::apply(text, text_delta)?)
                    }
                    PropertyDelta::Array(array_delta) => {
                        let mut items =
                            old.as_array().cloned().ok_or_else(|| {
                                DocumentError::SchemaViolation {
                                    node: path.node.clone(),
                                    property: path.property.clone(),
                                    reason: "array delta applied to a non-array".to_string(),
                                }
                            })?;
                        array_delta.apply(&mut items)?;
                        Value::Array(items)
                    }
                };
                node.properties.insert(path.property.clone(), new);
                let node = node.clone();
                self.notify_update(&node, &path.property, &old);
            }
        }
        self.refresh_containers(op)
    }

    /// An inline annotation may only decorate a node whose type admits it.
    /// The check is skipped when the target node is absent: history rewinds
    /// recreate annotations before the nodes they decorate.
    fn check_annotation_admitted(&self, node: &Node) -> Result<(), DocumentError> {
        let spec = self.schema.get(&node.node_type)?;
        if spec.kind != NodeKind::Annotation || spec.container_scoped {
            return Ok(());
        }
        let Ok(path) = node.anchor_path() else {
            return Ok(());
        };
        let Some(target) = self.store.get(&path.node) else {
            return Ok(());
        };
        let allowed = &self.schema.get(&target.node_type)?.allowed_annotations;
        if !allowed.contains(&node.node_type) {
            return Err(DocumentError::SchemaViolation {
                node: node.id.clone(),
                property: "path".to_string(),
                reason: format!(
                    "{} does not admit {} annotations",
                    target.node_type, node.node_type
                ),
            });
        }
        Ok(())
    }

    fn notify_create(&mut self, node: &Node) {
        let schema = Arc::clone(&self.schema);
        if self.annotation_index.select(node, &schema) {
            self.annotation_index.on_create(node, &schema);
        }
        if self.fragment_index.select(node, &schema) {
            self.fragment_index.on_create(node, &schema);
        }
        for index in self.property_indexes.values_mut() {
            if index.select(node, &schema) {
                index.on_create(node, &schema);
            }
        }
    }

    fn notify_delete(&mut self, node: &Node) {
        let schema = Arc::clone(&self.schema);
        if self.annotation_index.select(node, &schema) {
            self.annotation_index.on_delete(node, &schema);
        }
        if self.fragment_index.select(node, &schema) {
            self.fragment_index.on_delete(node, &schema);
        }
        for index in self.property_indexes.values_mut() {
            if index.select(node, &schema) {
                index.on_delete(node, &schema);
            }
        }
    }

    fn notify_update(&mut self, node: &Node, property: &str, old: &Value) {
        let schema = Arc::clone(&self.schema);
        if self.annotation_index.select(node, &schema) {
            self.annotation_index.on_update(node, property, old, &schema);
        }
        if self.fragment_index.select(node, &schema) {
            self.fragment_index.on_update(node, property, old, &schema);
        }
        for index in self.property_indexes.values_mut() {
            if index.select(node, &schema) {
                index.on_update(node, property, old, &schema);
            }
        }
    }

    fn refresh_containers(&mut self, op: &Operation) -> Result<(), DocumentError> {
        let schema = Arc::clone(&self.schema);
        let store = &self.store;
        for container in self.containers.values_mut() {
            container.on_applied(op, store, &schema)?;
        }
        Ok(())
    }
}

// ── Document ──────────────────────────────────────────────────────────────

/// A live document: state, change history, and observers.
pub struct Document {
    state: DocumentState,
    history: History,
    observers: Vec<Box<dyn FnMut(&Operation)>>,
}

impl Document {
    pub fn new(schema: Schema) -> Self {
        Self {
            state: DocumentState::new(schema),
            history: History::new(),
            observers: Vec::new(),
        }
    }

    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    pub fn schema(&self) -> &Schema {
        self.state.schema()
    }

    pub fn get(&self, id: &NodeId) -> Result<&Node, DocumentError> {
        self.state.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.state.contains(id)
    }

    pub fn container(&self, view: &NodeId) -> Result<&Container, DocumentError> {
        self.state.container(view)
    }

    pub fn annotations_at(&self, path: &PropertyPath) -> Vec<&Node> {
        self.state.annotations_at(path)
    }

    pub fn nodes_of_type(&self, node_type: &str) -> Vec<&Node> {
        self.state.nodes_of_type(node_type)
    }

    pub fn add_container(&mut self, view: NodeId) -> Result<(), DocumentError> {
        self.state.add_container(view)
    }

    pub fn add_index(&mut self, index: PropertyIndex) {
        self.state.add_index(index);
    }

    /// Subscribe to every committed operation, in apply order.
    pub fn on_operation(&mut self, observer: impl FnMut(&Operation) + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn notify(&mut self, op: &Operation) {
        for observer in &mut self.observers {
            observer(op);
        }
    }

    // ── Editing ───────────────────────────────────────────────────────────

    /// Run a speculative edit session against a scratch copy of the state.
    ///
    /// On `Ok` the scratch state replaces the live one and the session's
    /// complete op list becomes a single history change; on `Err` the
    /// scratch is dropped with no observable side effect.
    pub fn edit<T>(
        &mut self,
        f: impl FnOnce(&mut Session) -> Result<T, DocumentError>,
    ) -> Result<T, DocumentError> {
        let mut session = Session::new(self.state.clone());
        let value = f(&mut session)?;
        let (state, ops) = session.into_parts();
        if !ops.is_empty() {
            self.state = state;
            self.history.record(ops.clone());
            for op in &ops {
                self.notify(op);
            }
        }
        Ok(value)
    }

    /// Apply a single operation as its own change.
    pub fn apply(&mut self, op: Operation) -> Result<ChangeId, DocumentError> {
        self.edit(|session| session.apply(op))?;
        Ok(self.history.head().expect("apply records a change"))
    }

    // ── History ───────────────────────────────────────────────────────────

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn head(&self) -> Option<ChangeId> {
        self.history.head()
    }

    /// Add a change produced by a collaborator; does not apply it — use
    /// [`Document::merge`] to fast-forward onto it.
    pub fn import_change(&mut self, change: Change) -> Result<(), DocumentError> {
        self.history.import(change)
    }

    /// Rewind the head change by applying its inverse ops in reverse order.
    /// Returns the pivot operation for selection restoration.
    pub fn undo(&mut self) -> Result<Option<Operation>, DocumentError> {
        let Some(head) = self.history.head() else {
            return Ok(None);
        };
        let change = self.history.get(head)?.clone();
        let mut pivot = None;
        for op in change.ops.iter().rev() {
            let inverse = op.invert();
            self.state.replay(&inverse)?;
            self.notify(&inverse);
            pivot = Some(inverse);
        }
        self.history.set_head(change.parent);
        Ok(pivot)
    }

    /// Re-apply the most recently recorded child of the current head.
    pub fn redo(&mut self) -> Result<Option<Operation>, DocumentError> {
        let Some(child) = self.history.latest_child(self.history.head()) else {
            return Ok(None);
        };
        self.fast_forward_one(child)
    }

    /// Fast-forward merge: applies `target`'s chain iff it is a pure linear
    /// continuation of the current head. A diverged ref fails without
    /// mutating anything.
    pub fn merge(&mut self, target: ChangeId) -> Result<bool, DocumentError> {
        let Some(path) = self.history.path_between(self.history.head(), target)? else {
            return Ok(false);
        };
        for id in path {
            self.fast_forward_one(id)?;
        }
        Ok(true)
    }

    /// Move the head to an arbitrary recorded ref: rewind to the common
    /// ancestor, then forward along the target's chain.
    pub fn checkout(&mut self, target: ChangeId) -> Result<Option<Operation>, DocumentError> {
        let chain = self.history.chain(target)?;
        let ancestors: std::collections::BTreeSet<u64> =
            chain.iter().map(ChangeId::raw).collect();

        let mut pivot = None;
        while let Some(head) = self.history.head() {
            if ancestors.contains(&head.raw()) {
                break;
            }
            pivot = self.undo()?;
        }

        let head = self.history.head();
        let mut forward = Vec::new();
        for id in &chain {
            if Some(*id) == head {
                break;
            }
            forward.push(*id);
        }
        for id in forward.into_iter().rev() {
            pivot = self.fast_forward_one(id)?;
        }
        Ok(pivot)
    }

    fn fast_forward_one(&mut self, id: ChangeId) -> Result<Option<Operation>, DocumentError> {
        let change = self.history.get(id)?.clone();
        let mut pivot = None;
        for op in &change.ops {
            self.state.replay(op)?;
            self.notify(op);
            pivot = Some(op.clone());
        }
        self.history.set_head(Some(id));
        Ok(pivot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NodeType;
    use folio_delta::insert_at;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn schema() -> Schema {
        let mut s = Schema::new();
        s.register(NodeType::composite("view", "nodes"));
        s.register(NodeType::leaf("paragraph").text("content"));
        s.register(NodeType::annotation("strong"));
        s
    }

    fn create(id: &str, node_type: &str, props: &[(&str, Value)]) -> Operation {
        let mut node = Node::new(id, node_type);
        for (k, v) in props {
            node = node.with(k, v.clone());
        }
        Operation::Create { node }
    }

    #[test]
    fn create_rejects_duplicate_ids() {
        let mut doc = Document::new(schema());
        doc.apply(create("p1", "paragraph", &[("content", json!("a"))]))
            .unwrap();
        let err = doc
            .apply(create("p1", "paragraph", &[]))
            .unwrap_err();
        assert_eq!(err, DocumentError::DuplicateId(NodeId::from("p1")));
        // The failed apply left no trace.
        assert_eq!(doc.get(&NodeId::from("p1")).unwrap().string_prop("content").unwrap(), "a");
    }

    #[test]
    fn delete_unknown_node_fails() {
        let mut doc = Document::new(schema());
        let err = doc
            .apply(Operation::Delete {
                node: Node::new("ghost", "paragraph"),
            })
            .unwrap_err();
        assert_eq!(err, DocumentError::UnknownNode(NodeId::from("ghost")));
    }

    #[test]
    fn update_applies_text_delta_and_undo_restores() {
        let mut doc = Document::new(schema());
        doc.apply(create("p1", "paragraph", &[("content", json!("Hello"))]))
            .unwrap();
        doc.apply(Operation::Update {
            path: PropertyPath::new("p1", "content"),
            delta: PropertyDelta::Text(insert_at(5, " World")),
        })
        .unwrap();
        let p1 = NodeId::from("p1");
        assert_eq!(doc.get(&p1).unwrap().string_prop("content").unwrap(), "Hello World");

        doc.undo().unwrap();
        assert_eq!(doc.get(&p1).unwrap().string_prop("content").unwrap(), "Hello");
        doc.redo().unwrap();
        assert_eq!(doc.get(&p1).unwrap().string_prop("content").unwrap(), "Hello World");
    }

    #[test]
    fn failed_edit_discards_scratch_state() {
        let mut doc = Document::new(schema());
        doc.apply(create("p1", "paragraph", &[("content", json!("keep"))]))
            .unwrap();
        let result: Result<(), DocumentError> = doc.edit(|session| {
            session.apply(Operation::Set {
                path: PropertyPath::new("p1", "content"),
                old: json!("keep"),
                new: json!("lost"),
            })?;
            Err(DocumentError::NotImplemented("abort"))
        });
        assert!(result.is_err());
        assert_eq!(
            doc.get(&NodeId::from("p1")).unwrap().string_prop("content").unwrap(),
            "keep"
        );
        // No history entry for the aborted edit.
        assert_eq!(doc.history().len(), 1);
    }

    #[test]
    fn observers_see_committed_ops_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut doc = Document::new(schema());
        doc.on_operation(move |op| sink.borrow_mut().push(op.node_id().clone()));
        doc.apply(create("p1", "paragraph", &[])).unwrap();
        doc.apply(create("p2", "paragraph", &[])).unwrap();
        assert_eq!(
            seen.borrow().as_slice(),
            &[NodeId::from("p1"), NodeId::from("p2")]
        );
    }

    #[test]
    fn type_index_tracks_lifecycle() {
        let mut doc = Document::new(schema());
        doc.apply(create("p1", "paragraph", &[])).unwrap();
        assert_eq!(doc.nodes_of_type("paragraph").len(), 1);
        let node = doc.get(&NodeId::from("p1")).unwrap().clone();
        doc.apply(Operation::Delete { node }).unwrap();
        assert!(doc.nodes_of_type("paragraph").is_empty());
    }
}
