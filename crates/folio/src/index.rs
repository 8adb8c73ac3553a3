//! Incrementally-maintained node indexes.
//!
//! # Overview
//!
//! Every index implements the same co-transformation protocol
//! ([`DocumentIndex`]): the graph calls `on_create` / `on_delete` /
//! `on_update` synchronously for each applied operation whose node the
//! index's selector matches, so queries are never stale. Indexes hold node
//! *ids*; the document resolves ids to nodes on the query side.
//!
//! Three concrete indexes exist:
//! - [`PropertyIndex`] — generic, data-driven: a [`Selector`] plus a list of
//!   key properties (default `["type"]`).
//! - [`AnnotationIndex`] — inline annotations keyed by type and by
//!   `(node, property)` anchor path, so overlap queries cost
//!   O(matching annotations).
//! - [`FragmentIndex`] — multi-node annotations keyed by each anchor node.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde_json::Value;

use crate::node::{Node, NodeId, PropertyPath};
use crate::schema::{NodeKind, Schema};

// ── Protocol ──────────────────────────────────────────────────────────────

/// The uniform callback contract between the graph and an index.
pub trait DocumentIndex {
    /// Does this index track `node` at all?
    fn select(&self, node: &Node, schema: &Schema) -> bool;

    fn on_create(&mut self, node: &Node, schema: &Schema);

    fn on_delete(&mut self, node: &Node, schema: &Schema);

    /// `node` already carries the new value; `old` is the pre-change value
    /// of `property`, used to locate the stale key when re-keying.
    fn on_update(&mut self, node: &Node, property: &str, old: &Value, schema: &Schema);

    /// One-time scan of all existing nodes. Set-based storage keeps this
    /// idempotent.
    fn initialize(&mut self, nodes: &IndexMap<NodeId, Node>, schema: &Schema) {
        for node in nodes.values() {
            if self.select(node, schema) {
                self.on_create(node, schema);
            }
        }
    }
}

// ── Generic property index ────────────────────────────────────────────────

/// Data-driven node predicate: match by kind, by type name, or both.
/// `None` means "no constraint".
#[derive(Debug, Clone, Default)]
pub struct Selector {
    pub kinds: Option<Vec<NodeKind>>,
    pub types: Option<BTreeSet<String>>,
}

impl Selector {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn of_kind(kind: NodeKind) -> Self {
        Self {
            kinds: Some(vec![kind]),
            types: None,
        }
    }

    pub fn matches(&self, node: &Node, schema: &Schema) -> bool {
        if let Some(kinds) = &self.kinds {
            let Ok(kind) = schema.kind(&node.node_type) else {
                return false;
            };
            if !kinds.contains(&kind) {
                return false;
            }
        }
        if let Some(types) = &self.types {
            if !types.contains(&node.node_type) {
                return false;
            }
        }
        true
    }
}

/// Generic index: nodes keyed by the values of a declared property list.
///
/// The pseudo-property `"type"` keys by the node's type name.
#[derive(Debug, Clone)]
pub struct PropertyIndex {
    pub name: String,
    selector: Selector,
    key_properties: Vec<String>,
    entries: BTreeMap<Vec<String>, BTreeSet<NodeId>>,
}

impl PropertyIndex {
    pub fn new(name: &str, selector: Selector, key_properties: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            selector,
            key_properties: key_properties.iter().map(|s| s.to_string()).collect(),
            entries: BTreeMap::new(),
        }
    }

    /// The default index every document carries: all nodes keyed by type.
    pub fn by_type() -> Self {
        Self::new("type", Selector::any(), &["type"])
    }

    fn segment(node: &Node, property: &str, override_old: Option<(&str, &Value)>) -> String {
        if property == "type" {
            return node.node_type.clone();
        }
        let value = match override_old {
            Some((changed, old)) if changed == property => Some(old),
            _ => node.get(property),
        };
        match value {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    fn key_of(&self, node: &Node, override_old: Option<(&str, &Value)>) -> Vec<String> {
        self.key_properties
            .iter()
            .map(|p| Self::segment(node, p, override_old))
            .collect()
    }

    /// Ids under a full or partial key. `get(&[])` is the flattened union
    /// of all entries.
    pub fn get(&self, prefix: &[&str]) -> BTreeSet<NodeId> {
        self.entries
            .iter()
            .filter(|(key, _)| {
                key.len() >= prefix.len() && key.iter().zip(prefix).all(|(a, b)| a == b)
            })
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect()
    }
}

impl DocumentIndex for PropertyIndex {
    fn select(&self, node: &Node, schema: &Schema) -> bool {
        self.selector.matches(node, schema)
    }

    fn on_create(&mut self, node: &Node, _schema: &Schema) {
        self.entries
            .entry(self.key_of(node, None))
            .or_default()
            .insert(node.id.clone());
    }

    fn on_delete(&mut self, node: &Node, _schema: &Schema) {
        let key = self.key_of(node, None);
        if let Some(ids) = self.entries.get_mut(&key) {
            ids.remove(&node.id);
            if ids.is_empty() {
                self.entries.remove(&key);
            }
        }
    }

    fn on_update(&mut self, node: &Node, property: &str, old: &Value, schema: &Schema) {
        if !self.key_properties.iter().any(|p| p == property) {
            return;
        }
        let old_key = self.key_of(node, Some((property, old)));
        if let Some(ids) = self.entries.get_mut(&old_key) {
            ids.remove(&node.id);
            if ids.is_empty() {
                self.entries.remove(&old_key);
            }
        }
        self.on_create(node, schema);
    }
}

// ── Annotation index ──────────────────────────────────────────────────────

/// Inline annotations, keyed by anchor path and by type.
#[derive(Debug, Clone, Default)]
pub struct AnnotationIndex {
    by_path: BTreeMap<NodeId, BTreeMap<String, BTreeSet<NodeId>>>,
    by_type: BTreeMap<String, BTreeSet<NodeId>>,
}

impl AnnotationIndex {
    /// Annotations anchored at exactly `(node, property)`.
    pub fn at_path(&self, path: &PropertyPath) -> BTreeSet<NodeId> {
        self.by_path
            .get(&path.node)
            .and_then(|props| props.get(&path.property))
            .cloned()
            .unwrap_or_default()
    }

    /// Annotations anchored anywhere on `node`, across all properties.
    pub fn at_node(&self, node: &NodeId) -> BTreeSet<NodeId> {
        self.by_path
            .get(node)
            .map(|props| props.values().flatten().cloned().collect())
            .unwrap_or_default()
    }

    pub fn of_type(&self, node_type: &str) -> BTreeSet<NodeId> {
        self.by_type.get(node_type).cloned().unwrap_or_default()
    }

    /// Every live inline annotation.
    pub fn all(&self) -> BTreeSet<NodeId> {
        self.by_type.values().flatten().cloned().collect()
    }

    fn insert_path(&mut self, path: &PropertyPath, id: &NodeId) {
        self.by_path
            .entry(path.node.clone())
            .or_default()
            .entry(path.property.clone())
            .or_default()
            .insert(id.clone());
    }

    fn remove_path(&mut self, path: &PropertyPath, id: &NodeId) {
        if let Some(props) = self.by_path.get_mut(&path.node) {
            if let Some(ids) = props.get_mut(&path.property) {
                ids.remove(id);
                if ids.is_empty() {
                    props.remove(&path.property);
                }
            }
            if props.is_empty() {
                self.by_path.remove(&path.node);
            }
        }
    }
}

impl DocumentIndex for AnnotationIndex {
    fn select(&self, node: &Node, schema: &Schema) -> bool {
        schema
            .get(&node.node_type)
            .is_ok_and(|t| t.kind == NodeKind::Annotation && !t.container_scoped)
    }

    fn on_create(&mut self, node: &Node, _schema: &Schema) {
        if let Ok(path) = node.anchor_path() {
            self.insert_path(&path, &node.id);
        }
        self.by_type
            .entry(node.node_type.clone())
            .or_default()
            .insert(node.id.clone());
    }

    fn on_delete(&mut self, node: &Node, _schema: &Schema) {
        if let Ok(path) = node.anchor_path() {
            self.remove_path(&path, &node.id);
        }
        if let Some(ids) = self.by_type.get_mut(&node.node_type) {
            ids.remove(&node.id);
            if ids.is_empty() {
                self.by_type.remove(&node.node_type);
            }
        }
    }

    fn on_update(&mut self, node: &Node, property: &str, old: &Value, _schema: &Schema) {
        if property != "path" {
            return;
        }
        if let Some(old_path) = PropertyPath::from_value(old) {
            self.remove_path(&old_path, &node.id);
        }
        if let Ok(new_path) = node.anchor_path() {
            self.insert_path(&new_path, &node.id);
        }
    }
}

// ── Fragment index ────────────────────────────────────────────────────────

/// Multi-node annotations, keyed by each node their anchors touch.
#[derive(Debug, Clone, Default)]
pub struct FragmentIndex {
    by_node: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl FragmentIndex {
    /// Multi-node annotations with an anchor inside `node`.
    pub fn at_node(&self, node: &NodeId) -> BTreeSet<NodeId> {
        self.by_node.get(node).cloned().unwrap_or_default()
    }

    fn insert(&mut self, node: &NodeId, id: &NodeId) {
        self.by_node.entry(node.clone()).or_default().insert(id.clone());
    }

    fn remove(&mut self, node: &NodeId, id: &NodeId) {
        if let Some(ids) = self.by_node.get_mut(node) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_node.remove(node);
            }
        }
    }
}

impl DocumentIndex for FragmentIndex {
    fn select(&self, node: &Node, schema: &Schema) -> bool {
        schema
            .get(&node.node_type)
            .is_ok_and(|t| t.kind == NodeKind::Annotation && t.container_scoped)
    }

    fn on_create(&mut self, node: &Node, _schema: &Schema) {
        if let Ok((start, _)) = node.start_anchor() {
            self.insert(&start.node, &node.id);
        }
        if let Ok((end, _)) = node.end_anchor() {
            self.insert(&end.node, &node.id);
        }
    }

    fn on_delete(&mut self, node: &Node, _schema: &Schema) {
        if let Ok((start, _)) = node.start_anchor() {
            self.remove(&start.node, &node.id);
        }
        if let Ok((end, _)) = node.end_anchor() {
            self.remove(&end.node, &node.id);
        }
    }

    fn on_update(&mut self, node: &Node, property: &str, old: &Value, _schema: &Schema) {
        let other_anchor = match property {
            "start_path" => node.end_anchor(),
            "end_path" => node.start_anchor(),
            _ => return,
        };
        if let Some(old_path) = PropertyPath::from_value(old) {
            // Keep the entry when the other anchor still lives on that node.
            let still_anchored = other_anchor.is_ok_and(|(p, _)| p.node == old_path.node);
            if !still_anchored {
                self.remove(&old_path.node, &node.id);
            }
        }
        if let Ok(new_path) = node.path_prop(property) {
            self.insert(&new_path.node, &node.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NodeType;
    use serde_json::json;

    fn schema() -> Schema {
        let mut s = Schema::new();
        s.register(NodeType::leaf("paragraph").text("content"));
        s.register(NodeType::annotation("strong"));
        s.register(NodeType::container_annotation("comment"));
        s
    }

    fn strong(id: &str, node: &str, range: (u64, u64)) -> Node {
        Node::new(id, "strong")
            .with("path", json!([node, "content"]))
            .with("range", json!([range.0, range.1]))
    }

    #[test]
    fn property_index_keys_by_type() {
        let s = schema();
        let mut index = PropertyIndex::by_type();
        let p1 = Node::new("p1", "paragraph");
        let a1 = strong("a1", "p1", (0, 2));
        index.on_create(&p1, &s);
        index.on_create(&a1, &s);
        assert_eq!(
            index.get(&["paragraph"]),
            BTreeSet::from([NodeId::from("p1")])
        );
        assert_eq!(index.get(&[]).len(), 2);
        index.on_delete(&p1, &s);
        assert!(index.get(&["paragraph"]).is_empty());
    }

    #[test]
    fn annotation_index_rekeys_on_path_change() {
        let s = schema();
        let mut index = AnnotationIndex::default();
        let mut a1 = strong("a1", "p1", (0, 2));
        index.on_create(&a1, &s);
        assert_eq!(
            index.at_path(&PropertyPath::new("p1", "content")),
            BTreeSet::from([NodeId::from("a1")])
        );

        let old = a1.properties.insert("path".to_string(), json!(["p2", "content"]));
        index.on_update(&a1, "path", &old.unwrap(), &s);
        assert!(index.at_path(&PropertyPath::new("p1", "content")).is_empty());
        assert_eq!(
            index.at_path(&PropertyPath::new("p2", "content")),
            BTreeSet::from([NodeId::from("a1")])
        );
    }

    #[test]
    fn fragment_index_tracks_both_anchors() {
        let s = schema();
        let mut index = FragmentIndex::default();
        let c1 = Node::new("c1", "comment")
            .with("start_path", json!(["p1", "content"]))
            .with("start_offset", json!(1))
            .with("end_path", json!(["p3", "content"]))
            .with("end_offset", json!(4));
        index.on_create(&c1, &s);
        assert_eq!(index.at_node(&NodeId::from("p1")).len(), 1);
        assert_eq!(index.at_node(&NodeId::from("p3")).len(), 1);
        assert!(index.at_node(&NodeId::from("p2")).is_empty());
        index.on_delete(&c1, &s);
        assert!(index.at_node(&NodeId::from("p1")).is_empty());
    }

    #[test]
    fn selectors_constrain_kind_and_type() {
        let s = schema();
        let selector = Selector::of_kind(NodeKind::Annotation);
        assert!(selector.matches(&strong("a1", "p1", (0, 1)), &s));
        assert!(!selector.matches(&Node::new("p1", "paragraph"), &s));
    }
}
