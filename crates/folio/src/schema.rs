//! Node type registry and capability tables.
//!
//! # Overview
//!
//! Node behaviour is data, not inheritance: every type name maps to a
//! [`NodeType`] record declaring its [`NodeKind`], property shapes, and the
//! capability table the editing layer consults — which property holds
//! editable text, which types it merges with, what it splits into, which
//! annotations it admits, and (for annotation types) the boundary
//! [`Expand`] policy and split behaviour.
//!
//! A [`Schema`] is assembled once at startup and shared read-only by the
//! document graph.

use std::collections::BTreeSet;

pub use folio_delta::Expand;

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::error::DocumentError;
use crate::node::Node;

// ── Kinds & property shapes ───────────────────────────────────────────────

/// Closed classification of node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Content-bearing node addressed by the container's flat ordering.
    Leaf,
    /// Node holding an ordered list of child node ids (list, figure, view).
    Composite,
    /// Inline markup anchored to a character range of a text property.
    Annotation,
}

/// Declared shape of a node property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertySpec {
    /// Editable text (the target of text deltas).
    Text,
    /// Plain string.
    String,
    Number,
    Bool,
    /// Single node id reference.
    Id,
    /// Ordered list of node ids.
    IdList,
    /// `[start, end]` character offsets.
    Range,
    /// `[node, property]` anchor pair.
    Path,
    /// Unconstrained JSON payload.
    Json,
}

impl PropertySpec {
    /// Value a freshly created node gets when the caller omits the property.
    pub fn default_value(&self) -> Value {
        match self {
            PropertySpec::Text | PropertySpec::String => json!(""),
            PropertySpec::Number => json!(0),
            PropertySpec::Bool => json!(false),
            PropertySpec::Id => Value::Null,
            PropertySpec::IdList => json!([]),
            PropertySpec::Range => json!([0, 0]),
            PropertySpec::Path => json!([]),
            PropertySpec::Json => Value::Null,
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            PropertySpec::Text | PropertySpec::String => value.is_string(),
            PropertySpec::Number => value.is_number(),
            PropertySpec::Bool => value.is_boolean(),
            PropertySpec::Id => value.is_string() || value.is_null(),
            PropertySpec::IdList => {
                value.as_array().is_some_and(|a| a.iter().all(Value::is_string))
            }
            PropertySpec::Range => value
                .as_array()
                .is_some_and(|a| a.len() == 2 && a.iter().all(Value::is_u64)),
            PropertySpec::Path => value
                .as_array()
                .is_some_and(|a| a.len() == 2 && a.iter().all(Value::is_string)),
            PropertySpec::Json => true,
        }
    }
}

// ── NodeType ──────────────────────────────────────────────────────────────

/// Capability table for one node type.
#[derive(Debug, Clone)]
pub struct NodeType {
    pub name: String,
    pub kind: NodeKind,
    pub properties: IndexMap<String, PropertySpec>,
    /// Property carrying editable text, when the type is text-bearing.
    pub text_property: Option<String>,
    /// Property carrying the ordered child id list, for composites.
    pub items_property: Option<String>,
    /// Types this node's content may be merged into.
    pub mergeable_with: BTreeSet<String>,
    /// Type created to hold the tail when this node is split.
    pub split_into: Option<String>,
    /// Annotation types admitted on this node's text.
    pub allowed_annotations: BTreeSet<String>,
    /// Boundary stickiness, for annotation types.
    pub expansion: Expand,
    /// Whether a straddling annotation of this type is cloned onto the
    /// cut-away fragment (true) or merely truncated (false).
    pub splittable: bool,
    /// Multi-node annotation anchored by two `[path, offset]` pairs rather
    /// than a single path + range.
    pub container_scoped: bool,
}

impl NodeType {
    fn base(name: &str, kind: NodeKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            properties: IndexMap::new(),
            text_property: None,
            items_property: None,
            mergeable_with: BTreeSet::new(),
            split_into: None,
            allowed_annotations: BTreeSet::new(),
            expansion: Expand::NONE,
            splittable: false,
            container_scoped: false,
        }
    }

    /// A content leaf (paragraph, heading, image, …).
    pub fn leaf(name: &str) -> Self {
        Self::base(name, NodeKind::Leaf)
    }

    /// A composite holding an ordered child list under `items_property`.
    pub fn composite(name: &str, items_property: &str) -> Self {
        let mut t = Self::base(name, NodeKind::Composite);
        t.items_property = Some(items_property.to_string());
        t.properties
            .insert(items_property.to_string(), PropertySpec::IdList);
        t
    }

    /// An inline annotation anchored by `path` + `range`.
    pub fn annotation(name: &str) -> Self {
        let mut t = Self::base(name, NodeKind::Annotation);
        t.properties.insert("path".to_string(), PropertySpec::Path);
        t.properties.insert("range".to_string(), PropertySpec::Range);
        t
    }

    /// A multi-node annotation anchored by two independent path + offset
    /// pairs into (possibly different) text properties.
    pub fn container_annotation(name: &str) -> Self {
        let mut t = Self::base(name, NodeKind::Annotation);
        t.container_scoped = true;
        t.properties
            .insert("start_path".to_string(), PropertySpec::Path);
        t.properties
            .insert("start_offset".to_string(), PropertySpec::Number);
        t.properties
            .insert("end_path".to_string(), PropertySpec::Path);
        t.properties
            .insert("end_offset".to_string(), PropertySpec::Number);
        t
    }

    // ── Fluent capability declarations ────────────────────────────────────

    pub fn property(mut self, name: &str, spec: PropertySpec) -> Self {
        self.properties.insert(name.to_string(), spec);
        self
    }

    /// Declare `name` as this type's editable text property.
    pub fn text(mut self, name: &str) -> Self {
        self.properties.insert(name.to_string(), PropertySpec::Text);
        self.text_property = Some(name.to_string());
        self
    }

    pub fn mergeable_with<'a, I: IntoIterator<Item = &'a str>>(mut self, types: I) -> Self {
        self.mergeable_with
            .extend(types.into_iter().map(str::to_string));
        self
    }

    pub fn split_into(mut self, target: &str) -> Self {
        self.split_into = Some(target.to_string());
        self
    }

    pub fn allow_annotations<'a, I: IntoIterator<Item = &'a str>>(mut self, types: I) -> Self {
        self.allowed_annotations
            .extend(types.into_iter().map(str::to_string));
        self
    }

    pub fn expand(mut self, expansion: Expand) -> Self {
        self.expansion = expansion;
        self
    }

    pub fn splittable(mut self) -> Self {
        self.splittable = true;
        self
    }

    pub fn is_text(&self) -> bool {
        self.text_property.is_some()
    }
}

// ── Schema ────────────────────────────────────────────────────────────────

/// Registry mapping type names to their [`NodeType`] records.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: IndexMap<String, NodeType>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node_type: NodeType) -> &mut Self {
        self.types.insert(node_type.name.clone(), node_type);
        self
    }

    pub fn get(&self, name: &str) -> Result<&NodeType, DocumentError> {
        self.types
            .get(name)
            .ok_or_else(|| DocumentError::UnknownType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn kind(&self, name: &str) -> Result<NodeKind, DocumentError> {
        Ok(self.get(name)?.kind)
    }

    pub fn is_annotation(&self, name: &str) -> bool {
        self.types
            .get(name)
            .is_some_and(|t| t.kind == NodeKind::Annotation)
    }

    pub fn is_composite(&self, name: &str) -> bool {
        self.types
            .get(name)
            .is_some_and(|t| t.kind == NodeKind::Composite)
    }

    /// Expansion policy for an annotation type; unknown types get no
    /// expansion, which is the conservative boundary behaviour.
    pub fn expansion(&self, name: &str) -> Expand {
        self.types
            .get(name)
            .map(|t| t.expansion)
            .unwrap_or(Expand::NONE)
    }

    pub fn text_property(&self, name: &str) -> Option<&str> {
        self.types.get(name)?.text_property.as_deref()
    }

    pub fn items_property(&self, name: &str) -> Option<&str> {
        self.types.get(name)?.items_property.as_deref()
    }

    /// Fill declared-but-missing properties with their defaults.
    pub fn apply_defaults(&self, node: &mut Node) -> Result<(), DocumentError> {
        let node_type = self.get(&node.node_type)?;
        for (prop, spec) in &node_type.properties {
            if !node.properties.contains_key(prop) {
                node.properties.insert(prop.clone(), spec.default_value());
            }
        }
        Ok(())
    }

    /// Check every declared property present on `node` against its shape.
    pub fn validate(&self, node: &Node) -> Result<(), DocumentError> {
        let node_type = self.get(&node.node_type)?;
        for (prop, spec) in &node_type.properties {
            let Some(value) = node.properties.get(prop) else {
                return Err(DocumentError::SchemaViolation {
                    node: node.id.clone(),
                    property: prop.clone(),
                    reason: "missing".to_string(),
                });
            };
            if !spec.matches(value) {
                return Err(DocumentError::SchemaViolation {
                    node: node.id.clone(),
                    property: prop.clone(),
                    reason: format!("value {value} does not match {spec:?}"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn schema() -> Schema {
        let mut s = Schema::new();
        s.register(
            NodeType::leaf("paragraph")
                .text("content")
                .mergeable_with(["paragraph", "heading"])
                .split_into("paragraph")
                .allow_annotations(["strong"]),
        );
        s.register(NodeType::composite("list", "items"));
        s.register(NodeType::annotation("strong").expand(Expand::RIGHT).splittable());
        s
    }

    #[test]
    fn kinds_and_capabilities() {
        let s = schema();
        assert_eq!(s.kind("paragraph").unwrap(), NodeKind::Leaf);
        assert!(s.is_composite("list"));
        assert!(s.is_annotation("strong"));
        assert_eq!(s.text_property("paragraph"), Some("content"));
        assert_eq!(s.items_property("list"), Some("items"));
        assert_eq!(s.expansion("strong"), Expand::RIGHT);
        assert!(s.get("strong").unwrap().splittable);
        assert!(s.get("paragraph").unwrap().mergeable_with.contains("heading"));
    }

    #[test]
    fn unknown_type_is_an_error() {
        let s = schema();
        assert_eq!(
            s.kind("blockquote"),
            Err(DocumentError::UnknownType("blockquote".to_string()))
        );
    }

    #[test]
    fn defaults_fill_missing_properties() {
        let s = schema();
        let mut node = Node::new("p1", "paragraph");
        s.apply_defaults(&mut node).unwrap();
        assert_eq!(node.properties.get("content"), Some(&json!("")));
        s.validate(&node).unwrap();
    }

    #[test]
    fn validate_rejects_wrong_shape() {
        let s = schema();
        let mut node = Node::new("l1", "list");
        node.properties.insert("items".to_string(), json!("oops"));
        assert!(matches!(
            s.validate(&node),
            Err(DocumentError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn annotation_declares_anchor_properties() {
        let s = schema();
        let strong = s.get("strong").unwrap();
        assert_eq!(strong.properties.get("path"), Some(&PropertySpec::Path));
        assert_eq!(strong.properties.get("range"), Some(&PropertySpec::Range));
    }
}
