//! Node records — typed, identified property bags owned by the graph.
//!
//! A [`Node`] is `{id, type, properties}`. The id and type are fixed at
//! creation; properties change only through graph-level operations, never by
//! direct assignment from outside the graph.

use std::fmt;

use indexmap::IndexMap;
use rand::Rng;
use serde_json::Value;

use crate::error::DocumentError;

// ── Identifiers ───────────────────────────────────────────────────────────

/// Unique node identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id with a type-ish prefix, e.g. `paragraph-9f2c41d0`.
    pub fn random(prefix: &str) -> Self {
        let mut rng = rand::thread_rng();
        Self(format!("{prefix}-{:08x}", rng.gen::<u32>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Address of one property of one node: `[nodeId, property]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyPath {
    pub node: NodeId,
    pub property: String,
}

impl PropertyPath {
    pub fn new(node: impl Into<NodeId>, property: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            property: property.into(),
        }
    }

    /// Encode as the `[node, property]` JSON pair stored in anchor
    /// properties.
    pub fn to_value(&self) -> Value {
        Value::Array(vec![
            Value::String(self.node.to_string()),
            Value::String(self.property.clone()),
        ])
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let arr = value.as_array()?;
        match arr.as_slice() {
            [Value::String(node), Value::String(property)] => {
                Some(Self::new(node.as_str(), property.as_str()))
            }
            _ => None,
        }
    }
}

// ── Node ──────────────────────────────────────────────────────────────────

/// The graph's backing store: all live nodes keyed by id, in creation order.
pub type NodeStore = IndexMap<NodeId, Node>;

/// A typed record of properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub node_type: String,
    pub properties: IndexMap<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            properties: IndexMap::new(),
        }
    }

    pub fn with(mut self, property: &str, value: Value) -> Self {
        self.properties.insert(property.to_string(), value);
        self
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    fn missing(&self, property: &str, reason: &str) -> DocumentError {
        DocumentError::SchemaViolation {
            node: self.id.clone(),
            property: property.to_string(),
            reason: reason.to_string(),
        }
    }

    // ── Typed accessors ───────────────────────────────────────────────────

    pub fn string_prop(&self, property: &str) -> Result<&str, DocumentError> {
        self.get(property)
            .and_then(Value::as_str)
            .ok_or_else(|| self.missing(property, "expected a string"))
    }

    /// Character length of a string property.
    pub fn text_len(&self, property: &str) -> Result<usize, DocumentError> {
        Ok(self.string_prop(property)?.chars().count())
    }

    pub fn usize_prop(&self, property: &str) -> Result<usize, DocumentError> {
        self.get(property)
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .ok_or_else(|| self.missing(property, "expected an unsigned number"))
    }

    pub fn id_list_prop(&self, property: &str) -> Result<Vec<NodeId>, DocumentError> {
        let arr = self
            .get(property)
            .and_then(Value::as_array)
            .ok_or_else(|| self.missing(property, "expected an id list"))?;
        arr.iter()
            .map(|v| {
                v.as_str()
                    .map(NodeId::from)
                    .ok_or_else(|| self.missing(property, "expected an id list"))
            })
            .collect()
    }

    /// `[start, end]` pair of a range property.
    pub fn range_prop(&self, property: &str) -> Result<(usize, usize), DocumentError> {
        let arr = self
            .get(property)
            .and_then(Value::as_array)
            .ok_or_else(|| self.missing(property, "expected a range"))?;
        match arr.as_slice() {
            [a, b] => match (a.as_u64(), b.as_u64()) {
                (Some(start), Some(end)) => Ok((start as usize, end as usize)),
                _ => Err(self.missing(property, "expected a range")),
            },
            _ => Err(self.missing(property, "expected a range")),
        }
    }

    pub fn path_prop(&self, property: &str) -> Result<PropertyPath, DocumentError> {
        self.get(property)
            .and_then(PropertyPath::from_value)
            .ok_or_else(|| self.missing(property, "expected a [node, property] path"))
    }

    // ── Annotation views ──────────────────────────────────────────────────

    /// Anchor path of an inline annotation.
    pub fn anchor_path(&self) -> Result<PropertyPath, DocumentError> {
        self.path_prop("path")
    }

    /// `[start, end)` of an inline annotation.
    pub fn range(&self) -> Result<(usize, usize), DocumentError> {
        self.range_prop("range")
    }

    /// Start anchor of a multi-node annotation: path + offset.
    pub fn start_anchor(&self) -> Result<(PropertyPath, usize), DocumentError> {
        Ok((self.path_prop("start_path")?, self.usize_prop("start_offset")?))
    }

    /// End anchor of a multi-node annotation: path + offset.
    pub fn end_anchor(&self) -> Result<(PropertyPath, usize), DocumentError> {
        Ok((self.path_prop("end_path")?, self.usize_prop("end_offset")?))
    }
}
