//! Selections — cursor and range addressing over a container's flat order.
//!
//! A [`Coordinate`] is `(node position, character position)` against the
//! container's `list_view`; a [`Selection`] is an ordered pair of
//! coordinates. Selections are derived state: they are recomputed after
//! every edit from the operation's effect and never persisted in the graph.

use crate::container::Container;
use crate::error::DocumentError;
use crate::node::{NodeId, NodeStore};
use crate::schema::Schema;

// ── Coordinates ───────────────────────────────────────────────────────────

/// A position in the container: which leaf, and which character inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Coordinate {
    pub node_pos: usize,
    pub char_pos: usize,
}

impl Coordinate {
    pub fn new(node_pos: usize, char_pos: usize) -> Self {
        Self { node_pos, char_pos }
    }
}

/// A contiguous selection over the container's flattened ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: Coordinate,
    pub end: Coordinate,
}

/// One per-leaf fragment of a selection: a character range over a single
/// node's text property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRange {
    pub node: NodeId,
    /// The node's text property; `None` for non-text leaves (image, …).
    pub property: Option<String>,
    pub start: usize,
    pub end: usize,
    /// The range spans the node's entire content. Non-text leaves always
    /// report full coverage — they have no character positions to split.
    pub fully_covers: bool,
}

impl Selection {
    pub fn new(start: Coordinate, end: Coordinate) -> Self {
        Self { start, end }
    }

    /// A caret at one position.
    pub fn collapsed(node_pos: usize, char_pos: usize) -> Self {
        let at = Coordinate::new(node_pos, char_pos);
        Self { start: at, end: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Same selection with `start <= end`.
    pub fn normalized(&self) -> Selection {
        if self.start <= self.end {
            *self
        } else {
            Selection {
                start: self.end,
                end: self.start,
            }
        }
    }

    /// Does the selection span more than one leaf?
    pub fn spans_nodes(&self) -> bool {
        self.start.node_pos != self.end.node_pos
    }

    /// Split the selection into one character range per spanned leaf.
    pub fn ranges(
        &self,
        container: &Container,
        store: &NodeStore,
        schema: &Schema,
    ) -> Result<Vec<SelectionRange>, DocumentError> {
        let sel = self.normalized();
        let mut ranges = Vec::with_capacity(sel.end.node_pos - sel.start.node_pos + 1);
        for node_pos in sel.start.node_pos..=sel.end.node_pos {
            let id = container
                .node_at(node_pos)
                .ok_or(DocumentError::SelectionOutOfView)?;
            let node = store
                .get(id)
                .ok_or_else(|| DocumentError::UnknownNode(id.clone()))?;
            let property = schema.text_property(&node.node_type).map(str::to_string);
            let len = match &property {
                Some(p) => node.text_len(p)?,
                None => 0,
            };
            let start = if node_pos == sel.start.node_pos {
                sel.start.char_pos.min(len)
            } else {
                0
            };
            let end = if node_pos == sel.end.node_pos {
                sel.end.char_pos.min(len)
            } else {
                len
            };
            ranges.push(SelectionRange {
                node: id.clone(),
                fully_covers: property.is_none() || (start == 0 && end == len),
                property,
                start,
                end,
            });
        }
        Ok(ranges)
    }
}
