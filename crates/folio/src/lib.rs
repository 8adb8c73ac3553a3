//! folio — a structured document model.
//!
//! A document is a graph of typed nodes (headings, paragraphs, annotations,
//! composites such as lists and figures) connected through ordered views.
//! All mutation is operation-based: four primitive operations (create,
//! delete, set, update-with-delta) flow through a synchronous pipeline that
//! keeps indexes, flattened container orderings, and annotation anchors
//! consistent before the next operation is admitted. Higher-level editing —
//! cursor-addressed text insertion, node split/merge/join, cut/copy/paste —
//! runs in discardable sessions committed as single history changes, with
//! undo/redo and fast-forward merge on top.

pub mod error;
pub mod schema;
pub mod node;
pub mod operation;
pub mod index;
pub mod container;
pub mod selection;
pub mod annotator;
pub mod document;
pub mod edit;
pub mod history;

pub use container::Container;
pub use document::{Document, DocumentState};
pub use edit::{copy_selection, DocumentFragment, Session};
pub use error::DocumentError;
pub use history::{Change, ChangeId, History};
pub use index::{AnnotationIndex, DocumentIndex, FragmentIndex, PropertyIndex, Selector};
pub use node::{Node, NodeId, PropertyPath};
pub use operation::{Operation, PropertyDelta};
pub use schema::{Expand, NodeKind, NodeType, PropertySpec, Schema};
pub use selection::{Coordinate, Selection, SelectionRange};

/// Returns the crate version at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
