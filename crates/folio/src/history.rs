//! Change history — a parent-linked chain of applied operation lists.
//!
//! # Overview
//!
//! Every committed edit becomes one [`Change`]: the complete ordered list of
//! primitive operations it applied (annotation fix-ups included), linked to
//! the change it was applied on top of. The chain is branch-capable: undoing
//! and then editing records a sibling, and both branches stay addressable by
//! ref.
//!
//! Because recorded op lists are complete and invertible, rewinding is
//! "apply the inverses in reverse order" and forwarding is "apply the ops in
//! order" — the [`Document`](crate::document::Document) drives both against
//! its state. Merging is fast-forward only: a ref merges iff its parent
//! chain reaches the current head.

use std::fmt;

use indexmap::IndexMap;

use crate::error::DocumentError;
use crate::operation::Operation;

// ── Refs ──────────────────────────────────────────────────────────────────

/// Reference to one recorded change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChangeId(u64);

impl ChangeId {
    /// Wrap a raw ref value — used when importing changes produced by a
    /// collaborator, whose ids must not collide with locally recorded ones.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One committed edit: ops plus the parent link.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub id: ChangeId,
    pub parent: Option<ChangeId>,
    pub ops: Vec<Operation>,
}

// ── History ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct History {
    changes: IndexMap<u64, Change>,
    head: Option<ChangeId>,
    next_id: u64,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head(&self) -> Option<ChangeId> {
        self.head
    }

    pub(crate) fn set_head(&mut self, head: Option<ChangeId>) {
        self.head = head;
    }

    pub fn get(&self, id: ChangeId) -> Result<&Change, DocumentError> {
        self.changes
            .get(&id.0)
            .ok_or(DocumentError::UnknownChange(id.0))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Record `ops` as a new change on top of the current head and advance
    /// the head to it.
    pub fn record(&mut self, ops: Vec<Operation>) -> ChangeId {
        self.next_id += 1;
        let id = ChangeId(self.next_id);
        self.changes.insert(
            id.0,
            Change {
                id,
                parent: self.head,
                ops,
            },
        );
        self.head = Some(id);
        id
    }

    /// Add a change produced elsewhere (a collaborator's history). Its
    /// parent must already be known; re-importing the same change is
    /// rejected. Does not move the head.
    pub fn import(&mut self, change: Change) -> Result<(), DocumentError> {
        if self.changes.contains_key(&change.id.0) {
            return Err(DocumentError::DuplicateChange(change.id.0));
        }
        if let Some(parent) = change.parent {
            self.get(parent)?;
        }
        self.next_id = self.next_id.max(change.id.0);
        self.changes.insert(change.id.0, change);
        Ok(())
    }

    /// Ancestor chain `id → root`, inclusive of `id`.
    pub fn chain(&self, id: ChangeId) -> Result<Vec<ChangeId>, DocumentError> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            chain.push(current);
            cursor = self.get(current)?.parent;
        }
        Ok(chain)
    }

    /// The forward path `from → to` (oldest first, exclusive of `from`),
    /// or `None` when `to` is not a pure linear continuation of `from`.
    pub fn path_between(
        &self,
        from: Option<ChangeId>,
        to: ChangeId,
    ) -> Result<Option<Vec<ChangeId>>, DocumentError> {
        let mut path = Vec::new();
        let mut cursor = Some(to);
        while cursor != from {
            match cursor {
                Some(id) => {
                    path.push(id);
                    cursor = self.get(id)?.parent;
                }
                // Reached the root without meeting `from`: diverged.
                None => return Ok(None),
            }
        }
        path.reverse();
        Ok(Some(path))
    }

    /// Most recently recorded child of `parent` — the branch redo follows.
    pub fn latest_child(&self, parent: Option<ChangeId>) -> Option<ChangeId> {
        self.changes
            .values()
            .filter(|c| c.parent == parent)
            .map(|c| c.id)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_links_parent_chain() {
        let mut h = History::new();
        let c1 = h.record(vec![]);
        let c2 = h.record(vec![]);
        assert_eq!(h.head(), Some(c2));
        assert_eq!(h.get(c2).unwrap().parent, Some(c1));
        assert_eq!(h.chain(c2).unwrap(), vec![c2, c1]);
    }

    #[test]
    fn path_between_detects_divergence() {
        let mut h = History::new();
        let c1 = h.record(vec![]);
        let c2 = h.record(vec![]);
        // Branch: rewind to c1, record a sibling of c2.
        h.set_head(Some(c1));
        let c3 = h.record(vec![]);

        assert_eq!(h.path_between(Some(c1), c2).unwrap(), Some(vec![c2]));
        assert_eq!(h.path_between(Some(c1), c3).unwrap(), Some(vec![c3]));
        // c2 and c3 are siblings — no linear path between them.
        assert_eq!(h.path_between(Some(c2), c3).unwrap(), None);
        assert_eq!(h.path_between(None, c2).unwrap(), Some(vec![c1, c2]));
    }

    #[test]
    fn latest_child_picks_newest_branch() {
        let mut h = History::new();
        let c1 = h.record(vec![]);
        h.set_head(None);
        let c2 = h.record(vec![]);
        assert_eq!(h.latest_child(None), Some(c2));
        assert_eq!(h.latest_child(Some(c1)), None);
    }

    #[test]
    fn import_validates_parent_and_uniqueness() {
        let mut h = History::new();
        let c1 = h.record(vec![]);
        let foreign = Change {
            id: ChangeId(77),
            parent: Some(c1),
            ops: vec![],
        };
        h.import(foreign.clone()).unwrap();
        assert_eq!(h.import(foreign), Err(DocumentError::DuplicateChange(77)));
        let orphan = Change {
            id: ChangeId(99),
            parent: Some(ChangeId(50)),
            ops: vec![],
        };
        assert_eq!(h.import(orphan), Err(DocumentError::UnknownChange(50)));
    }
}
