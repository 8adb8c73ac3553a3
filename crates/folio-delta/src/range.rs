//! Range transform — re-anchoring a character range after a [`TextDelta`].
//!
//! An annotation covers `[start, end)` of some text property. When a delta
//! rewrites that text, the range must follow: insertions inside the range
//! grow it, deletions shrink or clamp it, and insertions exactly on a
//! boundary are included or excluded per the annotation type's [`Expand`]
//! policy. A range that collapses to zero length signals that the annotation
//! has lost its text and must be deleted.
//!
//! The walk tracks a cursor through the delta exactly the way [`apply`]
//! does, so a transformed range is always consistent with the transformed
//! string.
//!
//! [`apply`]: crate::apply

use crate::{TextComponent, TextDelta};

// ── Expansion policy ──────────────────────────────────────────────────────

/// Boundary stickiness for an annotation type.
///
/// `left`/`right` decide whether an insertion landing exactly on the start
/// or end boundary becomes part of the annotated range. Typing at the end of
/// a bold run keeps bolding when `right` is set; typing immediately before a
/// comment anchor stays outside it when `left` is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Expand {
    pub left: bool,
    pub right: bool,
}

impl Expand {
    pub const NONE: Expand = Expand {
        left: false,
        right: false,
    };
    pub const BOTH: Expand = Expand {
        left: true,
        right: true,
    };
    pub const RIGHT: Expand = Expand {
        left: false,
        right: true,
    };
}

/// Which boundary of a range a standalone anchor represents.
///
/// Used for multi-node annotations, whose two anchors live on different
/// text properties and are therefore transformed one offset at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorSide {
    Start,
    End,
}

// ── Transform ─────────────────────────────────────────────────────────────

/// Recompute `[start, end)` after `delta` is applied to the annotated text.
///
/// Returns `None` when the range collapses to zero length — the annotated
/// text is gone and the caller must delete the annotation.
///
/// Boundary rules for an insertion of length `n` at position `p`:
/// - `p < start` — both boundaries shift right by `n`.
/// - `p == start` — range keeps its start (absorbing the insertion) only if
///   `expand.left`; otherwise the whole range shifts right.
/// - `start < p < end` — the range grows: `end += n`.
/// - `p == end` — the range grows only if `expand.right`.
/// - `p > end` — no change.
///
/// A deletion spanning `[p, p + n)` moves each boundary independently:
/// positions before the deletion are untouched, positions past it shift
/// left by `n`, and positions inside clamp to `p`.
pub fn transform_range(
    start: usize,
    end: usize,
    delta: &TextDelta,
    expand: Expand,
) -> Option<(usize, usize)> {
    let mut start = start;
    let mut end = end;
    let mut pos = 0usize;

    for comp in delta {
        match comp {
            TextComponent::Retain(n) => pos += n,
            TextComponent::Insert(s) => {
                let n = s.chars().count();
                if pos < start {
                    start += n;
                    end += n;
                } else if pos == start {
                    if expand.left {
                        end += n;
                    } else {
                        start += n;
                        end += n;
                    }
                } else if pos < end {
                    end += n;
                } else if pos == end && expand.right {
                    end += n;
                }
                pos += n;
            }
            TextComponent::Delete(s) => {
                let n = s.chars().count();
                start = shift_for_delete(start, pos, n);
                end = shift_for_delete(end, pos, n);
                // Cursor does not advance: the deleted text no longer exists.
            }
        }
    }

    if start < end {
        Some((start, end))
    } else {
        None
    }
}

/// Transform a single anchor offset.
///
/// `side` selects the tie-break used when an insertion lands exactly on the
/// anchor: a `Start` anchor stays put (absorbing the insertion) only under
/// `expand.left`, an `End` anchor moves past it only under `expand.right`.
pub fn transform_anchor(
    offset: usize,
    delta: &TextDelta,
    side: AnchorSide,
    expand: Expand,
) -> usize {
    let mut offset = offset;
    let mut pos = 0usize;

    for comp in delta {
        match comp {
            TextComponent::Retain(n) => pos += n,
            TextComponent::Insert(s) => {
                let n = s.chars().count();
                let moves = match side {
                    AnchorSide::Start => pos < offset || (pos == offset && !expand.left),
                    AnchorSide::End => pos < offset || (pos == offset && expand.right),
                };
                if moves {
                    offset += n;
                }
                pos += n;
            }
            TextComponent::Delete(s) => {
                let n = s.chars().count();
                offset = shift_for_delete(offset, pos, n);
            }
        }
    }
    offset
}

fn shift_for_delete(x: usize, pos: usize, len: usize) -> usize {
    if x <= pos {
        x
    } else if x >= pos + len {
        x - len
    } else {
        pos
    }
}
