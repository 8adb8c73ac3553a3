//! Array splice delta — structural diffs over ordered lists.
//!
//! Unlike [`TextDelta`], an [`ArrayDelta`] is a single splice: composite
//! children and view entries change one element at a time, and the document
//! graph re-synchronizes derived state between consecutive splices.
//!
//! [`TextDelta`]: crate::TextDelta

use crate::DeltaError;

/// A single splice against a `Vec<T>`.
///
/// `Delete` carries the removed value so the delta inverts exactly. `Move`
/// removes the element at `pos` and reinserts it at `target`, where `target`
/// is interpreted against the array *after* the removal; bounds are checked
/// on both sides so no element is ever duplicated or dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayDelta<T> {
    Insert { pos: usize, value: T },
    Delete { pos: usize, value: T },
    Move { pos: usize, target: usize },
}

impl<T: Clone + PartialEq + std::fmt::Debug> ArrayDelta<T> {
    /// Apply this splice to `items` in place.
    pub fn apply(&self, items: &mut Vec<T>) -> Result<(), DeltaError> {
        match self {
            ArrayDelta::Insert { pos, value } => {
                if *pos > items.len() {
                    return Err(DeltaError::PositionOutOfBounds(*pos));
                }
                items.insert(*pos, value.clone());
            }
            ArrayDelta::Delete { pos, value } => {
                if *pos >= items.len() {
                    return Err(DeltaError::PositionOutOfBounds(*pos));
                }
                if &items[*pos] != value {
                    return Err(DeltaError::DeleteMismatch {
                        expected: format!("{value:?}"),
                        found: format!("{:?}", items[*pos]),
                    });
                }
                items.remove(*pos);
            }
            ArrayDelta::Move { pos, target } => {
                if *pos >= items.len() {
                    return Err(DeltaError::PositionOutOfBounds(*pos));
                }
                let value = items.remove(*pos);
                if *target > items.len() {
                    // Restore before reporting so the caller's array is intact.
                    items.insert(*pos, value);
                    return Err(DeltaError::PositionOutOfBounds(*target));
                }
                items.insert(*target, value);
            }
        }
        Ok(())
    }

    /// The splice undoing this one.
    pub fn invert(&self) -> ArrayDelta<T> {
        match self {
            ArrayDelta::Insert { pos, value } => ArrayDelta::Delete {
                pos: *pos,
                value: value.clone(),
            },
            ArrayDelta::Delete { pos, value } => ArrayDelta::Insert {
                pos: *pos,
                value: value.clone(),
            },
            ArrayDelta::Move { pos, target } => ArrayDelta::Move {
                pos: *target,
                target: *pos,
            },
        }
    }
}
