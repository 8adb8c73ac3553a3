//! Reversible delta primitives for the folio document model.
//!
//! # Operation format
//!
//! A [`TextDelta`] is a sequence of components applied left-to-right against
//! a character sequence:
//! - `Retain(n)` — skip `n` characters
//! - `Insert(s)` — insert text
//! - `Delete(s)` — delete text, storing the deleted characters so the delta
//!   can be inverted
//!
//! All offsets and lengths are measured in `char`s, not bytes.
//!
//! [`ArrayDelta`] is the structural counterpart for ordered lists, and
//! [`range`] hosts the annotation range transform built on top of
//! [`TextDelta`].

pub mod array;
pub mod range;

pub use array::ArrayDelta;
pub use range::{transform_anchor, transform_range, AnchorSide, Expand};

use thiserror::Error;

/// Errors produced when a delta does not fit the value it is applied to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeltaError {
    #[error("delta walks past the end of the value")]
    Overflow,
    #[error("delete component expected {expected:?}, found {found:?}")]
    DeleteMismatch { expected: String, found: String },
    #[error("array delta position {0} out of bounds")]
    PositionOutOfBounds(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextComponent {
    Retain(usize),
    Insert(String),
    Delete(String),
}

pub type TextDelta = Vec<TextComponent>;

impl TextComponent {
    /// Length of this component (in chars) on the *source* string.
    pub fn src_len(&self) -> usize {
        match self {
            TextComponent::Retain(n) => *n,
            TextComponent::Insert(_) => 0,
            TextComponent::Delete(s) => s.chars().count(),
        }
    }

    /// Length of this component (in chars) on the *destination* string.
    pub fn dst_len(&self) -> usize {
        match self {
            TextComponent::Retain(n) => *n,
            TextComponent::Insert(s) => s.chars().count(),
            TextComponent::Delete(_) => 0,
        }
    }
}

/// Append a component, merging with the last component if same type.
fn append(delta: &mut TextDelta, comp: TextComponent) {
    match (delta.last_mut(), &comp) {
        (Some(TextComponent::Retain(n)), TextComponent::Retain(m)) => {
            *n += m;
            return;
        }
        (Some(TextComponent::Insert(s)), TextComponent::Insert(t)) => {
            s.push_str(t);
            return;
        }
        (Some(TextComponent::Delete(s)), TextComponent::Delete(t)) => {
            s.push_str(t);
            return;
        }
        _ => {}
    }
    delta.push(comp);
}

/// Normalize: coalesce adjacent same-type components, drop empties, and
/// strip trailing retains (they are implicit).
pub fn normalize(delta: TextDelta) -> TextDelta {
    let mut result: TextDelta = Vec::new();
    for comp in delta {
        match &comp {
            TextComponent::Retain(0) => {}
            TextComponent::Insert(s) | TextComponent::Delete(s) if s.is_empty() => {}
            _ => append(&mut result, comp),
        }
    }
    while matches!(result.last(), Some(TextComponent::Retain(_))) {
        result.pop();
    }
    result
}

/// Delta inserting `text` at character position `pos`.
pub fn insert_at(pos: usize, text: &str) -> TextDelta {
    normalize(vec![
        TextComponent::Retain(pos),
        TextComponent::Insert(text.to_string()),
    ])
}

/// Delta deleting `text` starting at character position `pos`.
///
/// The caller supplies the text actually at that position; [`apply`] verifies
/// the match so a stale delta fails loudly instead of corrupting the value.
pub fn delete_at(pos: usize, text: &str) -> TextDelta {
    normalize(vec![
        TextComponent::Retain(pos),
        TextComponent::Delete(text.to_string()),
    ])
}

/// Apply a [`TextDelta`] to a string, returning the result.
pub fn apply(s: &str, delta: &TextDelta) -> Result<String, DeltaError> {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::new();
    let mut idx = 0usize;

    for comp in delta {
        match comp {
            TextComponent::Retain(n) => {
                if idx + n > chars.len() {
                    return Err(DeltaError::Overflow);
                }
                result.extend(chars[idx..idx + n].iter());
                idx += n;
            }
            TextComponent::Delete(del) => {
                let len = del.chars().count();
                if idx + len > chars.len() {
                    return Err(DeltaError::Overflow);
                }
                let found: String = chars[idx..idx + len].iter().collect();
                if &found != del {
                    return Err(DeltaError::DeleteMismatch {
                        expected: del.clone(),
                        found,
                    });
                }
                idx += len;
            }
            TextComponent::Insert(ins) => {
                result.push_str(ins);
            }
        }
    }
    result.extend(chars[idx..].iter());
    Ok(result)
}

/// Invert a delta: inserts become deletes and vice versa.
///
/// For any string `s` that `delta` applies to,
/// `apply(&apply(s, delta)?, &invert(delta))` restores `s`.
pub fn invert(delta: &TextDelta) -> TextDelta {
    delta
        .iter()
        .map(|comp| match comp {
            TextComponent::Retain(n) => TextComponent::Retain(*n),
            TextComponent::Insert(s) => TextComponent::Delete(s.clone()),
            TextComponent::Delete(s) => TextComponent::Insert(s.clone()),
        })
        .collect()
}

/// Number of chars the delta consumes from its source string.
pub fn src_len(delta: &TextDelta) -> usize {
    delta.iter().map(TextComponent::src_len).sum()
}

/// Number of chars the delta produces on its destination string.
pub fn dst_len(delta: &TextDelta) -> usize {
    delta.iter().map(TextComponent::dst_len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_insert_in_middle() {
        let delta = insert_at(5, " cruel");
        assert_eq!(apply("hello world", &delta).unwrap(), "hello cruel world");
    }

    #[test]
    fn apply_delete_verifies_text() {
        let delta = delete_at(0, "hell");
        assert_eq!(apply("hello", &delta).unwrap(), "o");

        let stale = delete_at(0, "help");
        assert_eq!(
            apply("hello", &stale),
            Err(DeltaError::DeleteMismatch {
                expected: "help".to_string(),
                found: "hell".to_string(),
            })
        );
    }

    #[test]
    fn apply_rejects_overflow() {
        let delta = vec![TextComponent::Retain(10)];
        assert_eq!(apply("short", &delta), Err(DeltaError::Overflow));
    }

    #[test]
    fn normalize_coalesces_and_trims() {
        let delta = vec![
            TextComponent::Retain(2),
            TextComponent::Retain(3),
            TextComponent::Insert("x".to_string()),
            TextComponent::Insert("y".to_string()),
            TextComponent::Retain(4),
        ];
        assert_eq!(
            normalize(delta),
            vec![
                TextComponent::Retain(5),
                TextComponent::Insert("xy".to_string()),
            ]
        );
    }

    #[test]
    fn invert_round_trips() {
        let source = "The quick brown fox";
        let delta = normalize(vec![
            TextComponent::Retain(4),
            TextComponent::Delete("quick".to_string()),
            TextComponent::Insert("slow".to_string()),
        ]);
        let applied = apply(source, &delta).unwrap();
        assert_eq!(applied, "The slow brown fox");
        assert_eq!(apply(&applied, &invert(&delta)).unwrap(), source);
    }

    #[test]
    fn char_indexed_not_byte_indexed() {
        let delta = insert_at(2, "é");
        assert_eq!(apply("héllo", &delta).unwrap(), "hééllo");
    }

    #[test]
    fn lengths() {
        let delta = vec![
            TextComponent::Retain(2),
            TextComponent::Delete("ab".to_string()),
            TextComponent::Insert("xyz".to_string()),
        ];
        assert_eq!(src_len(&delta), 4);
        assert_eq!(dst_len(&delta), 5);
    }
}
