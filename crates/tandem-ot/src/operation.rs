//! Text operations and their inclusion transformation.
//!
//! Positions and lengths count Unicode scalar values, not bytes, so that
//! every participant agrees on offsets regardless of encoding.
//!
//! A [`Operation::Split`] is a sequential composite: `ops[i]` is defined on
//! the document produced by applying `ops[0..i]`.

use crate::error::{OperationError, Result};
use crate::ids::ParticipantId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An edit on a document's character sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    /// Insert `text` before the character at `position`.
    Insert {
        #[serde(rename = "pos")]
        position: usize,
        text: String,
    },
    /// Remove `text`, which starts at `position`.
    Delete {
        #[serde(rename = "pos")]
        position: usize,
        text: String,
    },
    /// Operations applied one after the other.
    Split { ops: Vec<Operation> },
    /// Leaves the document unchanged.
    #[serde(rename = "NoOp")]
    NoOperation,
}

/// Which of two inserts at the same position keeps its place.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tie {
    /// The transformed insert stays in front.
    Keep,
    /// The transformed insert moves behind the concurrent one.
    Shift,
}

impl Tie {
    /// Tie-break derived from participant identity: the smaller id stays in front.
    ///
    /// Both ends of a channel compare the same pair of origins, so both
    /// agree on the winner. The origins of two concurrent operations on one
    /// channel always differ.
    pub fn between(mine: &ParticipantId, theirs: &ParticipantId) -> Self {
        if mine <= theirs {
            Tie::Keep
        } else {
            Tie::Shift
        }
    }

    /// The tie-break seen from the other operation.
    pub fn flip(self) -> Self {
        match self {
            Tie::Keep => Tie::Shift,
            Tie::Shift => Tie::Keep,
        }
    }
}

impl Operation {
    pub fn insert(position: usize, text: impl Into<String>) -> Self {
        Operation::Insert {
            position,
            text: text.into(),
        }
    }

    pub fn delete(position: usize, text: impl Into<String>) -> Self {
        Operation::Delete {
            position,
            text: text.into(),
        }
    }

    /// Build a sequential composite.
    ///
    /// Nested splits are flattened and no-ops dropped; a single remaining
    /// operation is returned as is.
    pub fn compose(ops: impl IntoIterator<Item = Operation>) -> Self {
        let mut flat = Vec::new();
        for op in ops {
            flatten_into(op, &mut flat);
        }

        match flat.len() {
            0 => Operation::NoOperation,
            1 => flat.remove(0),
            _ => Operation::Split { ops: flat },
        }
    }

    /// Returns true if applying this operation never changes a document.
    pub fn is_noop(&self) -> bool {
        match self {
            Operation::NoOperation => true,
            Operation::Insert { text, .. } | Operation::Delete { text, .. } => text.is_empty(),
            Operation::Split { ops } => ops.iter().all(Operation::is_noop),
        }
    }

    /// Net change in document length, in characters.
    pub fn len_delta(&self) -> isize {
        match self {
            Operation::Insert { text, .. } => char_len(text) as isize,
            Operation::Delete { text, .. } => -(char_len(text) as isize),
            Operation::Split { ops } => ops.iter().map(Operation::len_delta).sum(),
            Operation::NoOperation => 0,
        }
    }

    /// The operation that undoes this one.
    pub fn invert(&self) -> Operation {
        match self {
            Operation::Insert { position, text } => Operation::delete(*position, text.clone()),
            Operation::Delete { position, text } => Operation::insert(*position, text.clone()),
            Operation::Split { ops } => Operation::Split {
                ops: ops.iter().rev().map(Operation::invert).collect(),
            },
            Operation::NoOperation => Operation::NoOperation,
        }
    }

    /// Apply to `content`, returning the edited text.
    ///
    /// Offsets outside the content are rejected rather than clamped.
    pub fn apply(&self, content: &str) -> Result<String> {
        match self {
            Operation::NoOperation => Ok(content.to_string()),
            Operation::Insert { position, text } => {
                let length = char_len(content);
                if *position > length {
                    return Err(OperationError::OutOfBounds {
                        position: *position,
                        length,
                    });
                }
                let (head, tail) = split_at_char(content, *position);
                let mut out = String::with_capacity(content.len() + text.len());
                out.push_str(head);
                out.push_str(text);
                out.push_str(tail);
                Ok(out)
            }
            Operation::Delete { position, text } => {
                let length = char_len(content);
                let end = position + char_len(text);
                if end > length {
                    return Err(OperationError::OutOfBounds {
                        position: end,
                        length,
                    });
                }
                let (head, rest) = split_at_char(content, *position);
                let (found, tail) = split_at_char(rest, char_len(text));
                if found != text {
                    return Err(OperationError::TextMismatch {
                        position: *position,
                        expected: text.clone(),
                        found: found.to_string(),
                    });
                }
                let mut out = String::with_capacity(head.len() + tail.len());
                out.push_str(head);
                out.push_str(tail);
                Ok(out)
            }
            Operation::Split { ops } => ops
                .iter()
                .try_fold(content.to_string(), |doc, op| op.apply(&doc)),
        }
    }

    /// Transform `self` so that it can be applied after the concurrent `other`.
    ///
    /// `tie` decides equal-position inserts for `self`; transforming `other`
    /// against `self` must use `tie.flip()`.
    pub fn transform(&self, other: &Operation, tie: Tie) -> Operation {
        match (self, other) {
            (Operation::NoOperation, _) => Operation::NoOperation,
            (_, Operation::NoOperation) => self.clone(),

            (Operation::Split { ops }, _) => {
                let mut against = other.clone();
                let mut transformed = Vec::with_capacity(ops.len());
                for op in ops {
                    transformed.push(op.transform(&against, tie));
                    against = against.transform(op, tie.flip());
                }
                Operation::compose(transformed)
            }
            (_, Operation::Split { ops }) => ops
                .iter()
                .fold(self.clone(), |current, op| current.transform(op, tie)),

            (
                Operation::Insert { position, text },
                Operation::Insert {
                    position: other_pos,
                    text: other_text,
                },
            ) => {
                let keeps = *position < *other_pos || (*position == *other_pos && tie == Tie::Keep);
                if keeps {
                    self.clone()
                } else {
                    Operation::insert(position + char_len(other_text), text.clone())
                }
            }

            (
                Operation::Insert { position, text },
                Operation::Delete {
                    position: del_pos,
                    text: del_text,
                },
            ) => {
                let del_end = del_pos + char_len(del_text);
                if *position <= *del_pos {
                    self.clone()
                } else if *position >= del_end {
                    Operation::insert(position - char_len(del_text), text.clone())
                } else {
                    // inside the deleted range: land where the range was
                    Operation::insert(*del_pos, text.clone())
                }
            }

            (
                Operation::Delete { position, text },
                Operation::Insert {
                    position: ins_pos,
                    text: ins_text,
                },
            ) => {
                let end = position + char_len(text);
                if *ins_pos <= *position {
                    Operation::delete(position + char_len(ins_text), text.clone())
                } else if *ins_pos >= end {
                    self.clone()
                } else {
                    let (before, after) = split_at_char(text, ins_pos - position);
                    Operation::Split {
                        ops: vec![
                            Operation::delete(*position, before),
                            Operation::delete(position + char_len(ins_text), after),
                        ],
                    }
                }
            }

            (
                Operation::Delete { position, text },
                Operation::Delete {
                    position: other_pos,
                    text: other_text,
                },
            ) => {
                let len = char_len(text);
                let other_len = char_len(other_text);
                let end = position + len;
                let other_end = other_pos + other_len;

                if end <= *other_pos {
                    self.clone()
                } else if *position >= other_end {
                    Operation::delete(position - other_len, text.clone())
                } else {
                    let mut remaining = String::new();
                    if *position < *other_pos {
                        remaining.push_str(split_at_char(text, other_pos - position).0);
                    }
                    if end > other_end {
                        remaining.push_str(split_at_char(text, other_end - position).1);
                    }
                    if remaining.is_empty() {
                        Operation::NoOperation
                    } else {
                        Operation::delete((*position).min(*other_pos), remaining)
                    }
                }
            }
        }
    }
}

fn flatten_into(op: Operation, out: &mut Vec<Operation>) {
    match op {
        Operation::NoOperation => {}
        Operation::Split { ops } => {
            for op in ops {
                flatten_into(op, out);
            }
        }
        op => out.push(op),
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Insert { position, text } => write!(f, "Insert({}, {:?})", position, text),
            Operation::Delete { position, text } => write!(f, "Delete({}, {:?})", position, text),
            Operation::Split { ops } => {
                write!(f, "Split(")?;
                for (i, op) in ops.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", op)?;
                }
                write!(f, ")")
            }
            Operation::NoOperation => write!(f, "NoOperation"),
        }
    }
}

pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split at a character offset; offsets past the end yield an empty tail.
pub(crate) fn split_at_char(s: &str, chars: usize) -> (&str, &str) {
    let byte = s
        .char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s.split_at(byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond(base: &str, a: &Operation, b: &Operation, tie_a: Tie) -> (String, String) {
        let via_a = b
            .transform(a, tie_a.flip())
            .apply(&a.apply(base).unwrap())
            .unwrap();
        let via_b = a
            .transform(b, tie_a)
            .apply(&b.apply(base).unwrap())
            .unwrap();
        (via_a, via_b)
    }

    #[test]
    fn test_apply_insert_and_delete() {
        let doc = Operation::insert(5, ", world").apply("hello").unwrap();
        assert_eq!(doc, "hello, world");

        let doc = Operation::delete(0, "hello").apply(&doc).unwrap();
        assert_eq!(doc, ", world");
    }

    #[test]
    fn test_apply_counts_characters() {
        let doc = Operation::insert(1, "ü").apply("gnter").unwrap();
        assert_eq!(doc, "günter");
        let doc = Operation::delete(2, "nt").apply(&doc).unwrap();
        assert_eq!(doc, "güer");
    }

    #[test]
    fn test_apply_rejects_out_of_bounds() {
        let err = Operation::insert(4, "x").apply("abc").unwrap_err();
        assert_eq!(err, OperationError::OutOfBounds { position: 4, length: 3 });

        let err = Operation::delete(2, "cd").apply("abc").unwrap_err();
        assert!(matches!(err, OperationError::OutOfBounds { .. }));
    }

    #[test]
    fn test_apply_rejects_wrong_deleted_text() {
        let err = Operation::delete(0, "xy").apply("abc").unwrap_err();
        assert!(matches!(err, OperationError::TextMismatch { .. }));
    }

    #[test]
    fn test_insert_insert_tie() {
        let (left, right) = diamond("", &Operation::insert(0, "foo"), &Operation::insert(0, "bar"), Tie::Keep);
        assert_eq!(left, "foobar");
        assert_eq!(left, right);

        let (left, right) = diamond("", &Operation::insert(0, "foo"), &Operation::insert(0, "bar"), Tie::Shift);
        assert_eq!(left, "barfoo");
        assert_eq!(left, right);
    }

    #[test]
    fn test_insert_inside_concurrent_delete_survives() {
        let base = "abcdef";
        let del = Operation::delete(1, "bcde");
        let ins = Operation::insert(3, "XY");

        let (left, right) = diamond(base, &del, &ins, Tie::Keep);
        assert_eq!(left, "aXYf");
        assert_eq!(left, right);

        // the delete splits around the inserted text
        let transformed = del.transform(&ins, Tie::Keep);
        assert_eq!(
            transformed,
            Operation::Split {
                ops: vec![Operation::delete(1, "bc"), Operation::delete(3, "de")]
            }
        );
    }

    #[test]
    fn test_overlapping_deletes() {
        let base = "0123456789";
        let a = Operation::delete(2, "23456");
        let b = Operation::delete(4, "4567");

        let (left, right) = diamond(base, &a, &b, Tie::Keep);
        assert_eq!(left, "0189");
        assert_eq!(left, right);

        assert_eq!(a.transform(&b, Tie::Keep), Operation::delete(2, "23"));
    }

    #[test]
    fn test_identical_deletes_become_noop() {
        let a = Operation::delete(3, "abc");
        assert_eq!(a.transform(&a, Tie::Keep), Operation::NoOperation);
    }

    #[test]
    fn test_split_transforms_element_wise() {
        let base = "hello world";
        // replace "world" with "there"
        let replace = Operation::compose(vec![
            Operation::delete(6, "world"),
            Operation::insert(6, "there"),
        ]);
        let other = Operation::insert(0, ">> ");

        let (left, right) = diamond(base, &replace, &other, Tie::Keep);
        assert_eq!(left, ">> hello there");
        assert_eq!(left, right);
    }

    #[test]
    fn test_noop_is_neutral() {
        let op = Operation::insert(2, "x");
        assert_eq!(op.transform(&Operation::NoOperation, Tie::Keep), op);
        assert_eq!(Operation::NoOperation.transform(&op, Tie::Keep), Operation::NoOperation);
    }

    #[test]
    fn test_invert_undoes() {
        let base = "abcdef";
        let op = Operation::compose(vec![
            Operation::delete(1, "bc"),
            Operation::insert(1, "XYZ"),
            Operation::insert(0, ">"),
        ]);
        let edited = op.apply(base).unwrap();
        assert_eq!(edited, ">aXYZdef");
        assert_eq!(op.invert().apply(&edited).unwrap(), base);
    }

    #[test]
    fn test_compose_flattens() {
        let op = Operation::compose(vec![
            Operation::NoOperation,
            Operation::Split {
                ops: vec![Operation::insert(0, "a"), Operation::NoOperation],
            },
            Operation::insert(1, "b"),
        ]);
        assert_eq!(
            op,
            Operation::Split {
                ops: vec![Operation::insert(0, "a"), Operation::insert(1, "b")]
            }
        );
        assert_eq!(Operation::compose(Vec::new()), Operation::NoOperation);
        assert_eq!(op.len_delta(), 2);
    }

    #[test]
    fn test_wire_shape() {
        let op = Operation::Split {
            ops: vec![Operation::insert(1, "a"), Operation::NoOperation],
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "Split",
                "ops": [
                    { "type": "Insert", "pos": 1, "text": "a" },
                    { "type": "NoOp" }
                ]
            })
        );
        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_tie_between_participants() {
        let alice = ParticipantId::new("alice");
        let bob = ParticipantId::new("bob");
        assert_eq!(Tie::between(&alice, &bob), Tie::Keep);
        assert_eq!(Tie::between(&bob, &alice), Tie::Shift);
        assert_eq!(Tie::between(&alice, &bob).flip(), Tie::between(&bob, &alice));
    }
}
