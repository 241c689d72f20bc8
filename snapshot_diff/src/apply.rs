//! Replays one side of a [`DiffNode`] tree onto a snapshot.
//!
//! Applying every `to` value of `diff(a, b)` onto `a` reconstructs `b`, and
//! applying every `from` onto `b` reconstructs `a`. Release tooling uses
//! this to check that a rendered diff really accounts for every change
//! between two snapshots.

use serde_json::Value;

use crate::DiffNode;

/// Which side of each leaf to replay.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Side {
    /// Replay `from` values, turning the post snapshot back into pre.
    Pre,
    /// Replay `to` values, turning the pre snapshot into post.
    Post,
}

/// Returns `base` with the chosen side of `node` written over it.
pub fn apply(base: &Value, node: &DiffNode, side: Side) -> Value {
    match node {
        DiffNode::Leaf { from, to } => {
            let chosen = match side {
                Side::Pre => from,
                Side::Post => to,
            };
            chosen.clone().unwrap_or(Value::Null)
        }
        DiffNode::Unchanged(_) => base.clone(),
        DiffNode::Branch(children) => {
            let mut out = base.as_object().cloned().unwrap_or_default();
            for (key, child) in children {
                match child {
                    DiffNode::Leaf { from, to } => {
                        let chosen = match side {
                            Side::Pre => from,
                            Side::Post => to,
                        };
                        match chosen {
                            Some(value) => {
                                out.insert(key.clone(), value.clone());
                            }
                            None => {
                                out.remove(key);
                            }
                        }
                    }
                    DiffNode::Unchanged(_) => {}
                    DiffNode::Branch(_) => {
                        let current = out.get(key).cloned().unwrap_or(Value::Null);
                        out.insert(key.clone(), apply(&current, child, side));
                    }
                }
            }
            Value::Object(out)
        }
    }
}
