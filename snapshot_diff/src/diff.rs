use std::collections::{BTreeMap, BTreeSet};

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Stores the result of diff operations. Returns a [`DiffError`] upon
/// failure.
pub type DiffResult<T> = Result<T, DiffError>;

/// Maximum tree depth [`diff`] will recurse into. Snapshots are untrusted
/// JSON; past this depth the input is considered malformed rather than
/// merely deep.
pub const MAX_DEPTH: usize = 64;

/// An error type for diff operations.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum DiffError {
    /// Both trees nest deeper than [`MAX_DEPTH`].
    #[error("snapshot nesting exceeds the maximum supported depth of {MAX_DEPTH}")]
    DepthLimitExceeded,
}

/// One node of a diff tree.
///
/// A node is a leaf iff the corresponding snapshot values are not both
/// composite: primitive-vs-primitive changes, pure additions/removals and
/// type mismatches all stop the recursion. `None` on one side of a leaf
/// denotes a key present in only one snapshot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DiffNode {
    /// A changed value: what it was and what it became.
    Leaf {
        /// Value in the pre snapshot, absent for pure additions.
        from: Option<Value>,
        /// Value in the post snapshot, absent for pure removals.
        to: Option<Value>,
    },
    /// An equal primitive kept as context when unchanged values are not
    /// dropped. Carries the raw value, not a `{from, to}` wrapper.
    Unchanged(Value),
    /// An internal node mapping child keys to their diffs.
    Branch(BTreeMap<String, DiffNode>),
}

impl DiffNode {
    /// Whether this subtree records no change at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Branch(children) => children.is_empty(),
            Self::Leaf { .. } | Self::Unchanged(_) => false,
        }
    }
}

impl Serialize for DiffNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Leaf { from, to } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("from", from)?;
                map.serialize_entry("to", to)?;
                map.end()
            }
            Self::Unchanged(value) => value.serialize(serializer),
            Self::Branch(children) => {
                let mut map = serializer.serialize_map(Some(children.len()))?;
                for (key, child) in children {
                    map.serialize_entry(key, child)?;
                }
                map.end()
            }
        }
    }
}

/// Computes the structural diff between two snapshots.
///
/// Traversal is a set of independent per-key decisions, so ordering never
/// affects the result. Subtrees in which nothing changed vanish from the
/// output regardless of `drop_unchanged`; `drop_unchanged` only controls
/// whether equal *primitives* under a changed subtree are kept as raw
/// context values.
pub fn diff(pre: &Value, post: &Value, drop_unchanged: bool) -> DiffResult<DiffNode> {
    Ok(diff_value(pre, post, drop_unchanged, 0)?
        .unwrap_or_else(|| DiffNode::Branch(BTreeMap::new())))
}

/// `None` means the node is omitted from the output entirely: an equal
/// primitive being dropped, or a subtree with no changes underneath.
fn diff_value(
    pre: &Value,
    post: &Value,
    drop_unchanged: bool,
    depth: usize,
) -> DiffResult<Option<DiffNode>> {
    if depth > MAX_DEPTH {
        return Err(DiffError::DepthLimitExceeded);
    }

    match (pre.as_object(), post.as_object()) {
        (Some(pre_obj), Some(post_obj)) => {
            let keys: BTreeSet<&String> = pre_obj.keys().chain(post_obj.keys()).collect();
            let mut children = BTreeMap::new();
            for key in keys {
                let child = match (pre_obj.get(key), post_obj.get(key)) {
                    (Some(from), None) => Some(DiffNode::Leaf {
                        from: Some(from.clone()),
                        to: None,
                    }),
                    (None, Some(to)) => Some(DiffNode::Leaf {
                        from: None,
                        to: Some(to.clone()),
                    }),
                    (Some(from), Some(to)) => diff_value(from, to, drop_unchanged, depth + 1)?,
                    (None, None) => unreachable!("key drawn from the union of both maps"),
                };
                if let Some(child) = child.filter(|c| !c.is_empty()) {
                    children.insert(key.clone(), child);
                }
            }
            Ok(Some(DiffNode::Branch(children)))
        }
        // Not both composite: a changed leaf, an unchanged primitive, or a
        // type mismatch (always a leaf, never recursed into).
        _ if pre == post => Ok((!drop_unchanged).then(|| DiffNode::Unchanged(pre.clone()))),
        _ => Ok(Some(DiffNode::Leaf {
            from: Some(pre.clone()),
            to: Some(post.clone()),
        })),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::apply::{apply, Side};

    fn diff_json(pre: &Value, post: &Value, drop_unchanged: bool) -> Value {
        serde_json::to_value(diff(pre, post, drop_unchanged).unwrap()).unwrap()
    }

    #[test]
    fn identical_snapshots_diff_empty() {
        let snap = json!({
            "reserves": {"DAI": {"ltv": "7700", "borrowingEnabled": true}},
            "poolConfig": {"oracle": "0xabc"},
        });
        assert_eq!(diff_json(&snap, &snap, true), json!({}));
    }

    #[test]
    fn changed_primitive_becomes_from_to_leaf() {
        assert_eq!(
            diff_json(&json!({"a": "x"}), &json!({"a": "y"}), true),
            json!({"a": {"from": "x", "to": "y"}})
        );
    }

    #[test]
    fn unchanged_value_kept_raw_when_not_dropped() {
        let snap = json!({"a": {"a": "x"}});
        assert_eq!(diff_json(&snap, &snap, false), json!({"a": {"a": "x"}}));
    }

    #[test]
    fn unchanged_subtree_vanishes_even_when_keeping_unchanged() {
        // The sibling subtree with no changes disappears entirely; equal
        // primitives inside the *changed* subtree stay as raw context.
        let pre = json!({
            "changed": {"ltv": "7700", "symbol": "DAI"},
            "steady": {"ltv": "8000"},
        });
        let post = json!({
            "changed": {"ltv": "7800", "symbol": "DAI"},
            "steady": {"ltv": "8000"},
        });
        assert_eq!(
            diff_json(&pre, &post, false),
            json!({"changed": {"ltv": {"from": "7700", "to": "7800"}, "symbol": "DAI"}})
        );
        assert_eq!(
            diff_json(&pre, &post, true),
            json!({"changed": {"ltv": {"from": "7700", "to": "7800"}}})
        );
    }

    #[test]
    fn additions_and_removals_use_null_sides() {
        let pre = json!({"kept": 1, "removed": {"deep": true}});
        let post = json!({"kept": 1, "added": "v"});
        assert_eq!(
            diff_json(&pre, &post, true),
            json!({
                "added": {"from": null, "to": "v"},
                "removed": {"from": {"deep": true}, "to": null},
            })
        );
    }

    #[test]
    fn type_mismatch_is_a_leaf_not_a_recursion() {
        let pre = json!({"a": {"nested": 1}});
        let post = json!({"a": 5});
        assert_eq!(
            diff_json(&pre, &post, true),
            json!({"a": {"from": {"nested": 1}, "to": 5}})
        );
    }

    #[test]
    fn arrays_compare_as_whole_values() {
        let pre = json!({"assets": ["DAI", "USDC"]});
        let post = json!({"assets": ["DAI", "GHO"]});
        assert_eq!(
            diff_json(&pre, &post, true),
            json!({"assets": {"from": ["DAI", "USDC"], "to": ["DAI", "GHO"]}})
        );
    }

    #[test]
    fn depth_limit_guards_malformed_input() {
        let mut pre = json!({"leaf": 1});
        let mut post = json!({"leaf": 2});
        for _ in 0..=MAX_DEPTH {
            pre = json!({"wrap": pre});
            post = json!({"wrap": post});
        }
        assert_eq!(
            diff(&pre, &post, true),
            Err(DiffError::DepthLimitExceeded)
        );
    }

    #[test]
    fn round_trip_law() {
        let pre = json!({
            "reserves": {
                "DAI": {"ltv": "7700", "frozen": false},
                "USDC": {"ltv": "8000"},
            },
            "eModes": {"1": {"label": "stablecoins"}},
            "oracle": "0x111",
        });
        let post = json!({
            "reserves": {
                "DAI": {"ltv": "7900", "frozen": false, "cap": "100000"},
                "GHO": {"ltv": "0"},
            },
            "eModes": {"1": {"label": "stablecoins"}},
            "oracle": "0x222",
        });
        let d = diff(&pre, &post, true).unwrap();
        assert_eq!(apply(&pre, &d, Side::Post), post);
        assert_eq!(apply(&post, &d, Side::Pre), pre);
    }
}
