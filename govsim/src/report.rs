//! Plain-text rendering of diff trees and simulation outcomes.

use std::fmt::Write as _;

use snapshot_diff::DiffNode;

use crate::simulator::SimulationOutcome;

/// Renders a diff tree as one line per leaf, leaves keyed by their dotted
/// path.
pub fn render_diff(node: &DiffNode) -> String {
    let mut out = String::from("# Configuration changes\n\n");
    let mut lines = Vec::new();
    collect_lines(node, &mut Vec::new(), &mut lines);
    if lines.is_empty() {
        out.push_str("No changes.\n");
    } else {
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

fn collect_lines(node: &DiffNode, path: &mut Vec<String>, out: &mut Vec<String>) {
    match node {
        DiffNode::Branch(children) => {
            for (key, child) in children {
                path.push(key.clone());
                collect_lines(child, path, out);
                path.pop();
            }
        }
        DiffNode::Leaf { from, to } => {
            let path = path.join(".");
            out.push(match (from, to) {
                (None, Some(added)) => format!("- {path}: added {added}"),
                (Some(removed), None) => format!("- {path}: removed {removed}"),
                (Some(from), Some(to)) => format!("- {path}: {from} -> {to}"),
                (None, None) => format!("- {path}: (empty change)"),
            });
        }
        DiffNode::Unchanged(value) => {
            out.push(format!("- {}: {value} (unchanged)", path.join(".")));
        }
    }
}

/// Renders a simulation outcome, revert reason included.
pub fn render_outcome(outcome: &SimulationOutcome) -> String {
    let mut out = String::new();
    if outcome.success {
        let _ = writeln!(out, "Simulation succeeded (gas used: {}).", outcome.gas_used);
    } else {
        let _ = writeln!(
            out,
            "Simulation reverted: {} (gas used: {}).",
            outcome.revert_reason.as_deref().unwrap_or("no reason given"),
            outcome.gas_used
        );
    }
    if let Some(diff) = &outcome.state_diff {
        let rendered = serde_json::to_string_pretty(diff).unwrap_or_else(|_| diff.to_string());
        let _ = writeln!(out, "\nState diff:\n{rendered}");
    }
    out
}

#[cfg(test)]
mod tests {
    use snapshot_diff::diff;

    use super::*;

    #[test]
    fn leaves_render_with_dotted_paths() {
        let pre = serde_json::json!({"reserves": {"DAI": {"ltv": "7500", "cap": "100"}}});
        let post = serde_json::json!({"reserves": {"DAI": {"ltv": "7700"}, "GHO": {"cap": "5"}}});
        let node = diff(&pre, &post, true).unwrap();
        let rendered = render_diff(&node);
        assert!(rendered.contains("- reserves.DAI.cap: removed \"100\""));
        assert!(rendered.contains("- reserves.DAI.ltv: \"7500\" -> \"7700\""));
        // Whole additions surface at the subtree root, not per field.
        assert!(rendered.contains("- reserves.GHO: added {\"cap\":\"5\"}"));
    }

    #[test]
    fn identical_snapshots_render_as_no_changes() {
        let value = serde_json::json!({"a": 1});
        let node = diff(&value, &value, true).unwrap();
        assert!(render_diff(&node).contains("No changes."));
    }

    #[test]
    fn reverts_render_their_reason() {
        let outcome = SimulationOutcome {
            success: false,
            gas_used: 21_000,
            revert_reason: Some("PROPOSAL_NOT_IN_QUEUED_STATE".into()),
            state_diff: None,
        };
        let rendered = render_outcome(&outcome);
        assert!(rendered.contains("reverted: PROPOSAL_NOT_IN_QUEUED_STATE"));
    }
}
