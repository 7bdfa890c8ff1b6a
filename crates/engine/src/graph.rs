//! Graph helpers used to scope and schedule a run.
//!
//! No structural validation happens here: blueprints may contain cycles
//! (retry loops, recursive sub-flows) and edges pointing at nodes outside
//! the current node set. Cycles are bounded at run time by the depth guard;
//! dangling edges are skipped.

use std::collections::{HashMap, HashSet};

use blocks::Node;

/// Nodes reachable from `start_node_id`.
///
/// Without `branch_out_id` the walk starts at the start node itself and
/// includes it. With it, the walk starts at the targets of the start node's
/// edges labelled `branch_out_id` and the start node is never included.
/// Past the first hop every edge is followed regardless of label. Each node
/// is visited once; the result keeps the order of `all_nodes`.
pub fn filter_branch(
    all_nodes: &[Node],
    start_node_id: &str,
    branch_out_id: Option<&str>,
) -> Vec<Node> {
    let by_id: HashMap<&str, &Node> = all_nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = Vec::new();

    match branch_out_id {
        None => stack.push(start_node_id),
        Some(out_id) => {
            visited.insert(start_node_id);
            if let Some(start) = by_id.get(start_node_id) {
                stack.extend(start.outs_for(out_id).map(|out| out.target_node_id.as_str()));
            }
        }
    }

    let mut reachable: HashSet<&str> = HashSet::new();
    while let Some(node_id) = stack.pop() {
        if !visited.insert(node_id) {
            continue;
        }
        // Edges into nodes outside the set are dropped silently.
        let Some(node) = by_id.get(node_id) else {
            continue;
        };
        reachable.insert(node_id);
        stack.extend(
            node.outs
                .iter()
                .map(|out| out.target_node_id.as_str())
                .filter(|target| !visited.contains(target)),
        );
    }

    all_nodes
        .iter()
        .filter(|n| reachable.contains(n.id.as_str()))
        .cloned()
        .collect()
}

/// Distinct targets of `node`'s edges labelled `outcome`, in edge order.
pub fn fired_targets<'a>(node: &'a Node, outcome: &'a str) -> Vec<&'a str> {
    let mut seen: HashSet<&str> = HashSet::new();
    node.outs_for(outcome)
        .map(|out| out.target_node_id.as_str())
        .filter(|target| seen.insert(*target))
        .collect()
}

/// Number of distinct incoming edges per node, counting only edges whose
/// source and target are both in `nodes`. Every node gets an entry.
pub fn in_degrees(nodes: &[Node]) -> HashMap<String, usize> {
    let mut degrees: HashMap<String, usize> = nodes.iter().map(|n| (n.id.clone(), 0)).collect();

    let mut edges: HashSet<(&str, &str, &str)> = HashSet::new();
    for node in nodes {
        for out in &node.outs {
            let edge = (
                node.id.as_str(),
                out.outcome_id.as_str(),
                out.target_node_id.as_str(),
            );
            if edges.insert(edge) {
                if let Some(degree) = degrees.get_mut(&out.target_node_id) {
                    *degree += 1;
                }
            }
        }
    }

    degrees
}
