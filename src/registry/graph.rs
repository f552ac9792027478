//! Dependency-graph algorithms over an adjacency map
//!
//! The adjacency map stores, for every component id, the ordered list of ids
//! it depends on (edges point dependent → dependency). Every traversal keeps a
//! visited set, so cycles (including self-loops) never loop forever and
//! never make a node appear in its own closure.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// id → ordered direct dependencies
pub type DependencyGraph = BTreeMap<String, Vec<String>>;

/// Direct dependents of `id`: every node listing `id` as a dependency.
pub fn direct_dependents(graph: &DependencyGraph, id: &str) -> Vec<String> {
    graph
        .iter()
        .filter(|(_, deps)| deps.iter().any(|d| d == id))
        .map(|(node, _)| node.clone())
        .collect()
}

/// Transitive closure following dependency edges, excluding `id` itself.
pub fn transitive_dependencies(graph: &DependencyGraph, id: &str) -> BTreeSet<String> {
    reachable(id, |node| graph.get(node).cloned().unwrap_or_default())
}

/// Transitive closure following reverse edges, excluding `id` itself.
pub fn transitive_dependents(graph: &DependencyGraph, id: &str) -> BTreeSet<String> {
    reachable(id, |node| direct_dependents(graph, node))
}

/// Every node reachable from `start` through `neighbours`, excluding
/// `start` itself. Cycle-guarded.
pub fn reachable<F>(start: &str, mut neighbours: F) -> BTreeSet<String>
where
    F: FnMut(&str) -> Vec<String>,
{
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start.to_string());
    let mut frontier = vec![start.to_string()];
    let mut reached = BTreeSet::new();

    while let Some(node) = frontier.pop() {
        for next in neighbours(&node) {
            if visited.insert(next.clone()) {
                reached.insert(next.clone());
                frontier.push(next);
            }
        }
    }

    reached
}

/// Whether the graph contains a cycle of any length, self-loops included.
pub fn has_cycle(graph: &DependencyGraph) -> bool {
    find_cycle(graph).is_some()
}

/// One cycle in the graph as a path that starts and ends on the same id.
///
/// Iterative depth-first search. `path` holds the current branch and
/// `on_path` maps each of its nodes to its position, so meeting a node that
/// is still on the branch closes a cycle without rescanning the branch.
pub fn find_cycle(graph: &DependencyGraph) -> Option<Vec<String>> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut on_path: HashMap<&str, usize> = HashMap::new();
    let mut path: Vec<&str> = Vec::new();
    // (node, index of the next dependency to explore)
    let mut frames: Vec<(&str, usize)> = Vec::new();

    for root in graph.keys() {
        if !visited.insert(root.as_str()) {
            continue;
        }
        on_path.insert(root.as_str(), path.len());
        path.push(root.as_str());
        frames.push((root.as_str(), 0));

        while let Some(frame) = frames.last_mut() {
            let (node, next) = *frame;
            let deps = graph.get(node).map(Vec::as_slice).unwrap_or_default();

            let Some(dep) = deps.get(next) else {
                frames.pop();
                path.pop();
                on_path.remove(node);
                continue;
            };
            frame.1 += 1;

            if let Some(&pos) = on_path.get(dep.as_str()) {
                let mut cycle: Vec<String> = path[pos..].iter().map(|n| n.to_string()).collect();
                cycle.push(dep.clone());
                return Some(cycle);
            }
            if visited.insert(dep.as_str()) {
                on_path.insert(dep.as_str(), path.len());
                path.push(dep.as_str());
                frames.push((dep.as_str(), 0));
            }
        }
    }
    None
}
