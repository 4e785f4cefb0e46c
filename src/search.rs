//! Pruned tree search over any hierarchical store.
//!
//! Two predicates cover every scanned source: pick the immediate children
//! whose name looks right, or walk the whole tree for nodes carrying a
//! qualifying scalar field. The value search separates "is this the row I
//! want" from "should I stop recursing here": a matching node's children
//! are typically its own sub-values, not more games, so matched subtrees
//! are pruned.

use std::collections::VecDeque;

use tracing::debug;

use crate::node::{NodeSnapshot, SourceNode};

/// Every immediate child of `root` whose name contains `substring`
/// (case-insensitive), skipping children whose name is in `exclude_names`.
pub fn find_by_name_substring<N: SourceNode>(
    root: &N,
    substring: &str,
    exclude_names: &[&str],
) -> Vec<NodeSnapshot> {
    let needle = substring.to_lowercase();
    let names = match root.child_names() {
        Ok(names) => names,
        Err(e) => {
            debug!(node = %root.name(), error = %e, "skipping unreadable node");
            return Vec::new();
        }
    };

    let mut matches = Vec::new();
    for name in names {
        if excluded(&name, exclude_names) {
            continue;
        }
        if !name.to_lowercase().contains(&needle) {
            continue;
        }
        match root.open_child(&name) {
            Ok(child) => matches.push(NodeSnapshot::capture(&child)),
            Err(e) => debug!(node = %name, error = %e, "skipping unreadable child"),
        }
    }
    matches
}

/// Breadth-first search for nodes whose scalar field `target_field`
/// contains `required_substring`.
///
/// A matched node is emitted and its subtree is not explored further.
/// Children named in `exclude_subtrees` are never enqueued. Per-node access
/// failures skip the node and never abort the search; each node is visited
/// at most once.
pub fn find_by_value_match<N: SourceNode>(
    root: N,
    target_field: &str,
    required_substring: &str,
    exclude_subtrees: &[&str],
) -> Vec<NodeSnapshot> {
    let mut queue: VecDeque<N> = VecDeque::new();
    let mut matches = Vec::new();
    queue.push_back(root);

    while let Some(node) = queue.pop_front() {
        if let Ok(value) = node.scalar(target_field) {
            if value.contains(required_substring) {
                matches.push(NodeSnapshot::capture(&node));
                continue;
            }
        }

        let names = match node.child_names() {
            Ok(names) => names,
            Err(e) => {
                debug!(node = %node.name(), error = %e, "skipping unreadable node");
                continue;
            }
        };
        for name in names {
            if excluded(&name, exclude_subtrees) {
                continue;
            }
            match node.open_child(&name) {
                Ok(child) => queue.push_back(child),
                Err(e) => debug!(node = %name, error = %e, "skipping unreadable child"),
            }
        }
    }

    matches
}

fn excluded(name: &str, excludes: &[&str]) -> bool {
    excludes.iter().any(|ex| name.eq_ignore_ascii_case(ex))
}
