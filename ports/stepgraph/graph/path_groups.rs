/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Path groups: connected components of the live step graph.
//!
//! - `detect_path_groups`: undirected components, DFS preorder
//! - `main_path_steps`: directed reachability from the start step, then Kahn
//! - `generate_path_group_layout` / `apply_path_group_layout_to_nodes`: columns
//! - `can_connect_path_groups` / `merge_path_groups`: chain-append merge
//!
//! Groups are derived views. They are recomputed from the current node/edge
//! snapshot after every mutation and never stored on their own.

use euclid::default::Point2D;
use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};

use super::{StepEdge, StepNode};
use crate::config::LayoutConfig;

/// One connected component of the live step graph
#[derive(Debug, Clone, PartialEq)]
pub struct PathGroup {
    pub id: String,

    /// Member steps in DFS visitation order (not necessarily topological)
    pub node_ids: Vec<String>,

    /// Edges used to reach each member, plus edges added by merges
    pub edge_ids: Vec<String>,

    /// At most one group is the main path; chosen by the caller
    pub is_main_path: bool,

    pub start_node_id: String,
    pub end_node_id: String,

    /// Column origin assigned by the layout pass
    pub layout_position: Option<Point2D<f32>>,
}

impl PathGroup {
    pub fn contains(&self, step_id: &str) -> bool {
        self.node_ids.iter().any(|id| id == step_id)
    }
}

/// Partition live steps into connected components.
///
/// Edge direction is ignored for connectivity. Components are numbered
/// `group-1`, `group-2`, ... in order of their first step in `nodes`.
/// Edges with a deleted or unknown endpoint are not followed.
pub fn detect_path_groups(nodes: &[StepNode], edges: &[StepEdge]) -> Vec<PathGroup> {
    let live: HashSet<&str> = nodes
        .iter()
        .filter(|n| !n.is_deleted)
        .map(|n| n.id.as_str())
        .collect();

    // (neighbour, edge id), in edge-list order
    let mut adjacency: HashMap<&str, Vec<(&str, &str)>> = HashMap::new();
    for edge in edges.iter().filter(|e| e.is_active()) {
        let (source, target) = (edge.source.as_str(), edge.target.as_str());
        if !live.contains(source) || !live.contains(target) {
            debug!(
                "Not following edge {} ({source} -> {target}): endpoint deleted or unknown",
                edge.id
            );
            continue;
        }
        adjacency
            .entry(source)
            .or_default()
            .push((target, edge.id.as_str()));
        adjacency
            .entry(target)
            .or_default()
            .push((source, edge.id.as_str()));
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut groups = Vec::new();

    for root in nodes.iter().filter(|n| !n.is_deleted).map(|n| n.id.as_str()) {
        if !visited.insert(root) {
            continue;
        }

        let mut node_ids = vec![root.to_string()];
        let mut edge_ids = Vec::new();

        // Explicit stack of (step, next neighbour cursor) keeps recursive
        // preorder without recursion depth limits.
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        while let Some(frame) = stack.last_mut() {
            let neighbours = adjacency.get(frame.0).map(Vec::as_slice).unwrap_or(&[]);
            match neighbours.get(frame.1) {
                Some(&(next, edge_id)) => {
                    frame.1 += 1;
                    if visited.insert(next) {
                        node_ids.push(next.to_string());
                        edge_ids.push(edge_id.to_string());
                        stack.push((next, 0));
                    }
                },
                None => {
                    stack.pop();
                },
            }
        }

        let start_node_id = find_start_node(&node_ids, edges).unwrap_or_default();
        let end_node_id = find_end_node(&node_ids, edges).unwrap_or_default();
        groups.push(PathGroup {
            id: format!("group-{}", groups.len() + 1),
            node_ids,
            edge_ids,
            is_main_path: false,
            start_node_id,
            end_node_id,
            layout_position: None,
        });
    }

    groups
}

/// First member (in `node_ids` order) with no live incoming edge from
/// another member, falling back to the first member.
pub fn find_start_node(node_ids: &[String], edges: &[StepEdge]) -> Option<String> {
    let members: HashSet<&str> = node_ids.iter().map(String::as_str).collect();
    node_ids
        .iter()
        .find(|id| {
            !edges.iter().any(|e| {
                e.is_active() && e.target == **id && members.contains(e.source.as_str())
            })
        })
        .or_else(|| node_ids.first())
        .cloned()
}

/// First member (in `node_ids` order) with no live outgoing edge to
/// another member, falling back to the last member.
pub fn find_end_node(node_ids: &[String], edges: &[StepEdge]) -> Option<String> {
    let members: HashSet<&str> = node_ids.iter().map(String::as_str).collect();
    node_ids
        .iter()
        .find(|id| {
            !edges.iter().any(|e| {
                e.is_active() && e.source == **id && members.contains(e.target.as_str())
            })
        })
        .or_else(|| node_ids.last())
        .cloned()
}

/// Find the group containing a step
pub fn find_group_for_node<'a>(groups: &'a [PathGroup], step_id: &str) -> Option<&'a PathGroup> {
    groups.iter().find(|g| g.contains(step_id))
}

/// Display order of the main path's steps.
///
/// Only steps reachable from the group's start along live, in-group edges
/// are returned. They are topologically sorted with Kahn's algorithm; ties
/// go to whichever step comes first in `nodes`. Steps on a cycle are left
/// out. Empty when `main_group_id` is `None` or unknown.
pub fn main_path_steps(
    main_group_id: Option<&str>,
    groups: &[PathGroup],
    nodes: &[StepNode],
    edges: &[StepEdge],
) -> Vec<String> {
    let Some(group) = main_group_id.and_then(|id| groups.iter().find(|g| g.id == id)) else {
        return Vec::new();
    };
    let members: HashSet<&str> = group.node_ids.iter().map(String::as_str).collect();
    if !members.contains(group.start_node_id.as_str()) {
        return Vec::new();
    }

    let mut reachable: HashSet<&str> = HashSet::new();
    let mut pending = vec![group.start_node_id.as_str()];
    while let Some(current) = pending.pop() {
        if !reachable.insert(current) {
            continue;
        }
        for edge in edges.iter().filter(|e| {
            e.is_active() && e.source == current && members.contains(e.target.as_str())
        }) {
            if !reachable.contains(edge.target.as_str()) {
                pending.push(edge.target.as_str());
            }
        }
    }

    let internal: Vec<&StepEdge> = edges
        .iter()
        .filter(|e| {
            e.is_active()
                && reachable.contains(e.source.as_str())
                && reachable.contains(e.target.as_str())
        })
        .collect();

    let mut in_degree: HashMap<&str, usize> = reachable.iter().map(|&id| (id, 0)).collect();
    for edge in &internal {
        if let Some(degree) = in_degree.get_mut(edge.target.as_str()) {
            *degree += 1;
        }
    }

    let mut queued: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| in_degree.get(id) == Some(&0) && queued.insert(*id))
        .collect();

    let mut order = Vec::with_capacity(reachable.len());
    while let Some(current) = queue.pop_front() {
        order.push(current.to_string());
        for edge in internal.iter().filter(|e| e.source == current) {
            if let Some(degree) = in_degree.get_mut(edge.target.as_str()) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(edge.target.as_str());
                }
            }
        }
    }

    order
}

/// Flag exactly one group as the main path (or none for `None`).
///
/// Returns false if `group_id` names no group; flags are cleared either way.
pub fn set_main_path(groups: &mut [PathGroup], group_id: Option<&str>) -> bool {
    let mut found = false;
    for group in groups.iter_mut() {
        group.is_main_path = group_id == Some(group.id.as_str());
        found |= group.is_main_path;
    }
    found
}

/// Recompute the display flags on every edge.
///
/// An edge is a main-path edge when it is live and both endpoints are main
/// steps; every other live edge is on a new (alternative) path.
pub fn annotate_main_path_edges(edges: &mut [StepEdge], main_steps: &[String]) {
    let on_main: HashSet<&str> = main_steps.iter().map(String::as_str).collect();
    for edge in edges.iter_mut() {
        let live = edge.is_active();
        let main = live
            && on_main.contains(edge.source.as_str())
            && on_main.contains(edge.target.as_str());
        edge.data.is_main_path_edge = main;
        edge.data.is_on_new_path = live && !main;
    }
}

/// Assign each group a column using the default spacing
pub fn generate_path_group_layout(groups: &[PathGroup]) -> Vec<PathGroup> {
    generate_path_group_layout_with(groups, &LayoutConfig::default())
}

/// Assign each group a column origin.
///
/// The main group takes the first column; the rest fill the following
/// columns in list order. List order itself is unchanged.
pub fn generate_path_group_layout_with(
    groups: &[PathGroup],
    config: &LayoutConfig,
) -> Vec<PathGroup> {
    let mut next_column = usize::from(groups.iter().any(|g| g.is_main_path));
    groups
        .iter()
        .map(|group| {
            let column = if group.is_main_path {
                0
            } else {
                next_column += 1;
                next_column - 1
            };
            PathGroup {
                layout_position: Some(Point2D::new(
                    config.origin_x + column as f32 * config.group_spacing,
                    config.origin_y,
                )),
                ..group.clone()
            }
        })
        .collect()
}

/// Stack each laid-out group's steps under its origin using the default spacing
pub fn apply_path_group_layout_to_nodes(
    nodes: &[StepNode],
    groups: &[PathGroup],
) -> Vec<StepNode> {
    apply_path_group_layout_to_nodes_with(nodes, groups, &LayoutConfig::default())
}

/// Stack each laid-out group's steps under its origin in `node_ids` order.
///
/// Overwrites positions of every step in a group with a `layout_position`;
/// other steps keep theirs.
pub fn apply_path_group_layout_to_nodes_with(
    nodes: &[StepNode],
    groups: &[PathGroup],
    config: &LayoutConfig,
) -> Vec<StepNode> {
    let mut placements: HashMap<&str, Point2D<f32>> = HashMap::new();
    for group in groups {
        let Some(origin) = group.layout_position else {
            continue;
        };
        for (row, id) in group.node_ids.iter().enumerate() {
            placements.insert(
                id.as_str(),
                Point2D::new(origin.x, origin.y + row as f32 * config.node_spacing),
            );
        }
    }

    nodes
        .iter()
        .map(|node| StepNode {
            position: placements
                .get(node.id.as_str())
                .copied()
                .unwrap_or(node.position),
            ..node.clone()
        })
        .collect()
}

/// Whether a new edge `source_node_id -> target_node_id` may join two groups.
///
/// Only chain appends are legal: the source must be its group's end step and
/// the target its group's start step, in two different groups.
pub fn can_connect_path_groups(
    groups: &[PathGroup],
    source_node_id: &str,
    target_node_id: &str,
) -> bool {
    let (Some(source), Some(target)) = (
        find_group_for_node(groups, source_node_id),
        find_group_for_node(groups, target_node_id),
    ) else {
        return false;
    };

    source.id != target.id
        && source.end_node_id == source_node_id
        && target.start_node_id == target_node_id
}

/// Replace two groups with their chain-append merge.
///
/// Does not re-check `can_connect_path_groups`. The merged group keeps the
/// id and layout position of the main input (or the source group when
/// neither is main) and is appended after the untouched groups. Unknown or
/// identical ids return the list unchanged.
pub fn merge_path_groups(
    groups: &[PathGroup],
    source_group_id: &str,
    target_group_id: &str,
    new_edge_id: &str,
) -> Vec<PathGroup> {
    let (Some(source), Some(target)) = (
        groups.iter().find(|g| g.id == source_group_id),
        groups.iter().find(|g| g.id == target_group_id),
    ) else {
        return groups.to_vec();
    };
    if source.id == target.id {
        return groups.to_vec();
    }

    let heir = if !source.is_main_path && target.is_main_path {
        target
    } else {
        source
    };

    let merged = PathGroup {
        id: heir.id.clone(),
        node_ids: source
            .node_ids
            .iter()
            .chain(&target.node_ids)
            .cloned()
            .collect(),
        edge_ids: source
            .edge_ids
            .iter()
            .chain(&target.edge_ids)
            .cloned()
            .chain(std::iter::once(new_edge_id.to_string()))
            .collect(),
        is_main_path: source.is_main_path || target.is_main_path,
        start_node_id: source.start_node_id.clone(),
        end_node_id: target.end_node_id.clone(),
        layout_position: heir.layout_position,
    };

    groups
        .iter()
        .filter(|g| g.id != source.id && g.id != target.id)
        .cloned()
        .chain(std::iter::once(merged))
        .collect()
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::graph::StepContent;
    use proptest::prelude::*;

    // Up to 12 steps and 24 edges over them; self-loops, parallel edges and
    // cycles are all allowed. Roughly one in five steps/edges is deleted.
    fn graph_strategy() -> impl Strategy<Value = (Vec<StepNode>, Vec<StepEdge>)> {
        prop::collection::vec(prop::bool::weighted(0.2), 1..12)
            .prop_flat_map(|deleted| {
                let n = deleted.len();
                let edge_specs =
                    prop::collection::vec((0..n, 0..n, prop::bool::weighted(0.2)), 0..24);
                (Just(deleted), edge_specs)
            })
            .prop_map(|(deleted, edge_specs)| {
                let nodes = deleted
                    .iter()
                    .enumerate()
                    .map(|(i, &is_deleted)| {
                        let mut node = StepNode::new(
                            format!("s{i}"),
                            StepContent::new("", ""),
                            Point2D::origin(),
                        );
                        node.is_deleted = is_deleted;
                        node
                    })
                    .collect();
                let edges = edge_specs
                    .into_iter()
                    .enumerate()
                    .map(|(i, (source, target, is_deleted))| {
                        let mut edge =
                            StepEdge::new(format!("e{i}"), format!("s{source}"), format!("s{target}"));
                        edge.data.is_deleted = is_deleted;
                        edge
                    })
                    .collect();
                (nodes, edges)
            })
    }

    proptest! {
        #[test]
        fn test_groups_partition_live_steps((nodes, edges) in graph_strategy()) {
            let groups = detect_path_groups(&nodes, &edges);
            let live: HashSet<&str> = nodes
                .iter()
                .filter(|n| !n.is_deleted)
                .map(|n| n.id.as_str())
                .collect();

            let mut seen: HashSet<&str> = HashSet::new();
            for group in &groups {
                prop_assert!(!group.node_ids.is_empty());
                for id in &group.node_ids {
                    prop_assert!(seen.insert(id.as_str()), "{} in two groups", id);
                }
            }
            prop_assert_eq!(seen, live);
        }

        #[test]
        fn test_groups_never_use_deleted_edges((nodes, edges) in graph_strategy()) {
            let deleted_steps: HashSet<&str> = nodes
                .iter()
                .filter(|n| n.is_deleted)
                .map(|n| n.id.as_str())
                .collect();
            let unusable: HashSet<&str> = edges
                .iter()
                .filter(|e| {
                    !e.is_active()
                        || deleted_steps.contains(e.source.as_str())
                        || deleted_steps.contains(e.target.as_str())
                })
                .map(|e| e.id.as_str())
                .collect();

            for group in detect_path_groups(&nodes, &edges) {
                for edge_id in &group.edge_ids {
                    prop_assert!(!unusable.contains(edge_id.as_str()), "{} is deleted", edge_id);
                }
            }
        }

        #[test]
        fn test_detection_idempotent((nodes, edges) in graph_strategy()) {
            prop_assert_eq!(
                detect_path_groups(&nodes, &edges),
                detect_path_groups(&nodes, &edges)
            );
        }

        #[test]
        fn test_main_path_respects_edge_direction((nodes, edges) in graph_strategy()) {
            let groups = detect_path_groups(&nodes, &edges);
            for group in &groups {
                let order = main_path_steps(Some(&group.id), &groups, &nodes, &edges);
                prop_assert!(order.iter().all(|id| group.contains(id)));

                let position: HashMap<&str, usize> = order
                    .iter()
                    .enumerate()
                    .map(|(i, id)| (id.as_str(), i))
                    .collect();
                prop_assert_eq!(position.len(), order.len());
                for edge in edges.iter().filter(|e| e.is_active()) {
                    if let (Some(source), Some(target)) = (
                        position.get(edge.source.as_str()),
                        position.get(edge.target.as_str()),
                    ) {
                        prop_assert!(
                            source < target,
                            "{} -> {} out of order in {:?}",
                            edge.source,
                            edge.target,
                            order
                        );
                    }
                }
            }
        }
    }
}
