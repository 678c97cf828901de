/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Adapter layer between the SolutionGraph and petgraph.
//!
//! Projects live steps and live edges into a StableGraph so the DAG guard
//! can use petgraph's reachability and cycle checks.

use super::SolutionGraph;
use petgraph::algo::{has_path_connecting, is_cyclic_directed};
use petgraph::stable_graph::{NodeIndex, StableGraph};
use std::collections::HashMap;

/// Live projection of a SolutionGraph (node weight = step id, edge weight = edge id)
pub struct PetgraphAdapter {
    pub graph: StableGraph<String, String>,
    id_to_index: HashMap<String, NodeIndex>,
}

impl PetgraphAdapter {
    /// Convert the live part of a SolutionGraph to a petgraph StableGraph
    pub fn from_graph(graph: &SolutionGraph) -> Self {
        let mut petgraph = StableGraph::new();
        let mut id_to_index = HashMap::new();

        for node in graph.active_nodes() {
            let idx = petgraph.add_node(node.id.clone());
            id_to_index.insert(node.id.clone(), idx);
        }

        for edge in graph.active_edges() {
            if let (Some(&from), Some(&to)) =
                (id_to_index.get(&edge.source), id_to_index.get(&edge.target))
            {
                petgraph.add_edge(from, to, edge.id.clone());
            }
        }

        Self {
            graph: petgraph,
            id_to_index,
        }
    }

    /// Get the petgraph index of a live step
    pub fn get_index(&self, step_id: &str) -> Option<NodeIndex> {
        self.id_to_index.get(step_id).copied()
    }

    /// Get the step id stored at a petgraph index
    pub fn get_id(&self, idx: NodeIndex) -> Option<&str> {
        self.graph.node_weight(idx).map(String::as_str)
    }

    /// Whether adding `source -> target` would close a directed cycle.
    ///
    /// Steps missing from the projection cannot be part of a cycle.
    pub fn would_create_cycle(&self, source: &str, target: &str) -> bool {
        if source == target {
            return true;
        }
        match (self.get_index(source), self.get_index(target)) {
            (Some(from), Some(to)) => has_path_connecting(&self.graph, to, from, None),
            _ => false,
        }
    }

    /// Whether the live graph is a DAG
    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.graph)
    }
}
