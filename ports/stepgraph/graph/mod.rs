/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Solution-step graph.
//!
//! Core structures:
//! - `StepNode`: one solution step (soft-deletable, positioned for rendering)
//! - `StepEdge`: a derivation link between two steps
//! - `SolutionGraph`: ordered node/edge lists with id lookup
//!
//! List order is significant: path-group detection and topological ordering
//! break ties by it, so the graph never reorders its lists.

use chrono::{DateTime, Utc};
use euclid::default::Point2D;
use log::debug;
use std::collections::HashMap;
use uuid::Uuid;

use crate::persistence::types::{GraphSnapshot, PersistedEdge, PersistedStep};

pub mod flow_adapter;
pub mod path_groups;
pub mod petgraph_adapter;

use petgraph_adapter::PetgraphAdapter;

/// Content of a solution step
#[derive(Debug, Clone, PartialEq)]
pub struct StepContent {
    /// Short human-readable description ("Subtract 3 from both sides")
    pub label: String,

    /// LaTeX source of the step's expression
    pub latex: String,

    /// Optional longer justification shown in the editor
    pub explanation: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl StepContent {
    pub fn new(label: impl Into<String>, latex: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            latex: latex.into(),
            explanation: None,
            created_at: Utc::now(),
        }
    }
}

/// A solution step in the graph
#[derive(Debug, Clone, PartialEq)]
pub struct StepNode {
    pub id: String,

    /// Soft-delete marker; deleted steps are skipped by every traversal
    pub is_deleted: bool,

    /// Position in graph space (rendering only)
    pub position: Point2D<f32>,

    pub content: StepContent,
}

impl StepNode {
    pub fn new(id: impl Into<String>, content: StepContent, position: Point2D<f32>) -> Self {
        Self {
            id: id.into(),
            is_deleted: false,
            position,
            content,
        }
    }
}

/// Per-edge flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeData {
    /// Soft-delete marker; deleted edges are skipped by every traversal
    pub is_deleted: bool,

    /// Display hint: edge lies on an alternative (non-main) path
    pub is_on_new_path: bool,

    /// Display hint: edge joins two steps of the main path
    pub is_main_path_edge: bool,

    /// Deleted as a side effect of deleting an endpoint step, so restoring
    /// that step may bring it back. Explicit edge deletes clear it.
    pub deleted_with_step: bool,
}

/// A directed derivation link `source -> target`
#[derive(Debug, Clone, PartialEq)]
pub struct StepEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub data: EdgeData,
}

impl StepEdge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            data: EdgeData::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.data.is_deleted
    }
}

/// Reasons a new derivation edge is refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    UnknownStep(String),
    DeletedStep(String),
    SelfLoop(String),
    DuplicateEdge { source: String, target: String },
    WouldCreateCycle { source: String, target: String },
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectError::UnknownStep(id) => write!(f, "Unknown step: {id}"),
            ConnectError::DeletedStep(id) => write!(f, "Step {id} is deleted"),
            ConnectError::SelfLoop(id) => write!(f, "Step {id} cannot derive from itself"),
            ConnectError::DuplicateEdge { source, target } => {
                write!(f, "Steps {source} and {target} are already connected")
            },
            ConnectError::WouldCreateCycle { source, target } => {
                write!(f, "Connecting {source} to {target} would create a cycle")
            },
        }
    }
}

impl std::error::Error for ConnectError {}

/// Solution-step graph: ordered node and edge lists plus id indices
#[derive(Debug, Clone, Default)]
pub struct SolutionGraph {
    nodes: Vec<StepNode>,
    edges: Vec<StepEdge>,
    node_index: HashMap<String, usize>,
    edge_index: HashMap<String, usize>,

    /// Start step of the main path, kept so the choice survives reloads
    main_anchor: Option<String>,
}

impl SolutionGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from whole node/edge lists (snapshot replacement).
    ///
    /// Later duplicates of an id are dropped; edges are kept even when an
    /// endpoint is unknown, matching what the renderer hands back.
    pub fn from_parts(nodes: Vec<StepNode>, edges: Vec<StepEdge>) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            if !graph.node_index.contains_key(&node.id) {
                graph.node_index.insert(node.id.clone(), graph.nodes.len());
                graph.nodes.push(node);
            }
        }
        for edge in edges {
            if !graph.edge_index.contains_key(&edge.id) {
                graph.edge_index.insert(edge.id.clone(), graph.edges.len());
                graph.edges.push(edge);
            }
        }
        graph
    }

    /// Add a step with a freshly minted id
    pub fn add_step(&mut self, content: StepContent, position: Point2D<f32>) -> String {
        let id = format!("step-{}", Uuid::new_v4());
        self.insert_node(StepNode::new(id.clone(), content, position));
        id
    }

    /// Add a step with a caller-chosen id. Returns false if the id is taken.
    pub fn add_step_with_id(
        &mut self,
        id: impl Into<String>,
        content: StepContent,
        position: Point2D<f32>,
    ) -> bool {
        let id = id.into();
        if self.node_index.contains_key(&id) {
            return false;
        }
        self.insert_node(StepNode::new(id, content, position));
        true
    }

    fn insert_node(&mut self, node: StepNode) {
        self.node_index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    /// Add an edge without validation. Returns false if the id is taken or
    /// either endpoint is unknown.
    pub fn add_edge_with_id(
        &mut self,
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> bool {
        let edge = StepEdge::new(id, source, target);
        if self.edge_index.contains_key(&edge.id)
            || !self.node_index.contains_key(&edge.source)
            || !self.node_index.contains_key(&edge.target)
        {
            return false;
        }
        self.edge_index.insert(edge.id.clone(), self.edges.len());
        self.edges.push(edge);
        true
    }

    /// Add a validated derivation edge `source -> target` and return its id.
    ///
    /// Both steps must exist and be live, the edge must not already exist,
    /// and it must not close a cycle.
    pub fn connect(&mut self, source: &str, target: &str) -> Result<String, ConnectError> {
        for id in [source, target] {
            match self.get_step(id) {
                None => return Err(ConnectError::UnknownStep(id.to_string())),
                Some(node) if node.is_deleted => {
                    return Err(ConnectError::DeletedStep(id.to_string()));
                },
                Some(_) => {},
            }
        }
        if source == target {
            return Err(ConnectError::SelfLoop(source.to_string()));
        }
        if self.has_active_edge(source, target) {
            return Err(ConnectError::DuplicateEdge {
                source: source.to_string(),
                target: target.to_string(),
            });
        }
        if PetgraphAdapter::from_graph(self).would_create_cycle(source, target) {
            return Err(ConnectError::WouldCreateCycle {
                source: source.to_string(),
                target: target.to_string(),
            });
        }

        let id = format!("edge-{}", Uuid::new_v4());
        self.add_edge_with_id(id.clone(), source, target);
        Ok(id)
    }

    /// Soft-delete a step and every live edge touching it
    pub fn soft_delete_step(&mut self, id: &str) -> bool {
        let Some(&idx) = self.node_index.get(id) else {
            return false;
        };
        self.nodes[idx].is_deleted = true;
        for edge in &mut self.edges {
            if (edge.source == id || edge.target == id) && !edge.data.is_deleted {
                edge.data.is_deleted = true;
                edge.data.deleted_with_step = true;
            }
        }
        true
    }

    /// Undo a soft delete.
    ///
    /// Only edges removed by a step delete come back, and only once both
    /// endpoints are live. An edge that would now duplicate a live edge or
    /// close a cycle stays deleted.
    pub fn restore_step(&mut self, id: &str) -> bool {
        let Some(&idx) = self.node_index.get(id) else {
            return false;
        };
        self.nodes[idx].is_deleted = false;

        let candidates: Vec<usize> = self
            .edges
            .iter()
            .enumerate()
            .filter(|(_, edge)| {
                edge.data.is_deleted
                    && edge.data.deleted_with_step
                    && (edge.source == id || edge.target == id)
                    && self.is_live(&edge.source)
                    && self.is_live(&edge.target)
            })
            .map(|(i, _)| i)
            .collect();

        for i in candidates {
            let (source, target) = (self.edges[i].source.clone(), self.edges[i].target.clone());
            if self.has_active_edge(&source, &target)
                || PetgraphAdapter::from_graph(self).would_create_cycle(&source, &target)
            {
                debug!(
                    "Keeping edge {} ({source} -> {target}) deleted on restore",
                    self.edges[i].id
                );
                continue;
            }
            self.edges[i].data.is_deleted = false;
            self.edges[i].data.deleted_with_step = false;
        }
        true
    }

    /// Replace a step's text. The original creation time is kept.
    pub fn update_step(&mut self, id: &str, content: StepContent) -> bool {
        let Some(node) = self.get_step_mut(id) else {
            return false;
        };
        let created_at = node.content.created_at;
        node.content = StepContent {
            created_at,
            ..content
        };
        true
    }

    /// Soft-delete a single edge
    pub fn soft_delete_edge(&mut self, id: &str) -> bool {
        match self.edge_index.get(id) {
            Some(&idx) => {
                self.edges[idx].data.is_deleted = true;
                self.edges[idx].data.deleted_with_step = false;
                true
            },
            None => false,
        }
    }

    /// Drop soft-deleted steps and edges (and edges left dangling),
    /// preserving the order of what remains.
    pub fn purge_deleted(&mut self) {
        let nodes: Vec<StepNode> = self.nodes.drain(..).filter(|n| !n.is_deleted).collect();
        let kept: std::collections::HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let edges: Vec<StepEdge> = self
            .edges
            .iter()
            .filter(|e| {
                e.is_active() && kept.contains(e.source.as_str()) && kept.contains(e.target.as_str())
            })
            .cloned()
            .collect();
        let main_anchor = self
            .main_anchor
            .take()
            .filter(|id| kept.contains(id.as_str()));
        *self = Self::from_parts(nodes, edges);
        self.main_anchor = main_anchor;
    }

    /// Step the main path was chosen through, if any
    pub fn main_anchor(&self) -> Option<&str> {
        self.main_anchor.as_deref()
    }

    pub fn set_main_anchor(&mut self, step_id: Option<String>) {
        self.main_anchor = step_id;
    }

    /// Get a step by id
    pub fn get_step(&self, id: &str) -> Option<&StepNode> {
        self.node_index.get(id).map(|&idx| &self.nodes[idx])
    }

    /// Get a mutable step by id
    pub fn get_step_mut(&mut self, id: &str) -> Option<&mut StepNode> {
        let idx = *self.node_index.get(id)?;
        Some(&mut self.nodes[idx])
    }

    /// Get an edge by id
    pub fn get_edge(&self, id: &str) -> Option<&StepEdge> {
        self.edge_index.get(id).map(|&idx| &self.edges[idx])
    }

    /// All steps (including soft-deleted) in insertion order
    pub fn nodes(&self) -> &[StepNode] {
        &self.nodes
    }

    /// All edges (including soft-deleted) in insertion order
    pub fn edges(&self) -> &[StepEdge] {
        &self.edges
    }

    /// Live steps in insertion order
    pub fn active_nodes(&self) -> impl Iterator<Item = &StepNode> {
        self.nodes.iter().filter(|n| !n.is_deleted)
    }

    /// Live edges whose endpoints are both live steps
    pub fn active_edges(&self) -> impl Iterator<Item = &StepEdge> + '_ {
        self.edges
            .iter()
            .filter(|e| e.is_active() && self.is_live(&e.source) && self.is_live(&e.target))
    }

    fn is_live(&self, id: &str) -> bool {
        self.get_step(id).is_some_and(|n| !n.is_deleted)
    }

    /// Check if a live edge `source -> target` exists
    pub fn has_active_edge(&self, source: &str, target: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.is_active() && e.source == source && e.target == target)
    }

    /// Count of steps, including soft-deleted ones
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Count of edges, including soft-deleted ones
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Recompute the display flags on every edge from the ordered main path
    pub fn annotate_main_path(&mut self, main_steps: &[String]) {
        path_groups::annotate_main_path_edges(&mut self.edges, main_steps);
    }

    /// Replace node positions (ids and order unchanged)
    pub fn set_positions(&mut self, nodes: Vec<StepNode>) {
        for node in nodes {
            if let Some(existing) = self.get_step_mut(&node.id) {
                existing.position = node.position;
            }
        }
    }

    /// Serialize the graph to a persistable snapshot
    pub fn to_snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .nodes
            .iter()
            .map(|node| PersistedStep {
                id: node.id.clone(),
                label: node.content.label.clone(),
                latex: node.content.latex.clone(),
                explanation: node.content.explanation.clone(),
                created_at: node.content.created_at,
                position_x: node.position.x,
                position_y: node.position.y,
                is_deleted: node.is_deleted,
            })
            .collect();

        let edges = self
            .edges
            .iter()
            .map(|edge| PersistedEdge {
                id: edge.id.clone(),
                source: edge.source.clone(),
                target: edge.target.clone(),
                is_deleted: edge.data.is_deleted,
                deleted_with_step: edge.data.deleted_with_step,
                is_on_new_path: edge.data.is_on_new_path,
                is_main_path_edge: edge.data.is_main_path_edge,
            })
            .collect();

        GraphSnapshot {
            nodes,
            edges,
            main_step_id: self.main_anchor.clone(),
            saved_at: Utc::now(),
        }
    }

    /// Rebuild a graph from a persisted snapshot
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Self {
        let nodes = snapshot
            .nodes
            .iter()
            .map(|pstep| StepNode {
                id: pstep.id.clone(),
                is_deleted: pstep.is_deleted,
                position: Point2D::new(pstep.position_x, pstep.position_y),
                content: StepContent {
                    label: pstep.label.clone(),
                    latex: pstep.latex.clone(),
                    explanation: pstep.explanation.clone(),
                    created_at: pstep.created_at,
                },
            })
            .collect();

        let edges = snapshot
            .edges
            .iter()
            .map(|pedge| StepEdge {
                id: pedge.id.clone(),
                source: pedge.source.clone(),
                target: pedge.target.clone(),
                data: EdgeData {
                    is_deleted: pedge.is_deleted,
                    deleted_with_step: pedge.deleted_with_step,
                    is_on_new_path: pedge.is_on_new_path,
                    is_main_path_edge: pedge.is_main_path_edge,
                },
            })
            .collect();

        let mut graph = Self::from_parts(nodes, edges);
        graph.main_anchor = snapshot.main_step_id.clone();
        graph
    }
}
