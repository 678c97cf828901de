/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Application state for the step editor and its graph view.
//!
//! All edits go through [`SolverApp::apply`], which mutates the graph and
//! then brings the path groups and main-path annotations back in sync.

use euclid::default::Point2D;
use log::{debug, warn};

use crate::config::LayoutConfig;
use crate::graph::flow_adapter::FlowGraph;
use crate::graph::path_groups::{
    self, PathGroup, apply_path_group_layout_to_nodes_with, can_connect_path_groups,
    detect_path_groups, find_group_for_node, generate_path_group_layout_with, merge_path_groups,
    set_main_path,
};
use crate::graph::petgraph_adapter::PetgraphAdapter;
use crate::graph::{ConnectError, SolutionGraph, StepContent};

/// A user edit to the solution graph
#[derive(Debug, Clone, PartialEq)]
pub enum GraphIntent {
    /// Add a step. With `after`, also connect `after -> new step`.
    /// Without a position the step goes below `after` (or at the origin).
    AddStep {
        content: StepContent,
        position: Option<Point2D<f32>>,
        after: Option<String>,
    },
    EditStep {
        id: String,
        content: StepContent,
    },
    DeleteStep {
        id: String,
    },
    RestoreStep {
        id: String,
    },
    /// Draw a derivation edge. Across groups only end-to-start is allowed.
    Connect {
        source: String,
        target: String,
    },
    DeleteEdge {
        id: String,
    },
    SetMainPath {
        group_id: Option<String>,
    },
    /// Re-place every step in group columns
    ApplyLayout,
}

/// What an applied intent produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    StepAdded(String),
    EdgeAdded(String),
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentError {
    UnknownStep(String),
    UnknownEdge(String),
    UnknownGroup(String),
    Connect(ConnectError),
    /// Cross-group edge that is not an end-to-start chain append
    IllegalGroupConnection { source: String, target: String },
}

impl std::fmt::Display for IntentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntentError::UnknownStep(id) => write!(f, "Unknown step: {id}"),
            IntentError::UnknownEdge(id) => write!(f, "Unknown edge: {id}"),
            IntentError::UnknownGroup(id) => write!(f, "Unknown path group: {id}"),
            IntentError::Connect(e) => write!(f, "{e}"),
            IntentError::IllegalGroupConnection { source, target } => write!(
                f,
                "Cannot connect {source} -> {target}: paths may only be joined end to start"
            ),
        }
    }
}

impl std::error::Error for IntentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IntentError::Connect(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConnectError> for IntentError {
    fn from(e: ConnectError) -> Self {
        IntentError::Connect(e)
    }
}

/// Main application state
pub struct SolverApp {
    /// The solution graph
    graph: SolutionGraph,

    /// Path groups of the live graph, kept in sync after every intent
    groups: Vec<PathGroup>,

    /// Group currently shown as the main solution path
    main_group_id: Option<String>,

    layout: LayoutConfig,
}

impl Default for SolverApp {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverApp {
    pub fn new() -> Self {
        Self::with_layout(LayoutConfig::default())
    }

    pub fn with_layout(layout: LayoutConfig) -> Self {
        Self {
            graph: SolutionGraph::new(),
            groups: Vec::new(),
            main_group_id: None,
            layout,
        }
    }

    /// Wrap a loaded graph.
    ///
    /// The main group is the one holding the graph's saved main anchor.
    /// Graphs saved without one fall back to the first live edge flagged
    /// as a main-path edge.
    pub fn from_graph(graph: SolutionGraph, layout: LayoutConfig) -> Self {
        if !PetgraphAdapter::from_graph(&graph).is_acyclic() {
            warn!("Loaded solution graph contains a cycle; main path will skip it");
        }

        let main_anchor = graph.main_anchor().map(str::to_string).or_else(|| {
            graph
                .active_edges()
                .find(|e| e.data.is_main_path_edge)
                .map(|e| e.source.clone())
        });

        let mut app = Self {
            graph,
            groups: Vec::new(),
            main_group_id: None,
            layout,
        };
        app.groups = detect_path_groups(app.graph.nodes(), app.graph.edges());
        app.main_group_id = main_anchor
            .and_then(|anchor| find_group_for_node(&app.groups, &anchor))
            .map(|g| g.id.clone());
        set_main_path(&mut app.groups, app.main_group_id.as_deref());
        app.refresh_main_path();
        app
    }

    pub fn graph(&self) -> &SolutionGraph {
        &self.graph
    }

    pub fn groups(&self) -> &[PathGroup] {
        &self.groups
    }

    pub fn main_group_id(&self) -> Option<&str> {
        self.main_group_id.as_deref()
    }

    /// Ordered step ids of the main path
    pub fn main_path_steps(&self) -> Vec<String> {
        path_groups::main_path_steps(
            self.main_group_id.as_deref(),
            &self.groups,
            self.graph.nodes(),
            self.graph.edges(),
        )
    }

    /// Renderer view of the current state
    pub fn flow(&self) -> FlowGraph {
        FlowGraph::from_graph(&self.graph, &self.main_path_steps())
    }

    /// Apply one edit
    pub fn apply(&mut self, intent: GraphIntent) -> Result<IntentOutcome, IntentError> {
        match intent {
            GraphIntent::AddStep {
                content,
                position,
                after,
            } => self.add_step(content, position, after),
            GraphIntent::EditStep { id, content } => {
                if !self.graph.update_step(&id, content) {
                    return Err(IntentError::UnknownStep(id));
                }
                Ok(IntentOutcome::Updated)
            },
            GraphIntent::DeleteStep { id } => {
                if !self.graph.soft_delete_step(&id) {
                    return Err(IntentError::UnknownStep(id));
                }
                self.recompute();
                Ok(IntentOutcome::Updated)
            },
            GraphIntent::RestoreStep { id } => {
                if !self.graph.restore_step(&id) {
                    return Err(IntentError::UnknownStep(id));
                }
                self.recompute();
                Ok(IntentOutcome::Updated)
            },
            GraphIntent::Connect { source, target } => self.connect(source, target),
            GraphIntent::DeleteEdge { id } => {
                if !self.graph.soft_delete_edge(&id) {
                    return Err(IntentError::UnknownEdge(id));
                }
                self.recompute();
                Ok(IntentOutcome::Updated)
            },
            GraphIntent::SetMainPath { group_id } => {
                if !set_main_path(&mut self.groups, group_id.as_deref()) && group_id.is_some() {
                    // Restore the flags cleared by the failed lookup
                    set_main_path(&mut self.groups, self.main_group_id.as_deref());
                    return Err(IntentError::UnknownGroup(group_id.unwrap_or_default()));
                }
                self.main_group_id = group_id;
                self.refresh_main_path();
                Ok(IntentOutcome::Updated)
            },
            GraphIntent::ApplyLayout => {
                self.groups = generate_path_group_layout_with(&self.groups, &self.layout);
                let placed = apply_path_group_layout_to_nodes_with(
                    self.graph.nodes(),
                    &self.groups,
                    &self.layout,
                );
                self.graph.set_positions(placed);
                Ok(IntentOutcome::Updated)
            },
        }
    }

    fn add_step(
        &mut self,
        content: StepContent,
        position: Option<Point2D<f32>>,
        after: Option<String>,
    ) -> Result<IntentOutcome, IntentError> {
        let anchor = match after.as_deref() {
            Some(after_id) => {
                let node = self
                    .graph
                    .get_step(after_id)
                    .ok_or_else(|| IntentError::UnknownStep(after_id.to_string()))?;
                if node.is_deleted {
                    return Err(ConnectError::DeletedStep(after_id.to_string()).into());
                }
                Some(node.position)
            },
            None => None,
        };
        let position = position.unwrap_or_else(|| match anchor {
            Some(above) => Point2D::new(above.x, above.y + self.layout.node_spacing),
            None => Point2D::new(self.layout.origin_x, self.layout.origin_y),
        });

        let first_step = self.graph.active_nodes().next().is_none();
        let id = self.graph.add_step(content, position);
        if let Some(after_id) = after.as_deref() {
            // A fresh step has no edges, so this cannot close a cycle
            self.graph.connect(after_id, &id)?;
        }

        self.recompute();
        if first_step && self.main_group_id.is_none() {
            self.main_group_id = find_group_for_node(&self.groups, &id).map(|g| g.id.clone());
            set_main_path(&mut self.groups, self.main_group_id.as_deref());
            self.refresh_main_path();
        }
        Ok(IntentOutcome::StepAdded(id))
    }

    fn connect(&mut self, source: String, target: String) -> Result<IntentOutcome, IntentError> {
        let groups = (
            find_group_for_node(&self.groups, &source).map(|g| g.id.clone()),
            find_group_for_node(&self.groups, &target).map(|g| g.id.clone()),
        );

        match groups {
            (Some(source_group), Some(target_group)) if source_group != target_group => {
                if !can_connect_path_groups(&self.groups, &source, &target) {
                    return Err(IntentError::IllegalGroupConnection { source, target });
                }
                let edge_id = self.graph.connect(&source, &target)?;
                self.groups =
                    merge_path_groups(&self.groups, &source_group, &target_group, &edge_id);
                let touches_main = self
                    .main_group_id
                    .as_deref()
                    .is_some_and(|main| main == source_group || main == target_group);
                if touches_main {
                    self.main_group_id =
                        find_group_for_node(&self.groups, &source).map(|g| g.id.clone());
                }
                debug!("Merged {source_group} and {target_group} via {edge_id}");
                self.refresh_main_path();
                Ok(IntentOutcome::EdgeAdded(edge_id))
            },
            _ => {
                // Same group (a branch) or an endpoint the graph will reject
                let edge_id = self.graph.connect(&source, &target)?;
                self.recompute();
                Ok(IntentOutcome::EdgeAdded(edge_id))
            },
        }
    }

    /// Re-detect groups after a structural edit.
    ///
    /// The main flag moves to whichever new group holds the old main
    /// group's start step, or failing that its first surviving step.
    fn recompute(&mut self) {
        let previous_main = self
            .main_group_id
            .as_deref()
            .and_then(|id| self.groups.iter().find(|g| g.id == id))
            .map(|g| {
                std::iter::once(g.start_node_id.clone())
                    .chain(g.node_ids.iter().cloned())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        self.groups = detect_path_groups(self.graph.nodes(), self.graph.edges());
        self.main_group_id = previous_main
            .iter()
            .find_map(|step| find_group_for_node(&self.groups, step))
            .map(|g| g.id.clone());
        set_main_path(&mut self.groups, self.main_group_id.as_deref());
        self.refresh_main_path();
    }

    fn refresh_main_path(&mut self) {
        let anchor = self
            .main_group_id
            .as_deref()
            .and_then(|id| self.groups.iter().find(|g| g.id == id))
            .map(|g| g.start_node_id.clone());
        self.graph.set_main_anchor(anchor);

        let steps = self.main_path_steps();
        self.graph.annotate_main_path(&steps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(app: &mut SolverApp, label: &str, after: Option<&str>) -> String {
        match app
            .apply(GraphIntent::AddStep {
                content: StepContent::new(label, label),
                position: None,
                after: after.map(str::to_string),
            })
            .unwrap()
        {
            IntentOutcome::StepAdded(id) => id,
            other => panic!("Expected StepAdded, got {other:?}"),
        }
    }

    fn connect(app: &mut SolverApp, source: &str, target: &str) -> Result<IntentOutcome, IntentError> {
        app.apply(GraphIntent::Connect {
            source: source.to_string(),
            target: target.to_string(),
        })
    }

    fn group_of(app: &SolverApp, id: &str) -> String {
        find_group_for_node(app.groups(), id).unwrap().id.clone()
    }

    #[test]
    fn test_first_step_becomes_main_path() {
        let mut app = SolverApp::new();
        let a = add(&mut app, "a", None);

        assert_eq!(app.groups().len(), 1);
        assert_eq!(app.main_group_id(), Some(group_of(&app, &a).as_str()));
        assert_eq!(app.main_path_steps(), vec![a.clone()]);
        assert_eq!(app.graph().get_step(&a).unwrap().position, Point2D::new(50.0, 50.0));
    }

    #[test]
    fn test_add_after_extends_chain() {
        let mut app = SolverApp::new();
        let a = add(&mut app, "a", None);
        let b = add(&mut app, "b", Some(&a));
        let c = add(&mut app, "c", Some(&b));

        assert_eq!(app.groups().len(), 1);
        let group = &app.groups()[0];
        assert_eq!(group.start_node_id, a);
        assert_eq!(group.end_node_id, c);
        assert!(group.is_main_path);
        assert_eq!(app.main_path_steps(), vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(app.graph().get_step(&c).unwrap().position, Point2D::new(50.0, 290.0));
        assert!(app.graph().edges().iter().all(|e| e.data.is_main_path_edge));
    }

    #[test]
    fn test_add_after_unknown_step_leaves_graph_untouched() {
        let mut app = SolverApp::new();
        let result = app.apply(GraphIntent::AddStep {
            content: StepContent::new("x", "x"),
            position: None,
            after: Some("nope".to_string()),
        });

        assert_eq!(result, Err(IntentError::UnknownStep("nope".to_string())));
        assert_eq!(app.graph().node_count(), 0);
    }

    #[test]
    fn test_connect_merges_chains() {
        let mut app = SolverApp::new();
        let a = add(&mut app, "a", None);
        let b = add(&mut app, "b", Some(&a));
        let c = add(&mut app, "c", None);
        let d = add(&mut app, "d", Some(&c));
        let main = app.main_group_id().unwrap().to_string();
        assert_eq!(app.groups().len(), 2);

        let edge = match connect(&mut app, &b, &c).unwrap() {
            IntentOutcome::EdgeAdded(edge) => edge,
            other => panic!("Expected EdgeAdded, got {other:?}"),
        };

        assert_eq!(app.groups().len(), 1);
        let merged = &app.groups()[0];
        assert_eq!(merged.id, main);
        assert_eq!(merged.node_ids, vec![a.clone(), b.clone(), c.clone(), d.clone()]);
        assert_eq!(merged.edge_ids.last(), Some(&edge));
        assert_eq!(merged.start_node_id, a);
        assert_eq!(merged.end_node_id, d);
        assert_eq!(app.main_path_steps(), vec![a, b, c, d]);
    }

    #[test]
    fn test_connect_rejects_non_end_source() {
        let mut app = SolverApp::new();
        let a = add(&mut app, "a", None);
        let b = add(&mut app, "b", Some(&a));
        let c = add(&mut app, "c", None);
        let edges_before = app.graph().edge_count();

        let result = connect(&mut app, &a, &c);
        assert_eq!(
            result,
            Err(IntentError::IllegalGroupConnection {
                source: a.clone(),
                target: c.clone()
            })
        );
        assert_eq!(app.graph().edge_count(), edges_before);
        assert_ne!(group_of(&app, &b), group_of(&app, &c));
    }

    #[test]
    fn test_connect_within_group_branches() {
        let mut app = SolverApp::new();
        let a = add(&mut app, "a", None);
        let b = add(&mut app, "b", Some(&a));
        let c = add(&mut app, "c", Some(&a));
        connect(&mut app, &b, &c).unwrap();

        assert_eq!(app.groups().len(), 1);
        assert_eq!(app.main_path_steps(), vec![a.clone(), b.clone(), c.clone()]);
        assert!(matches!(
            connect(&mut app, &c, &a),
            Err(IntentError::Connect(ConnectError::WouldCreateCycle { .. }))
        ));
    }

    #[test]
    fn test_delete_step_splits_and_keeps_main() {
        let mut app = SolverApp::new();
        let a = add(&mut app, "a", None);
        let b = add(&mut app, "b", Some(&a));
        let c = add(&mut app, "c", Some(&b));

        app.apply(GraphIntent::DeleteStep { id: b.clone() }).unwrap();

        assert_eq!(app.groups().len(), 2);
        assert_eq!(app.main_group_id(), Some(group_of(&app, &a).as_str()));
        assert_eq!(app.main_path_steps(), vec![a.clone()]);
        assert!(app.groups().iter().all(|g| !g.contains(&b)));
        assert!(app.graph().edges().iter().all(|e| !e.data.is_main_path_edge));

        app.apply(GraphIntent::RestoreStep { id: b.clone() }).unwrap();
        assert_eq!(app.groups().len(), 1);
        assert_eq!(app.main_path_steps(), vec![a, b, c]);
    }

    #[test]
    fn test_restore_step_keeps_graph_acyclic() {
        let mut app = SolverApp::new();
        let a = add(&mut app, "a", None);
        let b = add(&mut app, "b", Some(&a));
        let forward = app.graph().edges()[0].id.clone();

        app.apply(GraphIntent::DeleteEdge { id: forward.clone() }).unwrap();
        connect(&mut app, &b, &a).unwrap();
        app.apply(GraphIntent::DeleteStep { id: a.clone() }).unwrap();
        app.apply(GraphIntent::RestoreStep { id: a.clone() }).unwrap();

        assert!(app.graph().get_edge(&forward).unwrap().data.is_deleted);
        assert!(PetgraphAdapter::from_graph(app.graph()).is_acyclic());
        assert_eq!(app.main_path_steps(), vec![b, a]);
    }

    #[test]
    fn test_main_follows_surviving_step_when_start_deleted() {
        let mut app = SolverApp::new();
        let a = add(&mut app, "a", None);
        let b = add(&mut app, "b", Some(&a));
        let other = add(&mut app, "other", None);

        app.apply(GraphIntent::DeleteStep { id: a }).unwrap();
        assert_eq!(app.main_group_id(), Some(group_of(&app, &b).as_str()));
        assert_ne!(app.main_group_id(), Some(group_of(&app, &other).as_str()));
    }

    #[test]
    fn test_delete_edge_marks_new_path() {
        let mut app = SolverApp::new();
        let a = add(&mut app, "a", None);
        let b = add(&mut app, "b", Some(&a));
        let c = add(&mut app, "c", Some(&a));
        let edge_ac = app
            .graph()
            .edges()
            .iter()
            .find(|e| e.target == c)
            .unwrap()
            .id
            .clone();

        app.apply(GraphIntent::DeleteEdge { id: edge_ac.clone() }).unwrap();
        assert_eq!(app.main_path_steps(), vec![a, b]);
        let deleted = app.graph().get_edge(&edge_ac).unwrap();
        assert!(!deleted.data.is_main_path_edge && !deleted.data.is_on_new_path);

        assert_eq!(
            app.apply(GraphIntent::DeleteEdge { id: "nope".to_string() }),
            Err(IntentError::UnknownEdge("nope".to_string()))
        );
    }

    #[test]
    fn test_set_main_path() {
        let mut app = SolverApp::new();
        let a = add(&mut app, "a", None);
        let x = add(&mut app, "x", None);
        let y = add(&mut app, "y", Some(&x));

        let side = group_of(&app, &x);
        app.apply(GraphIntent::SetMainPath {
            group_id: Some(side.clone()),
        })
        .unwrap();
        assert_eq!(app.main_path_steps(), vec![x.clone(), y.clone()]);
        assert_eq!(app.groups().iter().filter(|g| g.is_main_path).count(), 1);

        let err = app.apply(GraphIntent::SetMainPath {
            group_id: Some("group-99".to_string()),
        });
        assert_eq!(err, Err(IntentError::UnknownGroup("group-99".to_string())));
        assert_eq!(app.main_group_id(), Some(side.as_str()));
        assert!(find_group_for_node(app.groups(), &x).unwrap().is_main_path);

        app.apply(GraphIntent::SetMainPath { group_id: None }).unwrap();
        assert!(app.main_path_steps().is_empty());
        assert!(app.groups().iter().all(|g| !g.is_main_path));
        assert!(!app.graph().get_step(&a).unwrap().is_deleted);
    }

    #[test]
    fn test_apply_layout_places_main_first() {
        let mut app = SolverApp::new();
        let a = add(&mut app, "a", None);
        let b = add(&mut app, "b", Some(&a));
        let x = add(&mut app, "x", None);
        app.apply(GraphIntent::SetMainPath {
            group_id: Some(group_of(&app, &x)),
        })
        .unwrap();

        app.apply(GraphIntent::ApplyLayout).unwrap();

        let position = |id: &str| app.graph().get_step(id).unwrap().position;
        assert_eq!(position(&x), Point2D::new(50.0, 50.0));
        assert_eq!(position(&a), Point2D::new(350.0, 50.0));
        assert_eq!(position(&b), Point2D::new(350.0, 170.0));
        assert!(app.groups().iter().all(|g| g.layout_position.is_some()));
    }

    #[test]
    fn test_edit_step() {
        let mut app = SolverApp::new();
        let a = add(&mut app, "a", None);
        app.apply(GraphIntent::EditStep {
            id: a.clone(),
            content: StepContent::new("Simplify", "x = 2"),
        })
        .unwrap();
        assert_eq!(app.graph().get_step(&a).unwrap().content.latex, "x = 2");
        assert_eq!(app.flow().nodes[0].data.label, "Simplify");
    }

    #[test]
    fn test_single_step_main_path_survives_reload() {
        let mut app = SolverApp::new();
        let a = add(&mut app, "a", None);
        assert_eq!(app.graph().main_anchor(), Some(a.as_str()));

        let snapshot = app.graph().to_snapshot();
        assert_eq!(snapshot.main_step_id.as_deref(), Some(a.as_str()));

        let restored =
            SolverApp::from_graph(SolutionGraph::from_snapshot(&snapshot), LayoutConfig::default());
        assert_eq!(restored.main_path_steps(), vec![a]);
    }

    #[test]
    fn test_clearing_main_path_clears_anchor() {
        let mut app = SolverApp::new();
        add(&mut app, "a", None);
        app.apply(GraphIntent::SetMainPath { group_id: None }).unwrap();
        assert_eq!(app.graph().main_anchor(), None);

        let restored = SolverApp::from_graph(
            SolutionGraph::from_snapshot(&app.graph().to_snapshot()),
            LayoutConfig::default(),
        );
        assert_eq!(restored.main_group_id(), None);
    }

    #[test]
    fn test_from_graph_recovers_main_group() {
        let mut app = SolverApp::new();
        let a = add(&mut app, "a", None);
        let b = add(&mut app, "b", Some(&a));
        let x = add(&mut app, "x", None);
        add(&mut app, "y", Some(&x));
        app.apply(GraphIntent::SetMainPath {
            group_id: Some(group_of(&app, &x)),
        })
        .unwrap();

        let snapshot = app.graph().to_snapshot();
        let restored =
            SolverApp::from_graph(SolutionGraph::from_snapshot(&snapshot), LayoutConfig::default());

        assert_eq!(restored.main_group_id(), Some(group_of(&restored, &x).as_str()));
        assert_ne!(restored.main_group_id(), Some(group_of(&restored, &b).as_str()));
    }

    #[test]
    fn test_from_graph_without_anchor_uses_main_edges() {
        let mut app = SolverApp::new();
        let a = add(&mut app, "a", None);
        let b = add(&mut app, "b", Some(&a));
        add(&mut app, "x", None);

        let mut snapshot = app.graph().to_snapshot();
        snapshot.main_step_id = None;
        let restored =
            SolverApp::from_graph(SolutionGraph::from_snapshot(&snapshot), LayoutConfig::default());

        assert_eq!(restored.main_path_steps(), vec![a.clone(), b]);
        assert_eq!(restored.graph().main_anchor(), Some(a.as_str()));
    }
}
