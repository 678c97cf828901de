/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Adapter layer between the SolutionGraph and the browser graph renderer.
//!
//! Emits the renderer's public contract: nodes shaped `{id, type, data,
//! position}` and edges shaped `{id, source, target, data, style}`, as
//! camelCase JSON. Only live steps and live edges are emitted.

use serde::Serialize;
use std::collections::HashMap;

use super::SolutionGraph;
use crate::util::compact_label;

/// Renderer node type for solution steps
pub const STEP_NODE_TYPE: &str = "solutionStep";

const MAX_LABEL_CHARS: usize = 40;

const MAIN_PATH_STROKE: &str = "#2563eb";
const NEW_PATH_STROKE: &str = "#f59e0b";
const DEFAULT_STROKE: &str = "#94a3b8";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowPosition {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNodeData {
    pub label: String,
    pub latex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// 1-based position on the main path, if the step is on it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_number: Option<usize>,
    pub is_main_path: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub data: FlowNodeData,
    pub position: FlowPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdgeData {
    pub is_on_new_path: bool,
    pub is_main_path_edge: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdgeStyle {
    pub stroke: String,
    pub stroke_width: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_dasharray: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub data: FlowEdgeData,
    pub style: FlowEdgeStyle,
}

/// Renderer-ready graph
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    /// Build the renderer contract from the graph and the ordered main path.
    ///
    /// Edge flags are read from the graph as-is; call
    /// `SolutionGraph::annotate_main_path` first to refresh them.
    pub fn from_graph(graph: &SolutionGraph, main_steps: &[String]) -> Self {
        let step_numbers: HashMap<&str, usize> = main_steps
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i + 1))
            .collect();

        let nodes = graph
            .active_nodes()
            .map(|node| {
                let step_number = step_numbers.get(node.id.as_str()).copied();
                FlowNode {
                    id: node.id.clone(),
                    node_type: STEP_NODE_TYPE.to_string(),
                    data: FlowNodeData {
                        label: compact_label(&node.content.label, MAX_LABEL_CHARS),
                        latex: node.content.latex.clone(),
                        explanation: node.content.explanation.clone(),
                        step_number,
                        is_main_path: step_number.is_some(),
                    },
                    position: FlowPosition {
                        x: node.position.x,
                        y: node.position.y,
                    },
                }
            })
            .collect();

        let edges = graph
            .active_edges()
            .map(|edge| FlowEdge {
                id: edge.id.clone(),
                source: edge.source.clone(),
                target: edge.target.clone(),
                data: FlowEdgeData {
                    is_on_new_path: edge.data.is_on_new_path,
                    is_main_path_edge: edge.data.is_main_path_edge,
                },
                style: edge_style(edge.data.is_main_path_edge, edge.data.is_on_new_path),
            })
            .collect();

        Self { nodes, edges }
    }

    /// Serialize to the JSON the renderer consumes
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn edge_style(is_main_path_edge: bool, is_on_new_path: bool) -> FlowEdgeStyle {
    if is_main_path_edge {
        FlowEdgeStyle {
            stroke: MAIN_PATH_STROKE.to_string(),
            stroke_width: 3.0,
            stroke_dasharray: None,
        }
    } else if is_on_new_path {
        FlowEdgeStyle {
            stroke: NEW_PATH_STROKE.to_string(),
            stroke_width: 2.0,
            stroke_dasharray: Some("5,5".to_string()),
        }
    } else {
        FlowEdgeStyle {
            stroke: DEFAULT_STROKE.to_string(),
            stroke_width: 2.0,
            stroke_dasharray: None,
        }
    }
}
