/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Serializable types for persisted solver state.
//!
//! Field names are camelCase and dates use the tagged encoding so entries
//! stay readable by the browser front end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::codec::tagged_date;

/// Persisted solution step
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedStep {
    pub id: String,
    pub label: String,
    pub latex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(with = "tagged_date")]
    pub created_at: DateTime<Utc>,
    pub position_x: f32,
    pub position_y: f32,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Persisted derivation edge
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_on_new_path: bool,
    #[serde(default)]
    pub is_main_path_edge: bool,
    #[serde(default)]
    pub deleted_with_step: bool,
}

/// Full graph snapshot
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub nodes: Vec<PersistedStep>,
    pub edges: Vec<PersistedEdge>,
    /// Start step of the main path when the snapshot was taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_step_id: Option<String>,
    #[serde(with = "tagged_date")]
    pub saved_at: DateTime<Utc>,
}

/// One entry of the version history
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub id: Uuid,
    pub label: String,
    #[serde(with = "tagged_date")]
    pub saved_at: DateTime<Utc>,
    pub snapshot: GraphSnapshot,
}

/// The problem being solved
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProblemRecord {
    pub id: Uuid,
    pub title: String,
    /// Problem statement as LaTeX
    pub statement: String,
    #[serde(with = "tagged_date")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "tagged_date")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, with = "tagged_date::option")]
    pub solved_at: Option<DateTime<Utc>>,
}

impl ProblemRecord {
    pub fn new(title: impl Into<String>, statement: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            statement: statement.into(),
            created_at: now,
            updated_at: now,
            solved_at: None,
        }
    }
}
