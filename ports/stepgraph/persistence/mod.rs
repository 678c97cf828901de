/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Local persistence for solver state using redb (key-value items) and
//! fjall (append-only version history).
//!
//! Architecture:
//! - Items (problem, page layout, current graph) are JSON values in one redb
//!   table, keyed by string like the browser's local storage
//! - Every saved version is appended to a fjall keyspace under a big-endian
//!   sequence number, so iteration order is save order
//! - Unreadable entries are logged and treated as absent

pub mod codec;
pub mod types;

use log::warn;
use redb::{ReadableDatabase, ReadableTable};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use types::{GraphSnapshot, ProblemRecord, VersionEntry};
use uuid::Uuid;

use crate::graph::SolutionGraph;
use crate::panels::PanelLayout;

const ITEM_TABLE: redb::TableDefinition<&str, &[u8]> = redb::TableDefinition::new("items");

pub const PROBLEM_KEY: &str = "problem";
pub const PAGE_LAYOUT_KEY: &str = "page-layout";
pub const GRAPH_KEY: &str = "graph";

/// Persistent solver store backed by redb (items) + fjall (history)
pub struct ProblemStore {
    /// Kept alive so the Keyspace borrow remains valid (fjall requires it).
    _db: fjall::Database,
    history_keyspace: fjall::Keyspace,
    item_db: redb::Database,
    history_sequence: u64,
}

impl ProblemStore {
    /// Open or create a store at the given directory
    pub fn open(base_dir: PathBuf) -> Result<Self, ProblemStoreError> {
        std::fs::create_dir_all(&base_dir)
            .map_err(|e| ProblemStoreError::Io(format!("Failed to create dir: {e}")))?;

        let history_path = base_dir.join("history");
        let item_path = base_dir.join("items.redb");

        let db = fjall::Database::builder(&history_path)
            .open()
            .map_err(|e| ProblemStoreError::Fjall(format!("{e}")))?;

        let history_keyspace = db
            .keyspace("versions", || fjall::KeyspaceCreateOptions::default())
            .map_err(|e| ProblemStoreError::Fjall(format!("{e}")))?;

        let item_db = redb::Database::create(&item_path)
            .map_err(|e| ProblemStoreError::Redb(format!("{e}")))?;

        let history_sequence = Self::find_max_sequence(&history_keyspace) + 1;

        Ok(Self {
            _db: db,
            history_keyspace,
            item_db,
            history_sequence,
        })
    }

    /// Store a value under `key`, replacing any previous value
    pub fn set_item<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), ProblemStoreError> {
        let bytes = serde_json::to_vec(value).map_err(|e| ProblemStoreError::Json(format!("{e}")))?;

        let write_txn = self
            .item_db
            .begin_write()
            .map_err(|e| ProblemStoreError::Redb(format!("{e}")))?;
        {
            let mut table = write_txn
                .open_table(ITEM_TABLE)
                .map_err(|e| ProblemStoreError::Redb(format!("{e}")))?;
            table
                .insert(key, bytes.as_slice())
                .map_err(|e| ProblemStoreError::Redb(format!("{e}")))?;
        }
        write_txn
            .commit()
            .map_err(|e| ProblemStoreError::Redb(format!("{e}")))?;
        Ok(())
    }

    /// Load the value stored under `key`.
    ///
    /// Missing keys and entries that fail to decode both return `None`.
    pub fn get_item<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.read_bytes(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring unreadable item `{key}`: {e}");
                None
            },
        }
    }

    /// Load the raw JSON under `key` with tagged dates turned into ISO strings
    pub fn get_json(&self, key: &str) -> Option<serde_json::Value> {
        let mut value: serde_json::Value = self.get_item(key)?;
        codec::revive_dates(&mut value);
        Some(value)
    }

    /// Store raw JSON under `key`.
    ///
    /// Strings under the keys named in `date_fields` are stored as tagged
    /// dates; everything else is written as given.
    pub fn set_json(
        &mut self,
        key: &str,
        mut value: serde_json::Value,
        date_fields: &[&str],
    ) -> Result<(), ProblemStoreError> {
        codec::tag_dates(&mut value, date_fields);
        self.set_item(key, &value)
    }

    /// Remove the value under `key`. Returns whether anything was removed.
    pub fn remove_item(&mut self, key: &str) -> Result<bool, ProblemStoreError> {
        let write_txn = self
            .item_db
            .begin_write()
            .map_err(|e| ProblemStoreError::Redb(format!("{e}")))?;
        let removed = {
            let mut table = write_txn
                .open_table(ITEM_TABLE)
                .map_err(|e| ProblemStoreError::Redb(format!("{e}")))?;
            table
                .remove(key)
                .map_err(|e| ProblemStoreError::Redb(format!("{e}")))?
                .is_some()
        };
        write_txn
            .commit()
            .map_err(|e| ProblemStoreError::Redb(format!("{e}")))?;
        Ok(removed)
    }

    /// All stored item keys, in key order
    pub fn keys(&self) -> Vec<String> {
        let Ok(read_txn) = self.item_db.begin_read() else {
            return Vec::new();
        };
        let Ok(table) = read_txn.open_table(ITEM_TABLE) else {
            return Vec::new();
        };
        let Ok(range) = table.iter() else {
            return Vec::new();
        };
        range
            .filter_map(|entry| entry.ok().map(|(key, _)| key.value().to_string()))
            .collect()
    }

    fn read_bytes(&self, key: &str) -> Option<Vec<u8>> {
        let read_txn = self.item_db.begin_read().ok()?;
        let table = read_txn.open_table(ITEM_TABLE).ok()?;
        let entry = table.get(key).ok()??;
        Some(entry.value().to_vec())
    }

    /// Persist the problem record, logging failures
    pub fn save_problem(&mut self, problem: &ProblemRecord) {
        if let Err(e) = self.set_item(PROBLEM_KEY, problem) {
            warn!("Failed to save problem: {e}");
        }
    }

    pub fn load_problem(&self) -> Option<ProblemRecord> {
        self.get_item(PROBLEM_KEY)
    }

    /// Persist the panel layout, logging failures
    pub fn save_page_layout(&mut self, layout: &PanelLayout) {
        if let Err(e) = self.set_item(PAGE_LAYOUT_KEY, layout) {
            warn!("Failed to save page layout: {e}");
        }
    }

    /// Load the panel layout; stored layouts that break the panel
    /// invariants are replaced with the default
    pub fn load_page_layout(&self) -> Option<PanelLayout> {
        self.get_item::<PanelLayout>(PAGE_LAYOUT_KEY)
            .map(PanelLayout::sanitized)
    }

    /// Persist the current graph, logging failures
    pub fn save_graph(&mut self, graph: &SolutionGraph) {
        if let Err(e) = self.set_item(GRAPH_KEY, &graph.to_snapshot()) {
            warn!("Failed to save graph: {e}");
        }
    }

    pub fn load_graph(&self) -> Option<SolutionGraph> {
        self.get_item::<GraphSnapshot>(GRAPH_KEY)
            .map(|snapshot| SolutionGraph::from_snapshot(&snapshot))
    }

    /// Append a version of the graph to the history
    pub fn record_version(&mut self, label: &str, graph: &SolutionGraph) -> Option<Uuid> {
        let snapshot = graph.to_snapshot();
        let entry = VersionEntry {
            id: Uuid::new_v4(),
            label: label.to_string(),
            saved_at: snapshot.saved_at,
            snapshot,
        };
        let bytes = match serde_json::to_vec(&entry) {
            Ok(b) => b,
            Err(e) => {
                warn!("Failed to serialize version: {e}");
                return None;
            },
        };

        let key = self.history_sequence.to_be_bytes();
        if let Err(e) = self.history_keyspace.insert(key, bytes.as_slice()) {
            warn!("Failed to write version: {e}");
            return None;
        }
        self.history_sequence += 1;
        Some(entry.id)
    }

    /// All readable versions, oldest first
    pub fn versions(&self) -> Vec<VersionEntry> {
        let mut versions = Vec::new();
        for guard in self.history_keyspace.iter() {
            let (_, value) = match guard.into_inner() {
                Ok(kv) => kv,
                Err(_) => continue,
            };
            match serde_json::from_slice::<VersionEntry>(value.as_ref()) {
                Ok(entry) => versions.push(entry),
                Err(e) => warn!("Skipping unreadable version: {e}"),
            }
        }
        versions
    }

    /// Rebuild the graph saved in a version
    pub fn restore_version(&self, id: Uuid) -> Option<SolutionGraph> {
        self.versions()
            .into_iter()
            .find(|entry| entry.id == id)
            .map(|entry| SolutionGraph::from_snapshot(&entry.snapshot))
    }

    /// Drop the whole version history
    pub fn clear_history(&mut self) {
        let keys: Vec<Vec<u8>> = self
            .history_keyspace
            .iter()
            .filter_map(|guard| guard.key().ok().map(|k| k.to_vec()))
            .collect();
        for key in keys {
            if let Err(e) = self.history_keyspace.remove(key) {
                warn!("Failed to remove version: {e}");
            }
        }
        self.history_sequence = 1;
    }

    /// Clear all persisted state (items + history)
    pub fn clear_all(&mut self) -> Result<(), ProblemStoreError> {
        for key in self.keys() {
            self.remove_item(&key)?;
        }
        self.clear_history();
        Ok(())
    }

    fn find_max_sequence(keyspace: &fjall::Keyspace) -> u64 {
        let mut max = 0u64;
        for guard in keyspace.iter() {
            if let Ok(key_bytes) = guard.key()
                && let Ok(bytes) = <[u8; 8]>::try_from(key_bytes.as_ref())
            {
                max = max.max(u64::from_be_bytes(bytes));
            }
        }
        max
    }

    /// Get the default storage directory for solver data
    pub fn default_data_dir() -> PathBuf {
        crate::config::StorageConfig::default().resolved_data_dir()
    }
}

/// Errors from the problem store
#[derive(Debug)]
pub enum ProblemStoreError {
    Io(String),
    Fjall(String),
    Redb(String),
    Json(String),
}

impl std::fmt::Display for ProblemStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProblemStoreError::Io(e) => write!(f, "IO error: {e}"),
            ProblemStoreError::Fjall(e) => write!(f, "Fjall error: {e}"),
            ProblemStoreError::Redb(e) => write!(f, "Redb error: {e}"),
            ProblemStoreError::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for ProblemStoreError {}
