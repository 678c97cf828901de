/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Core of the interactive math solver: the solution-step DAG, path groups,
//! layout, local persistence and the chat-completion wire codec.
//!
//! Everything here is synchronous and single-threaded. Graph algorithms are
//! pure functions over node/edge slices; the UI replaces whole snapshots.

pub mod ai;
pub mod app;
pub mod config;
pub mod graph;
pub mod panels;
pub mod persistence;
pub(crate) mod util;
