/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Incremental decoder for streamed chat completions.
//!
//! The response body is a server-sent-event stream:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"x = "}}]}
//!
//! data: {"choices":[{"delta":{"content":"2"}}]}
//!
//! data: [DONE]
//! ```
//!
//! Network chunks may split lines (and UTF-8 sequences) anywhere, so bytes
//! are buffered until a full line is available.

use log::debug;
use serde::Deserialize;

use super::{ApiErrorBody, ChatError};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// One decoded stream event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A piece of assistant text
    Delta(String),
    /// The server sent `[DONE]`
    Done,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Buffers raw body chunks and yields complete events
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `[DONE]` has been seen; later input is ignored
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a chunk of the response body.
    ///
    /// Returns the events completed by this chunk. An error payload inside
    /// the stream is returned as `ChatError::Api`; malformed JSON lines are
    /// skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<StreamEvent>, ChatError> {
        if self.done {
            return Ok(Vec::new());
        }
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.decode_line(&line, &mut events)?;
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        Ok(events)
    }

    /// Flush a final line that arrived without a trailing newline
    pub fn finish(&mut self) -> Result<Vec<StreamEvent>, ChatError> {
        let mut events = Vec::new();
        if !self.done && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.decode_line(&line, &mut events)?;
        }
        Ok(events)
    }

    fn decode_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) -> Result<(), ChatError> {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim_end_matches(['\n', '\r']);

        // Blank lines separate events; `:` lines are keep-alive comments;
        // `event:`/`id:`/`retry:` fields carry nothing we use.
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return Ok(());
        };
        let payload = payload.trim_start();

        if payload == DONE_SENTINEL {
            self.done = true;
            events.push(StreamEvent::Done);
            return Ok(());
        }

        let chunk: StreamChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!("Skipping malformed stream chunk: {e}");
                return Ok(());
            },
        };
        if let Some(error) = chunk.error {
            return Err(ChatError::Api(error.message));
        }
        events.extend(
            chunk
                .choices
                .into_iter()
                .filter_map(|choice| choice.delta?.content)
                .filter(|content| !content.is_empty())
                .map(StreamEvent::Delta),
        );
        Ok(())
    }
}
