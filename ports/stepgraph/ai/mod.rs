/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Wire types for the tutoring chat.
//!
//! Requests and responses follow the OpenAI-compatible chat-completions
//! format. Transport is left to the embedder: this module builds request
//! bodies and decodes response bodies (whole or streamed).

pub mod sse;

use serde::{Deserialize, Serialize};

use crate::config::ChatConfig;
use crate::graph::SolutionGraph;
use crate::persistence::types::ProblemRecord;
use crate::util::compact_label;

pub use sse::{SseDecoder, StreamEvent};

/// Longest step label quoted in the system prompt
const PROMPT_LABEL_CHARS: usize = 80;

const TUTOR_PREAMBLE: &str = "You are a patient math tutor. Guide the student toward the \
                              next step instead of giving the full answer. Write math in LaTeX.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Body of a chat-completions request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn from_config(config: &ChatConfig, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: config.model.clone(),
            messages,
            stream: config.stream,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn to_json(&self) -> Result<String, ChatError> {
        serde_json::to_string(self).map_err(|e| ChatError::Json(format!("{e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Body was not the expected JSON
    Json(String),
    /// The API returned an error object
    Api(String),
    /// A completion arrived without any content
    Empty,
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatError::Json(e) => write!(f, "Malformed chat response: {e}"),
            ChatError::Api(message) => write!(f, "Chat API error: {message}"),
            ChatError::Empty => write!(f, "Chat API returned no content"),
        }
    }
}

impl std::error::Error for ChatError {}

#[derive(Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub(crate) message: String,
}

#[derive(Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extract the assistant text from a non-streamed completion body
pub fn parse_completion(body: &str) -> Result<String, ChatError> {
    let parsed: CompletionBody =
        serde_json::from_str(body).map_err(|e| ChatError::Json(format!("{e}")))?;
    if let Some(error) = parsed.error {
        return Err(ChatError::Api(error.message));
    }
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message?.content)
        .filter(|content| !content.is_empty())
        .ok_or(ChatError::Empty)
}

/// Build the message list for one tutoring turn.
///
/// The system prompt states the problem and the steps of the main path so
/// far; `history` is the prior conversation; `user_input` is appended last.
pub fn build_tutor_messages(
    problem: Option<&ProblemRecord>,
    graph: &SolutionGraph,
    main_steps: &[String],
    history: &[ChatMessage],
    user_input: &str,
) -> Vec<ChatMessage> {
    let mut prompt = String::from(TUTOR_PREAMBLE);

    if let Some(problem) = problem {
        prompt.push_str(&format!("\n\nProblem: {}\n{}", problem.title, problem.statement));
    }

    let steps: Vec<String> = main_steps
        .iter()
        .filter_map(|id| graph.get_step(id))
        .enumerate()
        .map(|(i, node)| {
            format!(
                "{}. {} ({})",
                i + 1,
                compact_label(&node.content.label, PROMPT_LABEL_CHARS),
                node.content.latex
            )
        })
        .collect();
    if steps.is_empty() {
        prompt.push_str("\n\nThe student has not written any steps yet.");
    } else {
        prompt.push_str("\n\nSteps so far:\n");
        prompt.push_str(&steps.join("\n"));
    }

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(prompt));
    messages.extend(
        history
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .cloned(),
    );
    messages.push(ChatMessage::user(user_input));
    messages
}

/// Conversation log that grows an assistant reply from stream deltas
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatTranscript {
    messages: Vec<ChatMessage>,
    pending: Option<String>,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Reply text received so far, if a stream is in progress
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.finish_reply();
        self.messages.push(ChatMessage::user(content));
    }

    /// Apply one decoded stream event
    pub fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Delta(text) => self.pending.get_or_insert_with(String::new).push_str(&text),
            StreamEvent::Done => self.finish_reply(),
        }
    }

    /// Close the in-progress reply. Empty replies are dropped.
    pub fn finish_reply(&mut self) {
        if let Some(text) = self.pending.take()
            && !text.is_empty()
        {
            self.messages.push(ChatMessage::assistant(text));
        }
    }

    /// Discard the in-progress reply, e.g. after a stream error
    pub fn abort_reply(&mut self) {
        self.pending = None;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.pending = None;
    }
}
