//! A rule-driven stand-in for OpenAI-style chat and responses APIs.
//!
//! Requests are answered from a YAML-configured rule table instead of a model:
//! the [`Engine`] matches the request against ordered rules, composes text,
//! canned tool calls and citations (or an injected error), and the HTTP layer in
//! [`server`] serializes the result at once or streams it word by word.
//!
//! ```text
//! request ──▶ Conversation (last user, full text, last role)
//!                 │
//!                 v
//!          RuleMatcher ──▶ Resolver ──▶ text | tool stubs | annotations | error
//!                                          │
//!                                          v
//!                           one-shot JSON  or  delivery::stream (SSE)
//! ```

mod api;
pub mod config;
mod engine;
pub mod server;

pub use api::{ChatResolution, Engine, Explanation, InjectedError, ResolvedResponse, ToolCallStub};
pub use engine::{
    Chunks, Frame, MatchMetrics, RandomSource, RunMetrics, SeededRandom, ThreadRandom, Tier, TemplateContext, ToolRegistry,
    chunks, frames, stream,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- Request-side types -----------------------------------------------------

/// API surface a request arrived on (and a rule may be restricted to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Chat,
    Responses,
}

impl Endpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Chat => "chat",
            Endpoint::Responses => "responses",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message content as clients send it: plain text, or a list of typed parts
/// (images, files, ...). Anything else is kept verbatim.
///
/// Only `Text` contributes to rule matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<Value>),
    Other(Value),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Other(Value::Null)
    }
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

/// One conversation turn. `role` defaults to `"user"` for input items that omit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub content: MessageContent,
}

impl Message {
    pub fn new(role: &str, content: impl Into<MessageContent>) -> Self {
        Message { role: role.to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new("user", content)
    }
}

fn default_role() -> String {
    "user".to_string()
}

/// The `input` field of the responses surface: a bare string or a message list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Input {
    Text(String),
    Messages(Vec<Message>),
}

impl Default for Input {
    fn default() -> Self {
        Input::Text(String::new())
    }
}

// --- Conversation: the flat view the engine matches against ----------------

/// The three strings rule matching needs, extracted once per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    /// Text of the most recent `user` message with string content.
    pub last_user: String,
    /// Newline-joined text of every message with non-empty string content.
    pub full_text: String,
    /// Role of the final message (empty for an empty conversation).
    pub last_role: String,
}

impl Conversation {
    /// Flatten a chat message list.
    pub fn from_messages(messages: &[Message]) -> Self {
        let mut conversation = Conversation::default();
        let mut parts: Vec<&str> = Vec::with_capacity(messages.len());

        for message in messages {
            let text = message.content.as_text();
            if message.role == "user" {
                if let Some(text) = text {
                    conversation.last_user = text.to_string();
                }
            }
            if let Some(text) = text.filter(|t| !t.is_empty()) {
                parts.push(text);
            }
            conversation.last_role = message.role.clone();
        }

        conversation.full_text = parts.join("\n");
        conversation
    }

    /// Flatten a responses-surface `input`. A bare string is a single user turn.
    pub fn from_input(input: &Input) -> Self {
        match input {
            Input::Text(text) => {
                let text = text.trim().to_string();
                Conversation { last_user: text.clone(), full_text: text, last_role: "user".to_string() }
            }
            Input::Messages(messages) => {
                let mut conversation = Self::from_messages(messages);
                conversation.last_user = conversation.last_user.trim().to_string();
                conversation.full_text = conversation.full_text.trim().to_string();
                conversation
            }
        }
    }

    /// Text of the final message for the built-in reply tier; non-text content reads as empty.
    pub(crate) fn last_message(messages: &[Message]) -> Option<&str> {
        messages.last().map(|m| m.content.as_text().unwrap_or(""))
    }
}
