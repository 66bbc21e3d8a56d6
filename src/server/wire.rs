//! JSON shapes of the OpenAI-style surfaces.
//!
//! Only what the mock reads is modelled on the request side; unknown fields are
//! ignored. Response shapes follow what clients of the real APIs parse.

use crate::config::{Annotation, ModelConfig};
use crate::{Input, Message, ResolvedResponse};
use serde::{Deserialize, Serialize};

/// `created` stamp reported for every model.
const MODEL_CREATED: i64 = 1_677_610_602;

// --- Shared ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl Usage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Usage { prompt_tokens, completion_tokens, total_tokens: prompt_tokens + completion_tokens }
    }
}

/// Whitespace-separated word count, the mock's token estimate.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope<'a> {
    pub error: ErrorBody<'a>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub message: &'a str,
    pub code: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// OpenAI-style error `type` for an HTTP status.
pub fn error_type(status: u16) -> &'static str {
    match status {
        400 | 413 | 415 | 422 => "invalid_request_error",
        401 | 403 => "authentication_error",
        404 => "not_found_error",
        429 => "rate_limit_error",
        500..=599 => "server_error",
        _ => "api_error",
    }
}

#[derive(Debug, Serialize)]
pub struct List<T> {
    pub object: &'static str,
    pub data: Vec<T>,
}

impl<T> List<T> {
    pub fn new(data: Vec<T>) -> Self {
        List { object: "list", data }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub owned_by: String,
}

impl From<ModelConfig> for ModelEntry {
    fn from(model: ModelConfig) -> Self {
        ModelEntry { id: model.id, object: "model", created: MODEL_CREATED, owned_by: model.owned_by }
    }
}

// --- Chat completions -----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub stream: bool,
}

impl ChatRequest {
    pub fn prompt_tokens(&self) -> usize {
        self.messages.iter().filter_map(|m| m.content.as_text()).map(word_count).sum()
    }
}

#[derive(Debug, Serialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

#[derive(Debug, Serialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AssistantMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatCompletion {
    pub fn new(id: String, created: i64, model: String, content: String, usage: Usage) -> Self {
        ChatCompletion {
            id,
            object: "chat.completion",
            created,
            model,
            choices: vec![ChatChoice {
                index: 0,
                message: AssistantMessage { role: "assistant", content },
                finish_reason: "stop",
            }],
            usage,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatChunk {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: [ChunkChoice; 1],
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<&'static str>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatChunk {
    pub fn new(id: &str, created: i64, model: &str, delta: Delta, finish_reason: Option<&'static str>) -> Self {
        ChatChunk {
            id: id.to_string(),
            object: "chat.completion.chunk",
            created,
            model: model.to_string(),
            choices: [ChunkChoice { index: 0, delta, finish_reason }],
        }
    }
}

// --- Responses ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ResponsesRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub input: Input,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub previous_response_id: Option<String>,
}

/// A tool the client declares; only its type matters here.
#[derive(Debug, Deserialize)]
pub struct ToolSpec {
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl ResponsesRequest {
    pub fn tool_types(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.kind.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseObject {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub output: Vec<OutputItem>,
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<OutputContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<WireAnnotation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireAnnotation {
    /// Always `null`; citations are not anchored to text offsets.
    pub index: Option<u32>,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<&Annotation> for WireAnnotation {
    fn from(annotation: &Annotation) -> Self {
        WireAnnotation {
            index: None,
            kind: annotation.kind.clone(),
            title: annotation.title.clone(),
            url: annotation.url.clone(),
        }
    }
}

/// Tool stubs first, then one assistant message carrying the text and citations.
pub fn output_items(resolved: &ResolvedResponse, message_id: String) -> Vec<OutputItem> {
    let mut output: Vec<OutputItem> = resolved
        .prefix_tools
        .iter()
        .map(|stub| OutputItem {
            id: stub.id.clone(),
            kind: stub.kind.clone(),
            status: Some(stub.status.clone()),
            role: None,
            content: Vec::new(),
        })
        .collect();

    output.push(OutputItem {
        id: message_id,
        kind: "message".to_string(),
        status: Some("completed".to_string()),
        role: Some("assistant".to_string()),
        content: vec![OutputContent {
            kind: "output_text".to_string(),
            text: resolved.text.clone(),
            annotations: resolved.annotations.iter().map(WireAnnotation::from).collect(),
        }],
    });

    output
}

/// Server-sent events of a streamed response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ResponseEvent<'a> {
    #[serde(rename = "response.created")]
    Created { response: &'a ResponseObject },
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta { delta: String },
    #[serde(rename = "response.done")]
    Done { response: &'a ResponseObject },
}
