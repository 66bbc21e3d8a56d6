use super::wire::{ChatChunk, ChatCompletion, ChatRequest, Delta, Usage, word_count};
use super::{ApiError, AppState};
use crate::{Frame, stream};
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::{Stream, StreamExt};
use std::time::Duration;

pub(super) async fn completions(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let engine = &state.engine;

    let resolution = engine.resolve_chat(&request.model, &request.messages);
    let text = resolution.outcome?;

    let id = engine.new_id("chatcmpl-");
    let created = chrono::Utc::now().timestamp();

    if request.stream && engine.config().streaming_enabled() {
        tracing::debug!(%id, delay_ms = resolution.delay.as_millis() as u64, "streaming chat completion");
        let events = chat_events(id, created, request.model, text, resolution.delay);
        return Ok(Sse::new(events).into_response());
    }

    let usage = Usage::new(request.prompt_tokens(), word_count(&text));
    Ok(Json(ChatCompletion::new(id, created, request.model, text, usage)).into_response())
}

/// Role chunk, one content chunk per word, a `stop` chunk, then `[DONE]`.
fn chat_events(
    id: String,
    created: i64,
    model: String,
    text: String,
    delay: Duration,
) -> impl Stream<Item = Result<Event, axum::Error>> + Send + 'static {
    let chunks = stream(text, delay).map(move |frame| {
        let (delta, finish_reason) = match frame {
            Frame::Start => (Delta { role: Some("assistant"), content: None }, None),
            Frame::Delta(content) => (Delta { role: None, content: Some(content) }, None),
            Frame::Done => (Delta::default(), Some("stop")),
        };
        Event::default().json_data(ChatChunk::new(&id, created, &model, delta, finish_reason))
    });

    chunks.chain(futures::stream::once(async { Ok(Event::default().data("[DONE]")) }))
}
