use super::wire::{ResponseEvent, ResponseObject, ResponsesRequest, Usage, output_items, word_count};
use super::{ApiError, AppState};
use crate::{Conversation, Frame, stream};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_LIST_LIMIT: usize = 20;

/// A served response plus the conversation turns that led to it.
#[derive(Debug, Clone)]
pub(super) struct StoredResponse {
    pub response: ResponseObject,
    /// Inputs and outputs of the chain, oldest first, capped at `history.max_turns`.
    pub history: Vec<String>,
}

pub(super) async fn create(
    State(state): State<AppState>,
    payload: Result<Json<ResponsesRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let engine = &state.engine;

    let resolved = match engine.resolve_responses(&request.model, &request.input)? {
        Some(resolved) => resolved,
        None => engine.legacy_response(&request.model, &request.input, &request.tool_types()),
    };

    let mut history = match &request.previous_response_id {
        Some(previous) => match state.store.get(previous).await {
            Some(stored) => stored.history,
            None => {
                tracing::debug!(previous_response_id = %previous, "unknown previous response, starting a new chain");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let input_text = Conversation::from_input(&request.input).full_text;
    let prompt_tokens = history.iter().map(|turn| word_count(turn)).sum::<usize>() + word_count(&input_text);
    history.push(input_text);
    history.push(resolved.text.clone());
    cap_history(&mut history, engine.config().history.max_turns);

    let id = engine.new_id("resp_");
    let response = ResponseObject {
        id: id.clone(),
        object: "response".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: request.model.clone(),
        output: output_items(&resolved, engine.new_id("msg_")),
        usage: Usage::new(prompt_tokens, word_count(&resolved.text)),
        previous_response_id: request.previous_response_id.clone(),
    };

    state.store.put(id.clone(), StoredResponse { response: response.clone(), history }).await;
    tracing::debug!(%id, tools = resolved.prefix_tools.len(), stream = request.stream, "stored response");

    if request.stream && engine.config().streaming_enabled() {
        return Ok(Sse::new(response_events(response, resolved.text, resolved.delay)).into_response());
    }
    Ok(Json(response).into_response())
}

/// `response.created`, one `response.output_text.delta` per word, `response.done`.
fn response_events(
    response: ResponseObject,
    text: String,
    delay: Duration,
) -> impl Stream<Item = Result<Event, axum::Error>> + Send + 'static {
    stream(text, delay).map(move |frame| {
        let event = match frame {
            Frame::Start => ResponseEvent::Created { response: &response },
            Frame::Delta(delta) => ResponseEvent::OutputTextDelta { delta },
            Frame::Done => ResponseEvent::Done { response: &response },
        };
        Event::default().json_data(event)
    })
}

fn cap_history(history: &mut Vec<String>, max_turns: usize) {
    let overflow = history.len().saturating_sub(max_turns);
    history.drain(..overflow);
}

pub(super) async fn retrieve(
    State(state): State<AppState>,
    Path(response_id): Path<String>,
) -> Result<Json<ResponseObject>, ApiError> {
    match state.store.get(&response_id).await {
        Some(stored) => Ok(Json(stored.response)),
        None => Err(ApiError::NotFound(response_id)),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ListParams {
    limit: Option<String>,
}

pub(super) async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<super::wire::List<ResponseObject>> {
    let limit = params.limit.as_deref().and_then(|l| l.parse().ok()).unwrap_or(DEFAULT_LIST_LIMIT);
    let responses = state.store.list(limit).await.into_iter().map(|stored| stored.response).collect();
    Json(super::wire::List::new(responses))
}
