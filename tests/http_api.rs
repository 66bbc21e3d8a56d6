use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use mimic::config::BotConfig;
use mimic::server::{AppState, router};
use mimic::{Engine, SeededRandom};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const CONFIG: &str = r#"
variables:
  bot_name: Bot
streaming:
  chunk_delay_ms: 0
rules:
  - id: greet
    match: { endpoint: chat, contains: [hello] }
    respond: { text: "Hi from {{bot_name}} today" }
  - id: throttle
    match: { contains: [limit] }
    respond:
      error: { status: 429, code: rate_limit_exceeded, message: "Rate limit exceeded" }
  - id: research
    match: { endpoint: responses, contains: [research] }
    respond:
      use_tools: [web_search, file_search]
      message: { text: "Here is what I found." }
  - id: echo
    match: { endpoint: responses, contains: [repeat] }
    respond: { text: "you said {{last_user_message}}" }
"#;

fn app(yaml: &str) -> Router {
    let config = BotConfig::from_yaml_str(yaml).unwrap();
    router(AppState::new(Engine::with_random(config, Arc::new(SeededRandom::new(7)))))
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let content_type =
        resp.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(str::to_string);
    let body = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    (status, content_type, body.to_vec())
}

async fn post_json(app: &Router, uri: &str, payload: Value) -> (StatusCode, Option<String>, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    call(app, request).await
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap();
    let (status, _, body) = call(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

/// `data:` payloads of an SSE body, in order.
fn sse_data(body: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(body)
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim_start().to_string())
        .collect()
}

#[tokio::test]
async fn chat_completion_answers_from_matching_rule() {
    let app = app(CONFIG);
    let (status, _, body) = post_json(
        &app,
        "/v1/chat/completions",
        json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hello there"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], "gpt-4o");
    assert!(body["id"].as_str().unwrap().starts_with("chatcmpl-"));
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["message"]["content"], "Hi from Bot today");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["usage"], json!({"prompt_tokens": 2, "completion_tokens": 4, "total_tokens": 6}));
}

#[tokio::test]
async fn chat_without_rules_uses_builtin_replies() {
    let app = app("");
    let (status, _, body) = post_json(
        &app,
        "/v1/chat/completions",
        json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "how is the weather"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["choices"][0]["message"]["content"].as_str().unwrap().contains("weather"));
}

#[tokio::test]
async fn injected_error_uses_openai_envelope() {
    let app = app(CONFIG);
    let (status, _, body) = post_json(
        &app,
        "/v1/chat/completions",
        json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "test the limit"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        body,
        json!({"error": {"message": "Rate limit exceeded", "code": "rate_limit_exceeded", "type": "rate_limit_error"}})
    );
}

#[tokio::test]
async fn injected_error_is_never_streamed() {
    let app = app(CONFIG);
    for (uri, payload) in [
        ("/v1/chat/completions", json!({"messages": [{"role": "user", "content": "limit"}], "stream": true})),
        ("/v1/responses", json!({"input": "limit", "stream": true})),
    ] {
        let (status, content_type, body) = post_json(&app, uri, payload).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS, "{uri}");
        assert_eq!(content_type.as_deref(), Some("application/json"), "{uri}");
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["code"], "rate_limit_exceeded");
    }
}

#[tokio::test]
async fn chat_stream_reassembles_to_the_full_text() {
    let app = app(CONFIG);
    let (status, content_type, body) = post_json(
        &app,
        "/v1/chat/completions",
        json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hello"}], "stream": true}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/event-stream"));

    let data = sse_data(&body);
    assert_eq!(data.last().map(String::as_str), Some("[DONE]"));

    let chunks: Vec<Value> = data[..data.len() - 1].iter().map(|d| serde_json::from_str(d).unwrap()).collect();
    assert_eq!(chunks[0]["choices"][0]["delta"], json!({"role": "assistant"}));
    assert_eq!(chunks.last().unwrap()["choices"][0]["finish_reason"], "stop");
    assert!(chunks.iter().all(|c| c["object"] == "chat.completion.chunk" && c["id"] == chunks[0]["id"]));

    let text: String =
        chunks.iter().filter_map(|c| c["choices"][0]["delta"]["content"].as_str()).collect::<Vec<_>>().concat();
    assert_eq!(text, "Hi from Bot today");
}

#[tokio::test]
async fn disabled_streaming_answers_in_one_shot() {
    let app = app("streaming: { enabled: false }\nrules:\n  - respond: { text: plain answer }\n");
    let (status, content_type, body) = post_json(
        &app,
        "/v1/chat/completions",
        json!({"messages": [{"role": "user", "content": "anything"}], "stream": true}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["choices"][0]["message"]["content"], "plain answer");
}

#[tokio::test]
async fn responses_place_tool_stubs_before_the_cited_message() {
    let app = app(CONFIG);
    let (status, _, body) =
        post_json(&app, "/v1/responses", json!({"model": "gpt-4o", "input": "do some research"})).await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["object"], "response");
    assert!(body["id"].as_str().unwrap().starts_with("resp_"));

    let output = body["output"].as_array().unwrap();
    let kinds: Vec<&str> = output.iter().map(|item| item["type"].as_str().unwrap()).collect();
    assert_eq!(kinds, ["web_search_call", "file_search_call", "message"]);
    assert!(output[..2].iter().all(|item| item["id"].as_str().unwrap().starts_with("ws_")));
    assert!(output[..2].iter().all(|item| item["status"] == "completed"));

    let message = &output[2];
    assert!(message["id"].as_str().unwrap().starts_with("msg_"));
    assert_eq!(message["role"], "assistant");
    assert_eq!(message["content"][0]["type"], "output_text");

    let annotations = message["content"][0]["annotations"].as_array().unwrap();
    assert_eq!(annotations.len(), 4);
    assert_eq!(annotations[0]["type"], "url_citation");
    assert_eq!(annotations[3]["type"], "file_citation");
    assert!(annotations.iter().all(|a| a["index"].is_null()));
}

#[tokio::test]
async fn responses_default_generation_follows_declared_tools() {
    let app = app("");
    let (status, _, body) = post_json(
        &app,
        "/v1/responses",
        json!({"model": "gpt-4o", "input": "anything new?", "tools": [{"type": "web_search_preview"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&body).unwrap();
    let output = body["output"].as_array().unwrap();
    assert_eq!(output.len(), 2);
    assert_eq!(output[0]["type"], "web_search_call");
    assert_eq!(output[1]["content"][0]["annotations"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn responses_stream_is_framed_and_stored() {
    let app = app(CONFIG);
    let (status, content_type, body) =
        post_json(&app, "/v1/responses", json!({"model": "gpt-4o", "input": "repeat alpha", "stream": true})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/event-stream"));

    let events: Vec<Value> = sse_data(&body).iter().map(|d| serde_json::from_str(d).unwrap()).collect();
    assert_eq!(events.first().unwrap()["type"], "response.created");
    assert_eq!(events.last().unwrap()["type"], "response.done");

    let text: String = events
        .iter()
        .filter(|e| e["type"] == "response.output_text.delta")
        .map(|e| e["delta"].as_str().unwrap())
        .collect::<Vec<_>>()
        .concat();
    assert_eq!(text, "you said repeat alpha");

    let id = events[0]["response"]["id"].as_str().unwrap();
    let (status, stored) = get_json(&app, &format!("/v1/responses/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["output"][0]["content"][0]["text"], "you said repeat alpha");
}

#[tokio::test]
async fn stored_responses_can_be_fetched_and_listed() {
    let app = app(CONFIG);
    let mut ids = Vec::new();
    for input in ["repeat one", "repeat two", "repeat three"] {
        let (_, _, body) = post_json(&app, "/v1/responses", json!({"model": "gpt-4o", "input": input})).await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        ids.push(body["id"].as_str().unwrap().to_string());
    }

    let (status, fetched) = get_json(&app, &format!("/v1/responses/{}", ids[1])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], ids[1].as_str());
    assert_eq!(fetched["output"][0]["content"][0]["text"], "you said repeat two");

    let (status, listed) = get_json(&app, "/v1/responses?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["object"], "list");
    let listed: Vec<&str> = listed["data"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(listed, [ids[0].as_str(), ids[1].as_str()]);

    let (_, all) = get_json(&app, "/v1/responses").await;
    assert_eq!(all["data"].as_array().unwrap().len(), 3);

    let (status, missing) = get_json(&app, "/v1/responses/resp_missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["error"]["code"], "not_found");
    assert_eq!(missing["error"]["type"], "not_found_error");
}

#[tokio::test]
async fn store_capacity_evicts_the_oldest_response() {
    let app = app("history: { max_responses: 2 }\nrules:\n  - respond: { text: ok }\n");
    let mut ids = Vec::new();
    for input in ["one", "two", "three"] {
        let (_, _, body) = post_json(&app, "/v1/responses", json!({"model": "gpt-4o", "input": input})).await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        ids.push(body["id"].as_str().unwrap().to_string());
    }

    let (status, _) = get_json(&app, &format!("/v1/responses/{}", ids[0])).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = get_json(&app, "/v1/responses").await;
    let listed: Vec<&str> = listed["data"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(listed, [ids[1].as_str(), ids[2].as_str()]);
}

#[tokio::test]
async fn previous_response_id_carries_history_into_usage() {
    let app = app(CONFIG);
    let (_, _, first) = post_json(&app, "/v1/responses", json!({"model": "gpt-4o", "input": "repeat one two"})).await;
    let first: Value = serde_json::from_slice(&first).unwrap();
    assert_eq!(first["usage"]["prompt_tokens"], 3);
    assert_eq!(first["usage"]["completion_tokens"], 5);

    let (_, _, second) = post_json(
        &app,
        "/v1/responses",
        json!({"model": "gpt-4o", "input": "repeat", "previous_response_id": first["id"]}),
    )
    .await;
    let second: Value = serde_json::from_slice(&second).unwrap();

    assert_eq!(second["previous_response_id"], first["id"]);
    // 3 + 5 words of history plus the new input
    assert_eq!(second["usage"]["prompt_tokens"], 9);
    assert_eq!(second["usage"]["completion_tokens"], 3);
    assert_eq!(second["usage"]["total_tokens"], 12);
}

#[tokio::test]
async fn unknown_previous_response_starts_a_new_chain() {
    let app = app(CONFIG);
    let (status, _, body) = post_json(
        &app,
        "/v1/responses",
        json!({"model": "gpt-4o", "input": "repeat", "previous_response_id": "resp_gone"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["usage"]["prompt_tokens"], 1);
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let app = app(CONFIG);
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = call(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"]["code"], "invalid_json");
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn models_default_to_stock_ids() {
    let (status, body) = get_json(&app(""), "/v1/models").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["object"], "list");

    let ids: Vec<&str> = body["data"].as_array().unwrap().iter().map(|m| m["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["gpt-4o", "gpt-4o-mini", "gpt-3.5-turbo"]);
    assert_eq!(body["data"][0]["object"], "model");
    assert_eq!(body["data"][0]["owned_by"], "openai");
    assert_eq!(body["data"][0]["created"], 1677610602);
}

#[tokio::test]
async fn configured_models_replace_the_defaults() {
    let (_, body) = get_json(&app("models:\n  - { id: local-1, owned_by: me }\n"), "/v1/models").await;
    assert_eq!(body["data"], json!([{"id": "local-1", "object": "model", "created": 1677610602, "owned_by": "me"}]));
}

#[tokio::test]
async fn health_reports_every_surface() {
    let (status, body) = get_json(&app(""), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_i64());
    assert_eq!(body["apis"]["chat_completions"], "available");
    assert_eq!(body["apis"]["responses"], "available");
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let app = app("server: { cors: \"https://app.example\" }\n");
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/v1/chat/completions")
        .header(header::ORIGIN, "https://app.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(request).await.unwrap();

    assert!(resp.status().is_success());
    assert_eq!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "https://app.example");
}
