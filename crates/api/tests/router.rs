use std::sync::Arc;

use api::{app, AppState, StaticTokens};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use brain_core::{Brain, ToolCall};
use database::Database;
use http_body_util::BodyExt;
use mock_brain::{EchoBrain, ScriptedBrain};
use orchestrator::{ChatService, ModelCatalog, ResumableStreams};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app(brain: Arc<dyn Brain>) -> (Router, Database) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    db.migrate().await.unwrap();

    let catalog = ModelCatalog::standard(brain, "large", "small")
        .with_title_model(Arc::new(EchoBrain::new()), "small");
    let service = ChatService::new(Arc::new(db.clone()), catalog, agent_tools::ToolRegistry::new())
        .with_resumable_streams(Arc::new(ResumableStreams::new()));
    let sessions = StaticTokens::parse("alice-token:alice,bob-token:bob");

    (app(AppState::new(service, Arc::new(sessions))), db)
}

fn turn_body(chat_id: &str, message_id: &str, text: &str) -> Value {
    json!({
        "id": chat_id,
        "message": {
            "id": message_id,
            "role": "user",
            "parts": [{"type": "text", "text": text}]
        },
        "selectedChatModel": "chat-model"
    })
}

fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(serde_json::to_vec(body).unwrap())).unwrap()
}

fn request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// `(id, data)` of every SSE event in a body.
fn sse_events(body: &str) -> Vec<(Option<usize>, String)> {
    body.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .filter_map(|block| {
            let mut id = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("id: ") {
                    id = value.trim().parse().ok();
                } else if let Some(value) = line.strip_prefix("data: ") {
                    data = Some(value.to_string());
                }
            }
            data.map(|data| (id, data))
        })
        .collect()
}

fn event_types(events: &[(Option<usize>, String)]) -> Vec<String> {
    events
        .iter()
        .map(|(_, data)| match serde_json::from_str::<Value>(data) {
            Ok(value) => value["type"].as_str().unwrap_or_default().to_string(),
            Err(_) => data.clone(),
        })
        .collect()
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _db) = test_app(Arc::new(ScriptedBrain::new())).await;

    let response = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn submit_requires_a_session() {
    let (app, _db) = test_app(Arc::new(ScriptedBrain::new())).await;

    let response = app
        .oneshot(post_json("/api/chat", None, &turn_body("c1", "m1", "hi")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "unauthorized:chat");
}

#[tokio::test]
async fn malformed_turn_is_a_bad_request() {
    let (app, _db) = test_app(Arc::new(ScriptedBrain::new())).await;

    let response = app
        .clone()
        .oneshot(post_json("/api/chat", Some("alice-token"), &json!({"id": "c1"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "bad_request:api");

    let too_long = turn_body("c1", "m1", &"x".repeat(2001));
    let response = app
        .oneshot(post_json("/api/chat", Some("alice-token"), &too_long))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submit_streams_sse_and_resumes_by_last_event_id() {
    let brain = Arc::new(ScriptedBrain::new().then_text("Hello from the server side."));
    let (app, db) = test_app(brain).await;

    let response = app
        .clone()
        .oneshot(post_json("/api/chat", Some("alice-token"), &turn_body("c1", "m1", "hi")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
    let stream_id = response.headers()["x-stream-id"].to_str().unwrap().to_string();

    let events = sse_events(&body_text(response).await);
    let types = event_types(&events);
    assert_eq!(types.first().map(String::as_str), Some("start"));
    assert_eq!(types[types.len() - 2], "data-usage");
    assert_eq!(types.last().map(String::as_str), Some("[DONE]"));
    assert_eq!(events[0].0, Some(0));
    assert_eq!(events[2].0, Some(2));

    let mut resume = request("GET", &format!("/api/stream/{}", stream_id), "alice-token");
    resume
        .headers_mut()
        .insert("last-event-id", "1".parse().unwrap());
    let response = app.clone().oneshot(resume).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let resumed = sse_events(&body_text(response).await);
    assert_eq!(resumed, events[2..].to_vec());

    let response = app
        .clone()
        .oneshot(request("GET", "/api/chat/c1/stream", "alice-token"))
        .await
        .unwrap();
    assert_eq!(sse_events(&body_text(response).await), events);

    let response = app
        .oneshot(request("GET", "/api/chat/c1/stream", "bob-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "forbidden:chat");

    let chat = orchestrator::ChatStore::get_chat(&db, "c1").await.unwrap().unwrap();
    assert_eq!(chat.user_id, "alice");
}

#[tokio::test]
async fn resume_of_unknown_chat_is_not_found() {
    let (app, _db) = test_app(Arc::new(ScriptedBrain::new())).await;

    let response = app
        .clone()
        .oneshot(request("GET", "/api/chat/missing/stream", "alice-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "not_found:chat");

    let response = app
        .oneshot(request("POST", "/api/chat/missing/stop", "alice-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tool_events_are_streamed() {
    let brain = Arc::new(
        ScriptedBrain::new()
            .then_tool_calls(vec![ToolCall::new("call-1", "getWeather", json!({"location": "Paris"}))])
            .then_text("I could not check the weather."),
    );
    let (app, _db) = test_app(brain).await;

    let response = app
        .oneshot(post_json("/api/chat", Some("alice-token"), &turn_body("c1", "m1", "Weather in Paris?")))
        .await
        .unwrap();
    let events = sse_events(&body_text(response).await);
    let types = event_types(&events);

    assert_eq!(&types[..3], &["start", "tool-call", "tool-result"]);
    let result: Value = serde_json::from_str(&events[2].1).unwrap();
    assert_eq!(result["toolCallId"], "call-1");
    assert_eq!(result["isError"], true);
}

#[tokio::test]
async fn delete_chat_and_trailing_messages() {
    let brain = Arc::new(ScriptedBrain::new().then_text("first").then_text("second"));
    let (app, _db) = test_app(brain).await;

    for (message_id, text) in [("m1", "one"), ("m2", "two")] {
        let response = app
            .clone()
            .oneshot(post_json("/api/chat", Some("alice-token"), &turn_body("c1", message_id, text)))
            .await
            .unwrap();
        body_text(response).await;
    }

    let response = app
        .clone()
        .oneshot(request("DELETE", "/api/messages/m2/trailing", "alice-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["deleted"], 1);

    let response = app
        .clone()
        .oneshot(request("DELETE", "/api/chat?id=c1", "bob-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(request("DELETE", "/api/chat", "alice-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(request("DELETE", "/api/chat?id=c1", "alice-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], "c1");

    let response = app
        .oneshot(request("DELETE", "/api/chat?id=c1", "alice-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn models_follow_entitlements() {
    let (app, _db) = test_app(Arc::new(ScriptedBrain::new())).await;

    let response = app
        .oneshot(request("GET", "/api/models", "alice-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["defaultModel"], "chat-model");
    let ids: Vec<&str> = body["models"]
        .as_array()
        .unwrap()
        .iter()
        .map(|model| model["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["chat-model", "chat-model-reasoning"]);
}
