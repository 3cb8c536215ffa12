use std::sync::Arc;

use axum::{
  body::{to_bytes, Body},
  http::{Request, StatusCode},
  Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use ielts_backend::config::AppConfig;
use ielts_backend::routes::build_router;
use ielts_backend::state::AppState;

fn app() -> Router {
  build_router(Arc::new(AppState::from_config(AppConfig::default(), None)))
}

async fn call(app: &Router, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
  let mut req = Request::builder().method(method).uri(uri);
  if let Some(u) = user {
    req = req.header("x-user-id", u);
  }
  let req = match body {
    Some(b) => req.header("content-type", "application/json").body(Body::from(b.to_string())).unwrap(),
    None => req.body(Body::empty()).unwrap(),
  };
  let res = app.clone().oneshot(req).await.unwrap();
  let status = res.status();
  let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
  (status, value)
}

#[tokio::test]
async fn health_reports_offline_generator() {
  let app = app();
  let (status, body) = call(&app, "GET", "/api/v1/health", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["ok"], true);
  assert_eq!(body["llm"], false);
  assert_eq!(body["generator"], "template");
}

#[tokio::test]
async fn exam_generation_requires_a_topic() {
  let app = app();
  let (status, body) = call(&app, "POST", "/api/v1/exam/generate", None, Some(json!({ "topic": "  " }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("Topic"));

  let (status, body) = call(&app, "POST", "/api/v1/exam/generate", None, Some(json!({ "topic": "Oceans" }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["listening"]["questions"].as_array().unwrap().len(), 5);
  assert!(body["writing"]["prompt"].as_str().unwrap().contains("Oceans"));
}

#[tokio::test]
async fn results_are_per_user_and_feed_stats() {
  let app = app();
  for (skill, score) in [("reading", 6.0), ("reading", 7.0), ("listening", 8.0)] {
    let (status, _) = call(
      &app,
      "POST",
      "/api/v1/results",
      Some("erin"),
      Some(json!({ "skill": skill, "score": score, "topic": "Bees" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
  }
  call(&app, "POST", "/api/v1/results", Some("frank"), Some(json!({ "skill": "writing", "score": 5.0 }))).await;

  let (_, mine) = call(&app, "GET", "/api/v1/results", Some("erin"), None).await;
  let mine = mine.as_array().unwrap();
  assert_eq!(mine.len(), 3);
  assert_eq!(mine[0]["skill"], "listening");

  let (_, history) = call(&app, "GET", "/api/v1/history", None, None).await;
  assert_eq!(history.as_array().unwrap().len(), 4);
  assert_eq!(history[0]["topic"], "General");

  let (_, stats) = call(&app, "GET", "/api/v1/stats", Some("erin"), None).await;
  assert_eq!(stats["radarData"][0]["subject"], "Reading");
  assert_eq!(stats["radarData"][0]["A"], 6.5);
  assert_eq!(stats["radarData"][1]["A"], 8.0);
  // (6.5 + 8.0 + 0 + 0) / 4 = 3.625
  assert_eq!(stats["overall"], "3.6");
}

#[tokio::test]
async fn out_of_range_score_is_rejected() {
  let app = app();
  let (status, _) = call(&app, "POST", "/api/v1/results", None, Some(json!({ "skill": "reading", "score": 12 }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn writing_grade_falls_back_to_word_count_and_saves() {
  let app = app();
  let essay = "evidence ".repeat(260);
  let (status, body) = call(
    &app,
    "POST",
    "/api/v1/writing/grade",
    Some("gina"),
    Some(json!({ "topic": "Cities", "question": "Discuss.", "essay": essay })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["overall_score"], 7.0);
  assert!(body["savedId"].is_string());

  let (_, mine) = call(&app, "GET", "/api/v1/results", Some("gina"), None).await;
  assert_eq!(mine[0]["skill"], "writing");
  assert_eq!(mine[0]["id"], body["savedId"]);
}

#[tokio::test]
async fn llm_only_endpoints_report_unavailable() {
  let app = app();
  let (status, body) =
    call(&app, "POST", "/api/v1/speaking/grade", None, Some(json!({ "topic": "Food", "transcript": "I like rice." }))).await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
  assert!(body["error"].is_string());

  let (status, _) = call(&app, "POST", "/api/v1/vocabulary", None, Some(json!({ "word": "lucid" }))).await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn speaking_chat_works_offline() {
  let app = app();
  let (status, body) = call(&app, "POST", "/api/v1/speaking/chat", None, Some(json!({ "topic": "Sport", "messages": [] }))).await;
  assert_eq!(status, StatusCode::OK);
  assert!(body["content"].as_str().unwrap().contains("Sport"));
}

#[tokio::test]
async fn deleting_unknown_vocabulary_is_not_found() {
  let app = app();
  let (status, _) = call(
    &app,
    "DELETE",
    "/api/v1/vocabulary?id=7b0e4c1e-9a39-4b41-8d7c-2f1f3c6f9a10",
    Some("hana"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, list) = call(&app, "GET", "/api/v1/vocabulary", Some("hana"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert!(list.as_array().unwrap().is_empty());
}
