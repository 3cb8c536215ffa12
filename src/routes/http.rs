//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.
//! The caller is identified by the `x-user-id` header ("guest" when absent).

use std::sync::Arc;

use axum::{
  extract::{Query, State},
  http::HeaderMap,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

pub const USER_HEADER: &str = "x-user-id";
pub const GUEST: &str = "guest";

pub fn user_from_headers(headers: &HeaderMap) -> String {
  headers
    .get(USER_HEADER)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .unwrap_or(GUEST)
    .to_string()
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, llm: state.llm.is_some(), generator: state.generator.name().to_string() })
}

#[instrument(level = "info", skip(state, body), fields(topic = %body.topic))]
pub async fn http_post_exam(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TopicIn>,
) -> Result<impl IntoResponse, ApiError> {
  let exam = generate_exam(&state, &body.topic).await?;
  info!(target: "exam", topic = %body.topic, listening = exam.listening.questions.len(), reading = exam.reading.questions.len(), "HTTP exam served");
  Ok(Json(exam))
}

#[instrument(level = "info", skip(state, body), fields(topic = %body.topic))]
pub async fn http_post_reading(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TopicIn>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(reading_test(&state, &body.topic).await?))
}

#[instrument(level = "info", skip(state, body), fields(topic = %body.topic))]
pub async fn http_post_writing_prompt(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TopicIn>,
) -> Result<impl IntoResponse, ApiError> {
  let question = writing_question(&state, &body.topic).await?;
  Ok(Json(WritingPromptOut { question }))
}

#[instrument(level = "info", skip(state, headers, body), fields(essay_len = body.essay.len()))]
pub async fn http_post_writing_grade(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<WritingGradeIn>,
) -> Result<impl IntoResponse, ApiError> {
  let user = user_from_headers(&headers);
  Ok(Json(grade_writing(&state, &user, &body.topic, &body.question, &body.essay).await?))
}

#[instrument(level = "info", skip(state, body), fields(turns = body.messages.len()))]
pub async fn http_post_speaking_chat(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SpeakingChatIn>,
) -> Result<impl IntoResponse, ApiError> {
  let content = examiner_reply(&state, &body.topic, &body.messages).await?;
  Ok(Json(SpeakingChatOut { content }))
}

#[instrument(level = "info", skip(state, headers, body), fields(transcript_len = body.transcript.len()))]
pub async fn http_post_speaking_grade(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<SpeakingGradeIn>,
) -> Result<impl IntoResponse, ApiError> {
  let user = user_from_headers(&headers);
  Ok(Json(grade_speaking(&state, &user, &body.topic, &body.transcript).await?))
}

#[instrument(level = "info", skip(state, headers, body), fields(skill = %body.skill, score = body.score))]
pub async fn http_post_result(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<ResultIn>,
) -> Result<impl IntoResponse, ApiError> {
  let user = user_from_headers(&headers);
  let record = save_result(&state, &user, &body.skill, body.score, &body.topic).await?;
  info!(target: "ielts_backend", %user, id = %record.id, "Result saved");
  Ok(Json(record))
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_get_results(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
  Json(state.results.for_user(&user_from_headers(&headers)).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.results.all().await)
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_get_stats(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
  Json(state.results.stats_for(&user_from_headers(&headers)).await)
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_get_vocabulary(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
  Json(state.vocabulary.list_for(&user_from_headers(&headers)).await)
}

#[instrument(level = "info", skip(state, headers, body), fields(word = %body.word))]
pub async fn http_post_vocabulary(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<VocabularyIn>,
) -> Result<impl IntoResponse, ApiError> {
  let user = user_from_headers(&headers);
  Ok(Json(add_vocabulary(&state, &user, &body.word).await?))
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_delete_vocabulary(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Query(q): Query<VocabularyIdQuery>,
) -> Result<impl IntoResponse, ApiError> {
  let user = user_from_headers(&headers);
  if state.vocabulary.delete(&user, q.id).await {
    Ok(Json(OkOut { ok: true }))
  } else {
    Err(ApiError::NotFound(format!("No vocabulary entry {} for this user", q.id)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::HeaderValue;

  #[test]
  fn user_header_defaults_to_guest() {
    let mut headers = HeaderMap::new();
    assert_eq!(user_from_headers(&headers), "guest");
    headers.insert(USER_HEADER, HeaderValue::from_static("  "));
    assert_eq!(user_from_headers(&headers), "guest");
    headers.insert(USER_HEADER, HeaderValue::from_static(" alice "));
    assert_eq!(user_from_headers(&headers), "alice");
  }
}
