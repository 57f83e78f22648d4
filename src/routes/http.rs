//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs include parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

/// Engine errors surface as 400 with a JSON body; the session stays usable.
fn bad_request(message: String) -> (StatusCode, Json<serde_json::Value>) {
  (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": message })))
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_list_lessons(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let lessons = logic::list_lessons(&state).await;
  info!(target: "lesson", count = lessons.len(), "HTTP lessons listed");
  Json(serde_json::json!({ "lessons": lessons }))
}

#[instrument(level = "info", skip(state), fields(lesson_id = %id))]
pub async fn http_get_lesson(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> impl IntoResponse {
  match logic::get_lesson(&state, &id).await {
    Ok(lesson) => Json(lesson).into_response(),
    Err(e) => bad_request(e).into_response(),
  }
}

#[instrument(level = "info", skip(state, body), fields(%body.lesson_id, %body.learner))]
pub async fn http_start_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartSessionIn>,
) -> impl IntoResponse {
  match logic::start_session(&state, &body.lesson_id, &body.learner, body.hide_level, body.restore).await {
    Ok(session) => Json(session).into_response(),
    Err(e) => bad_request(e).into_response(),
  }
}

#[instrument(level = "info", skip(state), fields(session_id = %id))]
pub async fn http_end_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> impl IntoResponse {
  match logic::end_session(&state, &id).await {
    Ok(summary) => Json(summary).into_response(),
    Err(e) => bad_request(e).into_response(),
  }
}

#[instrument(level = "info", skip(state), fields(session_id = %id, sentence))]
pub async fn http_render_sentence(
  State(state): State<Arc<AppState>>,
  Path((id, sentence)): Path<(String, usize)>,
) -> impl IntoResponse {
  match logic::render_sentence(&state, &id, sentence).await {
    Ok(tokens) => Json(serde_json::json!({ "sentence": sentence, "tokens": tokens })).into_response(),
    Err(e) => bad_request(e).into_response(),
  }
}

#[instrument(level = "info", skip(state, body), fields(session_id = %id, body.sentence, body.word, typed_len = body.typed.len()))]
pub async fn http_check_word(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<CheckWordIn>,
) -> impl IntoResponse {
  match logic::check_word(&state, &id, body.sentence, body.word, &body.typed).await {
    Ok(result) => {
      info!(target: "session", %id, verdict = ?result.verdict, "HTTP word checked");
      Json(word_result_msg(body.sentence, body.word, result)).into_response()
    }
    Err(e) => bad_request(e).into_response(),
  }
}

#[instrument(level = "info", skip(state, body), fields(session_id = %id, body.sentence, body.word))]
pub async fn http_hint(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<WordRefIn>,
) -> impl IntoResponse {
  match logic::request_hint(&state, &id, body.sentence, body.word).await {
    Ok(result) => Json(word_result_msg(body.sentence, body.word, result)).into_response(),
    Err(e) => bad_request(e).into_response(),
  }
}

#[instrument(level = "info", skip(state, body), fields(session_id = %id, body.sentence))]
pub async fn http_reveal_all(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<SentenceRefIn>,
) -> impl IntoResponse {
  match logic::reveal_all(&state, &id, body.sentence).await {
    Ok(result) => Json(revealed_msg(body.sentence, result)).into_response(),
    Err(e) => bad_request(e).into_response(),
  }
}

#[instrument(level = "info", skip(state), fields(session_id = %id))]
pub async fn http_playback_status(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> impl IntoResponse {
  match logic::playback_status(&state, &id).await {
    Ok(status) => Json(status).into_response(),
    Err(e) => bad_request(e).into_response(),
  }
}
