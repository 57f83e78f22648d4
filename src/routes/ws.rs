//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::logic;
use crate::protocol::{
  revealed_msg, word_result_msg, ClientWsMessage, ServerWsMessage,
};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "diktat_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "diktat_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target = "diktat_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "diktat_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "diktat_backend", "WebSocket disconnected");
}

fn err_msg(message: String) -> ServerWsMessage {
  ServerWsMessage::Error { message }
}

#[instrument(level = "info", skip(state, msg))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::ListLessons => {
      let lessons = logic::list_lessons(state).await;
      ServerWsMessage::Lessons { lessons }
    }

    ClientWsMessage::StartSession { lesson_id, learner, hide_level, restore } => {
      match logic::start_session(state, &lesson_id, &learner, hide_level, restore).await {
        Ok(session) => ServerWsMessage::SessionStarted { session },
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::EndSession { session_id } => {
      match logic::end_session(state, &session_id).await {
        Ok(summary) => ServerWsMessage::SessionEnded { session_id, summary },
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::RenderSentence { session_id, sentence } => {
      match logic::render_sentence(state, &session_id, sentence).await {
        Ok(tokens) => ServerWsMessage::MaskedSentence { sentence, tokens },
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::CheckWord { session_id, sentence, word, typed } => {
      match logic::check_word(state, &session_id, sentence, word, &typed).await {
        Ok(result) => {
          tracing::info!(target: "session", id = %session_id, verdict = ?result.verdict, "WS word checked");
          word_result_msg(sentence, word, result)
        }
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::Hint { session_id, sentence, word } => {
      match logic::request_hint(state, &session_id, sentence, word).await {
        Ok(result) => word_result_msg(sentence, word, result),
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::RevealAll { session_id, sentence } => {
      match logic::reveal_all(state, &session_id, sentence).await {
        Ok(result) => revealed_msg(sentence, result),
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::PlaySentence { session_id, sentence } => {
      match logic::play_sentence(state, &session_id, sentence).await {
        Ok(status) => ServerWsMessage::Playback { status },
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::TogglePlayPause { session_id } => {
      match logic::toggle_play_pause(state, &session_id).await {
        Ok(status) => ServerWsMessage::Playback { status },
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::SeekRelative { session_id, direction } => {
      match logic::seek_relative(state, &session_id, direction).await {
        Ok(status) => ServerWsMessage::Playback { status },
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::NextSentence { session_id } => {
      match logic::next_sentence(state, &session_id).await {
        Ok(status) => ServerWsMessage::Playback { status },
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::PreviousSentence { session_id } => {
      match logic::previous_sentence(state, &session_id).await {
        Ok(status) => ServerWsMessage::Playback { status },
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::SetHideLevel { session_id, hide_level } => {
      match logic::set_hide_level(state, &session_id, hide_level).await {
        Ok(hide_level) => ServerWsMessage::HideLevelSet { hide_level },
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::SetAutoStop { session_id, enabled } => {
      match logic::set_auto_stop(state, &session_id, enabled).await {
        Ok(enabled) => ServerWsMessage::AutoStopSet { enabled },
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::SetRate { session_id, rate } => {
      match logic::set_rate(state, &session_id, rate).await {
        Ok(rate) => ServerWsMessage::RateSet { rate },
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::PlaybackStatus { session_id } => {
      match logic::playback_status(state, &session_id).await {
        Ok(status) => ServerWsMessage::Playback { status },
        Err(e) => err_msg(e),
      }
    }
  }
}
