//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Session lifecycle (start, end with a final flush)
//!   - Word checks, hints, and reveal-all with their scoring side effects
//!   - Playback commands and the per-session poll task
//!   - Fire-and-forget dispatch of sync actions to the persistence boundary

use std::time::Duration;

use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::backend::ProgressBackend;
use crate::completion::CompletionRestore;
use crate::domain::HideLevel;
use crate::masking::MaskedToken;
use crate::playback::SeekDirection;
use crate::protocol::{lesson_to_out, LessonOut, PlaybackOut, SessionOut, SummaryOut};
use crate::session::{DictationSession, RevealAllResult, SyncAction, WordCheckResult};
use crate::state::{AppState, SharedSession};

pub async fn list_lessons(state: &AppState) -> Vec<LessonOut> {
  state.list_lessons().await.iter().map(lesson_to_out).collect()
}

pub async fn get_lesson(state: &AppState, lesson_id: &str) -> Result<LessonOut, String> {
  state
    .get_lesson(lesson_id)
    .await
    .map(|lesson| lesson_to_out(&lesson))
    .ok_or_else(|| format!("Unknown lessonId: {}", lesson_id))
}

/// Forward sync actions to the external stores. Failures are logged; local
/// state stays authoritative and the next mutation re-sends the snapshot.
async fn run_actions(backend: ProgressBackend, learner: String, lesson_id: String, actions: Vec<SyncAction>) {
  for action in actions {
    let result = match &action {
      SyncAction::UpsertProgress(snapshot) => backend
        .upsert_progress(&learner, &lesson_id, "dictation", snapshot)
        .await
        .map(|ack| debug!(target: "session", %learner, %lesson_id, percent = ack.completion_percent, "progress upserted")),
      SyncAction::ScoreDelta { points, reason } => backend
        .apply_score_delta(&learner, *points, reason)
        .await
        .map(|ack| debug!(target: "session", %learner, total = ack.total_points, "score applied")),
      SyncAction::StreakActivity => backend
        .post_streak_activity(&learner)
        .await
        .map(|ack| debug!(target: "session", %learner, streak = ack.current_streak, "streak activity posted")),
      SyncAction::StreakReset => backend.reset_streak(&learner).await,
      SyncAction::StudyTime { seconds } => backend.record_study_time(&learner, &lesson_id, *seconds).await,
    };
    if let Err(e) = result {
      error!(target: "session", %learner, %lesson_id, error = %e, "sync action failed; keeping local state");
    }
  }
}

/// Fire-and-forget dispatch: never blocks the learner interaction.
fn dispatch_sync(state: &AppState, learner: &str, lesson_id: &str, actions: Vec<SyncAction>) {
  if actions.is_empty() {
    return;
  }
  let Some(backend) = state.backend.clone() else {
    debug!(target: "session", %learner, %lesson_id, count = actions.len(), "no backend; sync actions dropped");
    return;
  };
  tokio::spawn(run_actions(backend, learner.to_string(), lesson_id.to_string(), actions));
}

/// Spawn the per-frame poll for a session if one is not already running.
/// The task lives only while the session is playing or its study clock is
/// running, and exits on its own afterwards.
async fn ensure_poll(state: &AppState, shared: SharedSession) {
  {
    let mut session = shared.lock().await;
    if session.poll_running || !session.needs_poll() {
      return;
    }
    session.poll_running = true;
  }

  let state = state.clone();
  let interval = Duration::from_millis(state.tuning.poll_interval_ms);
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(interval);
    loop {
      ticker.tick().await;
      let (learner, lesson_id, actions, keep_going) = {
        let mut session = shared.lock().await;
        let (_, actions) = session.tick();
        let keep_going = session.needs_poll();
        if !keep_going {
          session.poll_running = false;
        }
        (session.learner.clone(), session.lesson_id.clone(), actions, keep_going)
      };
      dispatch_sync(&state, &learner, &lesson_id, actions);
      if !keep_going {
        break;
      }
    }
  });
}

#[instrument(level = "info", skip(state, restore), fields(%lesson_id, %learner))]
pub async fn start_session(
  state: &AppState,
  lesson_id: &str,
  learner: &str,
  hide_level: Option<HideLevel>,
  restore: Option<CompletionRestore>,
) -> Result<SessionOut, String> {
  let mut lesson = state
    .get_lesson(lesson_id)
    .await
    .ok_or_else(|| format!("Unknown lessonId: {}", lesson_id))?;

  if lesson.transcript.is_empty() {
    let url = lesson
      .transcript_url
      .clone()
      .ok_or_else(|| format!("Lesson {} has no transcript", lesson_id))?;
    let backend = state
      .backend
      .as_ref()
      .ok_or_else(|| "Remote transcripts need a configured backend".to_string())?;
    lesson.transcript = backend.fetch_transcript(&url).await?;
  }

  let id = Uuid::new_v4().to_string();
  let session = DictationSession::new(
    id.clone(),
    learner.to_string(),
    &lesson,
    hide_level.unwrap_or_default(),
    restore,
    &state.tuning,
  );
  let out = SessionOut {
    session_id: id.clone(),
    lesson_id: lesson.id.clone(),
    hide_level: session.hide_level(),
    total_sentences: session.total_sentences(),
    current_sentence: session.current_sentence(),
    completion_percent: session.completion_percent(),
  };
  state.insert_session(session).await;
  info!(target: "session", %id, %lesson_id, sentences = out.total_sentences, "session started");
  Ok(out)
}

/// End a session: cancel its poll, perform the final flush synchronously,
/// and discard the state.
#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn end_session(state: &AppState, session_id: &str) -> Result<SummaryOut, String> {
  let shared = state
    .remove_session(session_id)
    .await
    .ok_or_else(|| format!("Unknown sessionId: {}", session_id))?;

  let (learner, lesson_id, summary, actions) = {
    let mut session = shared.lock().await;
    let (summary, actions) = session.finish();
    (session.learner.clone(), session.lesson_id.clone(), summary, actions)
  };
  // Final flush is awaited (best-effort) rather than fire-and-forget.
  if let Some(backend) = state.backend.clone() {
    run_actions(backend, learner, lesson_id, actions).await;
  }
  info!(target: "session", %session_id, percent = summary.completion_percent, "session ended");
  Ok(summary.into())
}

async fn session_of(state: &AppState, session_id: &str) -> Result<SharedSession, String> {
  state
    .get_session(session_id)
    .await
    .ok_or_else(|| format!("Unknown sessionId: {}", session_id))
}

#[instrument(level = "debug", skip(state), fields(%session_id, sentence))]
pub async fn render_sentence(state: &AppState, session_id: &str, sentence: usize) -> Result<Vec<MaskedToken>, String> {
  let shared = session_of(state, session_id).await?;
  let session = shared.lock().await;
  session
    .render_sentence(sentence)
    .ok_or_else(|| format!("Sentence {} out of range", sentence))
}

#[instrument(level = "info", skip(state, typed), fields(%session_id, sentence, word, typed_len = typed.len()))]
pub async fn check_word(
  state: &AppState,
  session_id: &str,
  sentence: usize,
  word: usize,
  typed: &str,
) -> Result<WordCheckResult, String> {
  let shared = session_of(state, session_id).await?;
  let (learner, lesson_id, outcome) = {
    let mut session = shared.lock().await;
    let outcome = session.check_word(sentence, word, typed);
    (session.learner.clone(), session.lesson_id.clone(), outcome)
  };
  let (result, actions) = outcome.ok_or_else(|| format!("No maskable word at ({}, {})", sentence, word))?;
  dispatch_sync(state, &learner, &lesson_id, actions);
  Ok(result)
}

#[instrument(level = "info", skip(state), fields(%session_id, sentence, word))]
pub async fn request_hint(
  state: &AppState,
  session_id: &str,
  sentence: usize,
  word: usize,
) -> Result<WordCheckResult, String> {
  let shared = session_of(state, session_id).await?;
  let (learner, lesson_id, outcome) = {
    let mut session = shared.lock().await;
    let outcome = session.request_hint(sentence, word);
    (session.learner.clone(), session.lesson_id.clone(), outcome)
  };
  let (result, actions) = outcome.ok_or_else(|| format!("No maskable word at ({}, {})", sentence, word))?;
  dispatch_sync(state, &learner, &lesson_id, actions);
  Ok(result)
}

#[instrument(level = "info", skip(state), fields(%session_id, sentence))]
pub async fn reveal_all(state: &AppState, session_id: &str, sentence: usize) -> Result<RevealAllResult, String> {
  let shared = session_of(state, session_id).await?;
  let (learner, lesson_id, outcome) = {
    let mut session = shared.lock().await;
    let outcome = session.reveal_all(sentence);
    (session.learner.clone(), session.lesson_id.clone(), outcome)
  };
  let (result, actions) = outcome.ok_or_else(|| format!("Sentence {} out of range", sentence))?;
  dispatch_sync(state, &learner, &lesson_id, actions);
  Ok(result)
}

fn playback_out(session: &DictationSession) -> PlaybackOut {
  PlaybackOut {
    state: session.playback_state(),
    position: session.position(),
    current_sentence: session.current_sentence(),
    auto_stop: session.auto_stop(),
  }
}

/// Playback commands share one shape: lock, apply, restart the poll if the
/// session now needs it, report status.
async fn playback_command<F>(state: &AppState, session_id: &str, apply: F) -> Result<PlaybackOut, String>
where
  F: FnOnce(&mut DictationSession),
{
  let shared = session_of(state, session_id).await?;
  let out = {
    let mut session = shared.lock().await;
    apply(&mut session);
    playback_out(&session)
  };
  ensure_poll(state, shared).await;
  Ok(out)
}

pub async fn play_sentence(state: &AppState, session_id: &str, sentence: usize) -> Result<PlaybackOut, String> {
  playback_command(state, session_id, |s| s.play_sentence(sentence)).await
}

pub async fn toggle_play_pause(state: &AppState, session_id: &str) -> Result<PlaybackOut, String> {
  playback_command(state, session_id, |s| s.toggle_play_pause()).await
}

pub async fn seek_relative(state: &AppState, session_id: &str, direction: SeekDirection) -> Result<PlaybackOut, String> {
  playback_command(state, session_id, |s| s.seek_relative(direction)).await
}

pub async fn next_sentence(state: &AppState, session_id: &str) -> Result<PlaybackOut, String> {
  playback_command(state, session_id, |s| s.go_to_next()).await
}

pub async fn previous_sentence(state: &AppState, session_id: &str) -> Result<PlaybackOut, String> {
  playback_command(state, session_id, |s| s.go_to_previous()).await
}

pub async fn playback_status(state: &AppState, session_id: &str) -> Result<PlaybackOut, String> {
  let shared = session_of(state, session_id).await?;
  let session = shared.lock().await;
  Ok(playback_out(&session))
}

#[instrument(level = "info", skip(state), fields(%session_id, ?hide_level))]
pub async fn set_hide_level(state: &AppState, session_id: &str, hide_level: HideLevel) -> Result<HideLevel, String> {
  let shared = session_of(state, session_id).await?;
  let mut session = shared.lock().await;
  session.set_hide_level(hide_level);
  Ok(session.hide_level())
}

pub async fn set_auto_stop(state: &AppState, session_id: &str, enabled: bool) -> Result<bool, String> {
  let shared = session_of(state, session_id).await?;
  let mut session = shared.lock().await;
  session.set_auto_stop(enabled);
  Ok(enabled)
}

pub async fn set_rate(state: &AppState, session_id: &str, rate: f64) -> Result<f64, String> {
  let shared = session_of(state, session_id).await?;
  let mut session = shared.lock().await;
  session.set_rate(rate);
  Ok(rate)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn lesson_lookup_serves_the_seeded_bank() {
    let state = AppState::new();
    let lessons = list_lessons(&state).await;
    assert!(lessons.iter().any(|l| l.id == "demo-morgen"));

    let lesson = get_lesson(&state, "demo-morgen").await.unwrap();
    assert_eq!(lesson.total_sentences, 5);

    assert!(get_lesson(&state, "no-such-lesson").await.is_err());
  }
}
