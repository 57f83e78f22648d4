//! Thin client for the external persistence boundary: progress upserts,
//! score deltas, streak activity/reset, study time, and remote transcript
//! fetches.
//!
//! All writes are fire-and-forget from the engine's perspective: failures are
//! logged and never retried, because every later mutation re-sends the full
//! snapshot. Requests carry a bounded timeout so a stuck store cannot block
//! the session.
//!
//! NOTE: We never log the API token and we keep payload logging to sizes,
//! not contents.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::domain::Segment;
use crate::progress::ProgressSnapshot;

#[derive(Clone)]
pub struct ProgressBackend {
  pub client: reqwest::Client,
  pub base_url: String,
  api_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ProgressAck {
  #[serde(rename = "completionPercent", default)]
  pub completion_percent: u32,
}

#[derive(Debug, Deserialize)]
pub struct ScoreAck {
  #[serde(rename = "totalPoints", default)]
  pub total_points: f64,
  #[serde(rename = "monthlyPoints", default)]
  pub monthly_points: f64,
}

#[derive(Debug, Deserialize)]
pub struct StreakAck {
  #[serde(rename = "currentStreak", default)]
  pub current_streak: u32,
}

impl ProgressBackend {
  /// Construct the client if PROGRESS_API_URL is set; otherwise return None
  /// and the service runs local-only.
  pub fn from_env(request_timeout: Duration) -> Option<Self> {
    let base_url = std::env::var("PROGRESS_API_URL").ok()?;
    let api_token = std::env::var("PROGRESS_API_TOKEN").unwrap_or_default();

    let client = reqwest::Client::builder()
      .timeout(request_timeout)
      .build()
      .ok()?;

    Some(Self { client, base_url, api_token })
  }

  async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response, String> {
    let url = format!("{}{}", self.base_url, path);
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "diktat-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_token))
      .json(&body)
      .send()
      .await
      .map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      return Err(format!("{} returned {}", path, res.status()));
    }
    Ok(res)
  }

  /// Upsert the full progress snapshot, keyed by (learner, lesson, mode).
  /// Re-sending identical state is a semantic no-op on the store side.
  #[instrument(level = "info", skip(self, snapshot), fields(%learner, %lesson_id, words = snapshot.correct_words_count))]
  pub async fn upsert_progress(
    &self,
    learner: &str,
    lesson_id: &str,
    mode: &str,
    snapshot: &ProgressSnapshot,
  ) -> Result<ProgressAck, String> {
    let body = json!({
      "learner": learner,
      "lessonId": lesson_id,
      "mode": mode,
      "progress": snapshot,
    });
    let res = self.post("/progress", body).await?;
    res.json::<ProgressAck>().await.map_err(|e| e.to_string())
  }

  #[instrument(level = "info", skip(self), fields(%learner, points))]
  pub async fn apply_score_delta(&self, learner: &str, points: f64, reason: &str) -> Result<ScoreAck, String> {
    let body = json!({ "learner": learner, "pointsChange": points, "reason": reason });
    let res = self.post("/user/points", body).await?;
    res.json::<ScoreAck>().await.map_err(|e| e.to_string())
  }

  #[instrument(level = "info", skip(self), fields(%learner))]
  pub async fn post_streak_activity(&self, learner: &str) -> Result<StreakAck, String> {
    let body = json!({ "learner": learner, "action": "increment" });
    let res = self.post("/user/streak", body).await?;
    res.json::<StreakAck>().await.map_err(|e| e.to_string())
  }

  #[instrument(level = "info", skip(self), fields(%learner))]
  pub async fn reset_streak(&self, learner: &str) -> Result<(), String> {
    self.post("/user/streak", json!({ "learner": learner, "action": "reset" })).await?;
    Ok(())
  }

  #[instrument(level = "info", skip(self), fields(%learner, %lesson_id, seconds))]
  pub async fn record_study_time(&self, learner: &str, lesson_id: &str, seconds: u64) -> Result<(), String> {
    let body = json!({ "learner": learner, "lessonId": lesson_id, "seconds": seconds });
    self.post("/user/study-time", body).await?;
    Ok(())
  }

  /// Fetch a remote transcript (ordered `{text, start, end}` entries) for
  /// lessons configured with a transcript URL instead of inline segments.
  #[instrument(level = "info", skip(self), fields(%url))]
  pub async fn fetch_transcript(&self, url: &str) -> Result<Vec<Segment>, String> {
    let res = self
      .client
      .get(url)
      .header(USER_AGENT, "diktat-backend/0.1")
      .send()
      .await
      .map_err(|e| e.to_string())?;
    if !res.status().is_success() {
      return Err(format!("transcript fetch returned {}", res.status()));
    }
    let segments = res.json::<Vec<Segment>>().await.map_err(|e| e.to_string())?;
    info!(target: "diktat_backend", %url, segments = segments.len(), "Fetched remote transcript");
    Ok(segments)
  }
}
