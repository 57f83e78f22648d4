//! Engine configuration (timing tunables + optional lesson bank) from TOML.
//!
//! See `EngineTuning` for the knobs and their defaults. Everything is
//! optional: without ENGINE_CONFIG_PATH the service runs on defaults and
//! built-in seed lessons.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Lesson;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct EngineConfig {
  #[serde(default)]
  pub tuning: EngineTuning,
  #[serde(default)]
  pub lessons: Vec<Lesson>,
}

/// Timing tunables. The end-of-segment tolerances are deliberately
/// configuration values, not hard-coded behavior.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineTuning {
  /// Auto-stop fires once the position is within this of the locked end.
  pub stop_epsilon_sec: f64,
  /// Toggling play this close to the segment end restarts at its start.
  pub restart_epsilon_sec: f64,
  /// Step for relative seeks.
  pub seek_step_sec: f64,
  /// Relative seeks clamp to `end - seek_guard`, never leaving the segment.
  pub seek_guard_sec: f64,
  /// Window after an explicit seek during which time-driven segment
  /// re-detection is suppressed.
  pub seek_suppression_ms: u64,
  /// Per-frame position poll cadence while playing.
  pub poll_interval_ms: u64,
  /// Study clock stops after this long with no learner input.
  pub idle_window_sec: u64,
  /// Study clock stops this long after a pause with no further input.
  pub pause_grace_sec: u64,
  /// Periodic progress/study-time flush cadence while running.
  pub flush_interval_sec: u64,
  /// Stored study time is capped here regardless of true session length.
  pub study_time_cap_sec: u64,
  /// Bound for outbound persistence/transcript requests.
  pub request_timeout_sec: u64,
}

impl Default for EngineTuning {
  fn default() -> Self {
    Self {
      stop_epsilon_sec: 0.02,
      restart_epsilon_sec: 0.05,
      seek_step_sec: 3.0,
      seek_guard_sec: 0.1,
      seek_suppression_ms: 1500,
      poll_interval_ms: 50,
      idle_window_sec: 180,
      pause_grace_sec: 60,
      flush_interval_sec: 60,
      study_time_cap_sec: 24 * 60 * 60,
      request_timeout_sec: 10,
    }
  }
}

/// Attempt to load `EngineConfig` from ENGINE_CONFIG_PATH. On any parsing/IO
/// error, returns None and the service falls back to defaults.
pub fn load_engine_config_from_env() -> Option<EngineConfig> {
  let path = std::env::var("ENGINE_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<EngineConfig>(&s) {
      Ok(cfg) => {
        info!(target: "diktat_backend", %path, lessons = cfg.lessons.len(), "Loaded engine config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "diktat_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "diktat_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
