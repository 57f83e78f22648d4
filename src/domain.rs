//! Domain models: lessons, time-coded segments, word slots, and hide levels.

use serde::{Deserialize, Serialize};

use crate::util::{punctuation_of, pure_word};

/// One time-coded transcript entry: a single sentence of the lesson.
/// Transcripts are expected sorted ascending by `start_sec` and non-overlapping;
/// the engine does not validate this (see `SegmentIndex` for the tie-break rule).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Segment {
  #[serde(default)]
  pub index: usize,
  #[serde(rename = "start")]
  pub start_sec: f64,
  #[serde(rename = "end")]
  pub end_sec: f64,
  pub text: String,
}

/// One whitespace-delimited token of a sentence, split into its alphanumeric
/// core and surrounding punctuation. Maskable iff the core is non-empty.
#[derive(Clone, Debug)]
pub struct WordSlot {
  pub sentence_index: usize,
  pub word_index: usize,
  pub surface_form: String,
  pub pure_word: String,
  pub punctuation: String,
  pub maskable: bool,
}

/// Tokenize a sentence into word slots. `word_index` counts every token,
/// maskable or not, so slot identity stays stable across render passes.
pub fn word_slots(sentence_index: usize, text: &str) -> Vec<WordSlot> {
  text
    .split_whitespace()
    .enumerate()
    .map(|(word_index, token)| {
      let pure = pure_word(token);
      WordSlot {
        sentence_index,
        word_index,
        surface_form: token.to_string(),
        punctuation: punctuation_of(token),
        maskable: !pure.is_empty(),
        pure_word: pure,
      }
    })
    .collect()
}

/// Configured fraction of maskable words rendered as blank input slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HideLevel {
  Easy,
  Medium,
  Hard,
}

impl HideLevel {
  pub fn percent(self) -> u8 {
    match self {
      HideLevel::Easy => 30,
      HideLevel::Medium => 60,
      HideLevel::Hard => 100,
    }
  }
}

impl Default for HideLevel {
  fn default() -> Self { HideLevel::Hard }
}

/// A lesson as served to sessions: metadata plus its transcript.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lesson {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub audio_url: String,
  /// Total timeline length in seconds. When absent, the last segment's end
  /// is used.
  #[serde(default)]
  pub duration_sec: Option<f64>,
  #[serde(default)]
  pub transcript: Vec<Segment>,
  /// Remote transcript to fetch at session start when `transcript` is empty.
  #[serde(default)]
  pub transcript_url: Option<String>,
}

impl Lesson {
  pub fn duration(&self) -> Option<f64> {
    self
      .duration_sec
      .or_else(|| self.transcript.last().map(|s| s.end_sec))
  }
}
