//! Points and consecutive-completion streaks derived from completion events.
//!
//! Every point mutation is guarded by the per-word processed map, so a slot
//! can affect the score exactly once no matter how many resolution attempts
//! the learner makes. A single incorrect resolution invalidates the
//! in-progress streak regardless of how much of the sentence was already
//! correct.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

pub const POINTS_CORRECT: f64 = 1.0;
pub const POINTS_INCORRECT: f64 = -0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessedAs {
  Correct,
  Incorrect,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ScoreState {
  pub total_points: f64,
  pub monthly_points: f64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct StreakState {
  pub consecutive_sentence_count: u32,
  pub current_streak: u32,
  pub max_streak: u32,
  pub max_streak_this_month: u32,
  pub last_activity_date: Option<NaiveDate>,
  pub last_monthly_reset: Option<NaiveDate>,
}

/// Side products of one scoring update, for the caller to surface and to
/// forward to the external stores.
#[derive(Clone, Debug, Default)]
pub struct ScoreUpdate {
  /// Applied delta; None when the guard absorbed a duplicate.
  pub points_delta: Option<f64>,
  pub total_points: f64,
  /// The external streak store must be reset.
  pub streak_reset: bool,
  /// Activity to post to the external streak store.
  pub streak_activity: bool,
  /// Streak notification with its displayed value (count - 1).
  pub streak_notification: Option<u32>,
}

#[derive(Debug, Default)]
pub struct ScoringStreakEngine {
  score: ScoreState,
  streak: StreakState,
  per_word_processed: BTreeMap<usize, BTreeMap<usize, ProcessedAs>>,
}

impl ScoringStreakEngine {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn score(&self) -> &ScoreState {
    &self.score
  }

  pub fn streak(&self) -> &StreakState {
    &self.streak
  }

  /// Zero the monthly accumulators the first time an update happens in a new
  /// month/year. All-time totals are unaffected.
  fn maybe_monthly_reset(&mut self, today: NaiveDate) {
    let due = match self.streak.last_monthly_reset {
      None => true,
      Some(last) => last.month() != today.month() || last.year() != today.year(),
    };
    if due {
      self.score.monthly_points = 0.0;
      self.streak.max_streak_this_month = 0;
      self.streak.last_monthly_reset = Some(today);
    }
  }

  fn apply_points(&mut self, delta: f64) {
    // Totals are floored at zero on deductions.
    self.score.total_points = (self.score.total_points + delta).max(0.0);
    self.score.monthly_points = (self.score.monthly_points + delta).max(0.0);
  }

  fn already_processed(&self, sentence: usize, word: usize) -> bool {
    self
      .per_word_processed
      .get(&sentence)
      .map_or(false, |m| m.contains_key(&word))
  }

  fn mark(&mut self, sentence: usize, word: usize, kind: ProcessedAs) {
    self.per_word_processed.entry(sentence).or_default().insert(word, kind);
  }

  /// First-time correct or hinted resolution: +1 point.
  pub fn on_word_resolved(&mut self, sentence: usize, word: usize, today: NaiveDate) -> ScoreUpdate {
    if self.already_processed(sentence, word) {
      return ScoreUpdate { total_points: self.score.total_points, ..Default::default() };
    }
    self.maybe_monthly_reset(today);
    self.mark(sentence, word, ProcessedAs::Correct);
    self.apply_points(POINTS_CORRECT);
    ScoreUpdate {
      points_delta: Some(POINTS_CORRECT),
      total_points: self.score.total_points,
      ..Default::default()
    }
  }

  /// First-time incorrect resolution: -0.5 points and the streak dies.
  pub fn on_word_incorrect(&mut self, sentence: usize, word: usize, today: NaiveDate) -> ScoreUpdate {
    if self.already_processed(sentence, word) {
      return ScoreUpdate { total_points: self.score.total_points, ..Default::default() };
    }
    self.maybe_monthly_reset(today);
    self.mark(sentence, word, ProcessedAs::Incorrect);
    self.apply_points(POINTS_INCORRECT);
    self.streak.consecutive_sentence_count = 0;
    ScoreUpdate {
      points_delta: Some(POINTS_INCORRECT),
      total_points: self.score.total_points,
      streak_reset: true,
      ..Default::default()
    }
  }

  /// A sentence transitioned into completion. The first completion of a run
  /// only marks activity; from the second on, the streak itself grows and a
  /// notification is surfaced with displayed value `count - 1`.
  pub fn on_sentence_completed(&mut self, today: NaiveDate) -> ScoreUpdate {
    self.maybe_monthly_reset(today);
    self.streak.consecutive_sentence_count += 1;
    self.streak.last_activity_date = Some(today);

    let count = self.streak.consecutive_sentence_count;
    let mut update = ScoreUpdate {
      total_points: self.score.total_points,
      streak_activity: true,
      ..Default::default()
    };
    if count >= 2 {
      self.streak.current_streak += 1;
      if self.streak.current_streak > self.streak.max_streak {
        self.streak.max_streak = self.streak.current_streak;
      }
      if self.streak.current_streak > self.streak.max_streak_this_month {
        self.streak.max_streak_this_month = self.streak.current_streak;
      }
      update.streak_notification = Some(count - 1);
    }
    update
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn points_are_awarded_once_per_slot() {
    let mut s = ScoringStreakEngine::new();
    let t = day(2026, 8, 23);
    assert_eq!(s.on_word_resolved(0, 0, t).points_delta, Some(1.0));
    assert_eq!(s.on_word_resolved(0, 0, t).points_delta, None);
    assert_eq!(s.score().total_points, 1.0);
  }

  #[test]
  fn one_penalty_per_slot_and_floor_at_zero() {
    let mut s = ScoringStreakEngine::new();
    let t = day(2026, 8, 23);
    let upd = s.on_word_incorrect(0, 1, t);
    assert_eq!(upd.points_delta, Some(-0.5));
    assert!(upd.streak_reset);
    assert_eq!(s.score().total_points, 0.0);
    // Further wrong attempts on the same slot are absorbed.
    let upd = s.on_word_incorrect(0, 1, t);
    assert_eq!(upd.points_delta, None);
    assert!(!upd.streak_reset);
  }

  #[test]
  fn incorrect_after_correct_is_absorbed_too() {
    let mut s = ScoringStreakEngine::new();
    let t = day(2026, 8, 23);
    s.on_word_resolved(0, 0, t);
    let upd = s.on_word_incorrect(0, 0, t);
    assert_eq!(upd.points_delta, None);
    assert_eq!(s.score().total_points, 1.0);
  }

  #[test]
  fn streak_shows_from_the_second_completion() {
    let mut s = ScoringStreakEngine::new();
    let t = day(2026, 8, 23);
    let first = s.on_sentence_completed(t);
    assert!(first.streak_activity);
    assert_eq!(first.streak_notification, None);
    let second = s.on_sentence_completed(t);
    assert_eq!(second.streak_notification, Some(1));
    let third = s.on_sentence_completed(t);
    assert_eq!(third.streak_notification, Some(2));
    assert_eq!(s.streak().current_streak, 2);
  }

  #[test]
  fn a_mistake_kills_the_run() {
    let mut s = ScoringStreakEngine::new();
    let t = day(2026, 8, 23);
    s.on_sentence_completed(t);
    s.on_sentence_completed(t);
    s.on_word_incorrect(2, 0, t);
    assert_eq!(s.streak().consecutive_sentence_count, 0);
    // The next completion starts a fresh run: activity only, no increment.
    let upd = s.on_sentence_completed(t);
    assert_eq!(upd.streak_notification, None);
  }

  #[test]
  fn monthly_reset_zeroes_monthly_accumulators_only() {
    let mut s = ScoringStreakEngine::new();
    s.on_word_resolved(0, 0, day(2026, 7, 31));
    s.on_sentence_completed(day(2026, 7, 31));
    s.on_sentence_completed(day(2026, 7, 31));
    assert_eq!(s.score().monthly_points, 1.0);
    assert_eq!(s.streak().max_streak_this_month, 1);

    // First update of August resets the monthly view, not the totals.
    s.on_word_resolved(1, 0, day(2026, 8, 1));
    assert_eq!(s.score().monthly_points, 1.0);
    assert_eq!(s.score().total_points, 2.0);
    assert_eq!(s.streak().max_streak_this_month, 0);
    assert_eq!(s.streak().max_streak, 1);
  }
}
