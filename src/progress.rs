//! Serializing engine state for the persistence boundary, and the
//! study-duration clock.
//!
//! Snapshots are full-state: every mutation re-sends the complete current
//! picture, so a failed write self-heals on the next successful one and no
//! retry queue is needed.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::completion::CompletionTracker;
use crate::segment::SegmentIndex;

/// The upserted progress payload, keyed externally by (learner, lesson, mode).
#[derive(Clone, Debug, Serialize)]
pub struct ProgressSnapshot {
  pub completed_sentences: Vec<usize>,
  pub completed_words: BTreeMap<usize, BTreeMap<usize, String>>,
  pub current_sentence_index: usize,
  pub total_sentences: usize,
  pub correct_words_count: usize,
  pub total_words: usize,
}

impl ProgressSnapshot {
  pub fn capture(
    tracker: &CompletionTracker,
    index: &SegmentIndex,
    current_sentence_index: usize,
  ) -> Self {
    Self {
      completed_sentences: tracker.completed_sentences().iter().copied().collect(),
      completed_words: tracker.word_completion().clone(),
      current_sentence_index,
      total_sentences: index.len(),
      correct_words_count: tracker.correct_words_count(),
      total_words: index.total_maskable_words(),
    }
  }

  /// Derived at persistence time; the backing store computes the same value.
  pub fn completion_percent(&self) -> u32 {
    if self.total_words == 0 {
      return 0;
    }
    ((self.correct_words_count as f64 / self.total_words as f64) * 100.0).round() as u32
  }
}

/// Why the study clock wants a flush right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StudyFlush {
  /// Stopped after the idle window with no learner input.
  Idle,
  /// Stopped after the grace window following a pause.
  PauseGrace,
  /// Periodic flush while running.
  Periodic,
}

/// Accumulates elapsed running time starting at first play. Stops (and asks
/// for an immediate flush) after a fixed idle window with no learner input,
/// or a grace window following a pause, whichever triggers first. Each
/// deadline is replaced on every new triggering event, so at most one is in
/// flight at a time.
#[derive(Debug)]
pub struct StudyClock {
  accumulated: Duration,
  running_since: Option<Instant>,
  last_input: Option<Instant>,
  paused_at: Option<Instant>,
  last_flush: Option<Instant>,
  idle_window: Duration,
  pause_grace: Duration,
  flush_interval: Duration,
  cap: Duration,
}

impl StudyClock {
  pub fn new(idle_window: Duration, pause_grace: Duration, flush_interval: Duration, cap: Duration) -> Self {
    Self {
      accumulated: Duration::ZERO,
      running_since: None,
      last_input: None,
      paused_at: None,
      last_flush: None,
      idle_window,
      pause_grace,
      flush_interval,
      cap,
    }
  }

  pub fn is_running(&self) -> bool {
    self.running_since.is_some()
  }

  /// Elapsed seconds, capped at the configured maximum.
  pub fn elapsed_secs(&self, now: Instant) -> u64 {
    let running = self
      .running_since
      .map(|since| now.duration_since(since))
      .unwrap_or(Duration::ZERO);
    (self.accumulated + running).min(self.cap).as_secs()
  }

  /// First play starts the clock; later plays just clear the pause grace.
  pub fn on_play(&mut self, now: Instant) {
    self.paused_at = None;
    self.last_input = Some(now);
    if self.running_since.is_none() {
      self.running_since = Some(now);
      self.last_flush.get_or_insert(now);
    }
  }

  /// A pause arms the grace window without stopping accumulation yet.
  pub fn on_pause(&mut self, now: Instant) {
    if self.running_since.is_some() {
      self.paused_at = Some(now);
    }
  }

  /// Any learner input refreshes the idle deadline and disarms the grace
  /// window while still playing.
  pub fn note_input(&mut self, now: Instant) {
    self.last_input = Some(now);
  }

  fn stop(&mut self, now: Instant) {
    if let Some(since) = self.running_since.take() {
      self.accumulated = (self.accumulated + now.duration_since(since)).min(self.cap);
    }
    self.paused_at = None;
  }

  /// Evaluate the deadlines. Returns the flush the caller should perform, if
  /// any. Cheap: comparisons only.
  pub fn tick(&mut self, now: Instant) -> Option<StudyFlush> {
    if self.running_since.is_none() {
      return None;
    }
    if let Some(paused) = self.paused_at {
      if now.duration_since(paused) >= self.pause_grace {
        self.stop(now);
        self.last_flush = Some(now);
        return Some(StudyFlush::PauseGrace);
      }
    }
    if let Some(input) = self.last_input {
      if now.duration_since(input) >= self.idle_window {
        self.stop(now);
        self.last_flush = Some(now);
        return Some(StudyFlush::Idle);
      }
    }
    if let Some(flushed) = self.last_flush {
      if now.duration_since(flushed) >= self.flush_interval {
        self.last_flush = Some(now);
        return Some(StudyFlush::Periodic);
      }
    }
    None
  }

  /// Session teardown: stop accumulating and report the final value.
  pub fn finish(&mut self, now: Instant) -> u64 {
    self.stop(now);
    self.accumulated.min(self.cap).as_secs()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Segment;

  fn clock(idle: u64, grace: u64, flush: u64, cap: u64) -> StudyClock {
    StudyClock::new(
      Duration::from_secs(idle),
      Duration::from_secs(grace),
      Duration::from_secs(flush),
      Duration::from_secs(cap),
    )
  }

  #[test]
  fn snapshot_derives_completion_percent() {
    let index = SegmentIndex::new(vec![
      Segment { index: 0, start_sec: 0.0, end_sec: 2.0, text: "Hallo Welt".into() },
      Segment { index: 1, start_sec: 2.0, end_sec: 4.0, text: "Bis bald".into() },
    ]);
    let mut tracker = CompletionTracker::new();
    tracker.check_word(&index, 0, 0, "Hallo").unwrap();
    let snap = ProgressSnapshot::capture(&tracker, &index, 0);
    assert_eq!(snap.total_words, 4);
    assert_eq!(snap.correct_words_count, 1);
    assert_eq!(snap.completion_percent(), 25);
  }

  #[test]
  fn empty_lesson_has_zero_percent() {
    let index = SegmentIndex::new(vec![]);
    let tracker = CompletionTracker::new();
    let snap = ProgressSnapshot::capture(&tracker, &index, 0);
    assert_eq!(snap.completion_percent(), 0);
  }

  #[test]
  fn idle_window_stops_and_flushes() {
    let mut c = clock(10, 5, 60, 3600);
    let t0 = Instant::now();
    c.on_play(t0);
    assert_eq!(c.tick(t0 + Duration::from_secs(9)), None);
    assert_eq!(c.tick(t0 + Duration::from_secs(10)), Some(StudyFlush::Idle));
    assert!(!c.is_running());
    assert_eq!(c.elapsed_secs(t0 + Duration::from_secs(30)), 10);
  }

  #[test]
  fn input_refreshes_the_idle_deadline() {
    let mut c = clock(10, 5, 60, 3600);
    let t0 = Instant::now();
    c.on_play(t0);
    c.note_input(t0 + Duration::from_secs(8));
    assert_eq!(c.tick(t0 + Duration::from_secs(12)), None);
    assert!(c.is_running());
  }

  #[test]
  fn pause_grace_beats_the_idle_window() {
    let mut c = clock(60, 5, 120, 3600);
    let t0 = Instant::now();
    c.on_play(t0);
    c.on_pause(t0 + Duration::from_secs(2));
    assert_eq!(c.tick(t0 + Duration::from_secs(7)), Some(StudyFlush::PauseGrace));
    assert!(!c.is_running());
  }

  #[test]
  fn resume_disarms_the_grace_window() {
    let mut c = clock(60, 5, 120, 3600);
    let t0 = Instant::now();
    c.on_play(t0);
    c.on_pause(t0 + Duration::from_secs(2));
    c.on_play(t0 + Duration::from_secs(4));
    assert_eq!(c.tick(t0 + Duration::from_secs(10)), None);
    assert!(c.is_running());
  }

  #[test]
  fn periodic_flush_while_running() {
    let mut c = clock(600, 60, 30, 3600);
    let t0 = Instant::now();
    c.on_play(t0);
    c.note_input(t0 + Duration::from_secs(29));
    assert_eq!(c.tick(t0 + Duration::from_secs(30)), Some(StudyFlush::Periodic));
    // Deadline replaced: the next periodic flush is another interval away.
    assert_eq!(c.tick(t0 + Duration::from_secs(31)), None);
  }

  #[test]
  fn stored_time_never_exceeds_the_cap() {
    let mut c = clock(100_000, 60, 30, 60);
    let t0 = Instant::now();
    c.on_play(t0);
    assert_eq!(c.elapsed_secs(t0 + Duration::from_secs(3600)), 60);
    assert_eq!(c.finish(t0 + Duration::from_secs(7200)), 60);
  }
}
