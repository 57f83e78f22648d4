//! One active lesson session: the aggregate binding clock, transcript,
//! playback, completion, scoring, and progress sync.
//!
//! Commands are synchronous over local state and return (a) a caller-facing
//! outcome and (b) the sync actions to forward to the external stores.
//! Local state is always authoritative; sync actions are fire-and-forget.

use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use tracing::debug;

use crate::clock::{MediaClock, TimelineClock};
use crate::completion::{CheckOutcome, CompletionRestore, CompletionTracker, Verdict};
use crate::config::EngineTuning;
use crate::domain::{HideLevel, Lesson};
use crate::masking::{mask_sentence, MaskedToken};
use crate::playback::{PlaybackCoordinator, PlaybackState, SeekDirection, TickOutcome};
use crate::progress::{ProgressSnapshot, StudyClock, StudyFlush};
use crate::scoring::{ScoringStreakEngine, StreakState};
use crate::segment::SegmentIndex;

/// Work for the persistence boundary, produced by a command and dispatched
/// by the caller without blocking further interaction.
#[derive(Clone, Debug)]
pub enum SyncAction {
  UpsertProgress(ProgressSnapshot),
  ScoreDelta { points: f64, reason: &'static str },
  StreakActivity,
  StreakReset,
  StudyTime { seconds: u64 },
}

/// Caller-facing result of a word check.
#[derive(Clone, Debug)]
pub struct WordCheckResult {
  pub verdict: Verdict,
  pub resolved_word: Option<String>,
  pub sentence_completed: bool,
  pub points_delta: Option<f64>,
  pub total_points: f64,
  pub streak_notification: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct RevealAllResult {
  pub revealed: Vec<(usize, String)>,
  pub sentence_completed: bool,
  pub total_points: f64,
  pub streak_notification: Option<u32>,
}

/// Final summary reported at teardown.
#[derive(Clone, Debug)]
pub struct SessionSummary {
  pub completion_percent: u32,
  pub total_points: f64,
  pub study_seconds: u64,
}

pub struct DictationSession {
  pub id: String,
  pub learner: String,
  pub lesson_id: String,
  index: SegmentIndex,
  clock: Box<dyn MediaClock + Send>,
  coordinator: PlaybackCoordinator,
  tracker: CompletionTracker,
  scorer: ScoringStreakEngine,
  study: StudyClock,
  hide_level: HideLevel,
  /// Guard so at most one poll task runs per session.
  pub poll_running: bool,
}

impl DictationSession {
  pub fn new(
    id: String,
    learner: String,
    lesson: &Lesson,
    hide_level: HideLevel,
    restore: Option<CompletionRestore>,
    tuning: &EngineTuning,
  ) -> Self {
    let index = SegmentIndex::new(lesson.transcript.clone());
    let clock = Box::new(TimelineClock::new(lesson.duration()));
    Self::with_clock(id, learner, lesson.id.clone(), index, clock, hide_level, restore, tuning)
  }

  /// Test seam: sessions over any clock implementation.
  #[allow(clippy::too_many_arguments)]
  pub fn with_clock(
    id: String,
    learner: String,
    lesson_id: String,
    index: SegmentIndex,
    clock: Box<dyn MediaClock + Send>,
    hide_level: HideLevel,
    restore: Option<CompletionRestore>,
    tuning: &EngineTuning,
  ) -> Self {
    let tracker = match restore {
      Some(snapshot) => CompletionTracker::restore(snapshot),
      None => CompletionTracker::new(),
    };
    Self {
      id,
      learner,
      lesson_id,
      index,
      clock,
      coordinator: PlaybackCoordinator::new(tuning),
      tracker,
      scorer: ScoringStreakEngine::new(),
      study: StudyClock::new(
        Duration::from_secs(tuning.idle_window_sec),
        Duration::from_secs(tuning.pause_grace_sec),
        Duration::from_secs(tuning.flush_interval_sec),
        Duration::from_secs(tuning.study_time_cap_sec),
      ),
      hide_level,
      poll_running: false,
    }
  }

  fn today() -> NaiveDate {
    Local::now().date_naive()
  }

  fn snapshot(&self) -> ProgressSnapshot {
    ProgressSnapshot::capture(&self.tracker, &self.index, self.coordinator.current_index())
  }

  pub fn hide_level(&self) -> HideLevel {
    self.hide_level
  }

  /// Re-applied to masking on the next render; completion state untouched.
  pub fn set_hide_level(&mut self, level: HideLevel) {
    self.hide_level = level;
  }

  pub fn total_sentences(&self) -> usize {
    self.index.len()
  }

  pub fn playback_state(&self) -> PlaybackState {
    self.coordinator.state()
  }

  pub fn current_sentence(&self) -> usize {
    self.coordinator.current_index()
  }

  pub fn position(&self) -> f64 {
    self.clock.position()
  }

  pub fn auto_stop(&self) -> bool {
    self.coordinator.auto_stop()
  }

  pub fn streak(&self) -> &StreakState {
    self.scorer.streak()
  }

  pub fn completion_percent(&self) -> u32 {
    self.snapshot().completion_percent()
  }

  /// Whether the per-frame poll still has work: playback or a running study
  /// clock (whose idle/grace deadlines are evaluated in tick).
  pub fn needs_poll(&self) -> bool {
    self.coordinator.is_playing() || self.study.is_running()
  }

  /// Masked rendering of one sentence with the tracker's resolution map as
  /// override. Completed sentences come back fully revealed.
  pub fn render_sentence(&self, sentence: usize) -> Option<Vec<MaskedToken>> {
    let seg = self.index.get(sentence)?;
    let resolved = self.tracker.resolved_for(sentence);
    let pct = if self.tracker.is_sentence_complete(sentence) {
      0
    } else {
      self.hide_level.percent()
    };
    Some(mask_sentence(sentence, &seg.text, pct, &resolved))
  }

  fn score_resolution(&mut self, sentence: usize, word: usize, out: &CheckOutcome, actions: &mut Vec<SyncAction>) -> WordCheckResult {
    let today = Self::today();
    let mut result = WordCheckResult {
      verdict: out.verdict,
      resolved_word: out.resolved_word.clone(),
      sentence_completed: out.sentence_completed,
      points_delta: None,
      total_points: self.scorer.score().total_points,
      streak_notification: None,
    };

    match out.verdict {
      Verdict::Correct => {
        let upd = self.scorer.on_word_resolved(sentence, word, today);
        if let Some(delta) = upd.points_delta {
          result.points_delta = Some(delta);
          actions.push(SyncAction::ScoreDelta { points: delta, reason: "word_correct" });
        }
        result.total_points = upd.total_points;
        actions.push(SyncAction::UpsertProgress(self.snapshot()));
        if out.sentence_completed {
          let upd = self.scorer.on_sentence_completed(today);
          result.streak_notification = upd.streak_notification;
          if upd.streak_activity {
            actions.push(SyncAction::StreakActivity);
          }
        }
      }
      Verdict::IncorrectResolved => {
        let upd = self.scorer.on_word_incorrect(sentence, word, today);
        if let Some(delta) = upd.points_delta {
          result.points_delta = Some(delta);
          actions.push(SyncAction::ScoreDelta { points: delta, reason: "word_incorrect" });
        }
        result.total_points = upd.total_points;
        if upd.streak_reset {
          actions.push(SyncAction::StreakReset);
        }
      }
      Verdict::Pending => {}
    }
    result
  }

  /// Check typed input for one slot. None for unknown slots.
  pub fn check_word(&mut self, sentence: usize, word: usize, typed: &str) -> Option<(WordCheckResult, Vec<SyncAction>)> {
    self.study.note_input(Instant::now());
    let out = self.tracker.check_word(&self.index, sentence, word, typed)?;
    let mut actions = Vec::new();
    let result = self.score_resolution(sentence, word, &out, &mut actions);
    Some((result, actions))
  }

  /// Resolve one slot as hinted; counts as correct for completion/scoring.
  pub fn request_hint(&mut self, sentence: usize, word: usize) -> Option<(WordCheckResult, Vec<SyncAction>)> {
    self.study.note_input(Instant::now());
    let out = self.tracker.request_hint(&self.index, sentence, word)?;
    let mut actions = Vec::new();
    let result = self.score_resolution(sentence, word, &out, &mut actions);
    Some((result, actions))
  }

  /// Batch-resolve every open slot of a sentence as hinted.
  pub fn reveal_all(&mut self, sentence: usize) -> Option<(RevealAllResult, Vec<SyncAction>)> {
    self.study.note_input(Instant::now());
    let out = self.tracker.reveal_all(&self.index, sentence)?;
    let today = Self::today();
    let mut actions = Vec::new();

    for (word, _) in &out.revealed {
      let upd = self.scorer.on_word_resolved(sentence, *word, today);
      if let Some(delta) = upd.points_delta {
        actions.push(SyncAction::ScoreDelta { points: delta, reason: "word_revealed" });
      }
    }
    let mut streak_notification = None;
    if out.sentence_completed {
      let upd = self.scorer.on_sentence_completed(today);
      streak_notification = upd.streak_notification;
      if upd.streak_activity {
        actions.push(SyncAction::StreakActivity);
      }
    }
    actions.push(SyncAction::UpsertProgress(self.snapshot()));

    let result = RevealAllResult {
      revealed: out.revealed,
      sentence_completed: out.sentence_completed,
      total_points: self.scorer.score().total_points,
      streak_notification,
    };
    Some((result, actions))
  }

  // ---- playback commands ----

  pub fn play_sentence(&mut self, sentence: usize) {
    let now = Instant::now();
    self.study.note_input(now);
    self.coordinator.play_sentence(self.clock.as_mut(), &self.index, sentence, now);
    if self.coordinator.is_playing() {
      self.study.on_play(now);
    }
  }

  pub fn toggle_play_pause(&mut self) {
    let now = Instant::now();
    self.study.note_input(now);
    let was_playing = self.coordinator.is_playing();
    self.coordinator.toggle_play_pause(self.clock.as_mut(), &self.index, now);
    if self.coordinator.is_playing() {
      self.study.on_play(now);
    } else if was_playing {
      self.study.on_pause(now);
    }
  }

  pub fn seek_relative(&mut self, direction: SeekDirection) {
    let now = Instant::now();
    self.study.note_input(now);
    self.coordinator.seek_relative(self.clock.as_mut(), &self.index, direction, now);
  }

  pub fn go_to_next(&mut self) {
    let now = Instant::now();
    self.study.note_input(now);
    self.coordinator.go_to_next(self.clock.as_mut(), &self.index, now);
    if self.coordinator.is_playing() {
      self.study.on_play(now);
    }
  }

  pub fn go_to_previous(&mut self) {
    let now = Instant::now();
    self.study.note_input(now);
    self.coordinator.go_to_previous(self.clock.as_mut(), &self.index, now);
    if self.coordinator.is_playing() {
      self.study.on_play(now);
    }
  }

  pub fn set_auto_stop(&mut self, enabled: bool) {
    self.coordinator.set_auto_stop(enabled);
  }

  pub fn set_rate(&mut self, rate: f64) {
    self.coordinator.set_rate(self.clock.as_mut(), rate);
  }

  /// One poll iteration: playback auto-stop/re-detection plus the study
  /// clock's deadlines. Returns any sync actions due now.
  pub fn tick(&mut self) -> (TickOutcome, Vec<SyncAction>) {
    let now = Instant::now();
    let out = self.coordinator.tick(self.clock.as_mut(), &self.index, now);
    if out.auto_stopped {
      self.study.on_pause(now);
      debug!(target: "session", id = %self.id, segment = self.coordinator.current_index(), "auto-stop at segment end");
    }

    let mut actions = Vec::new();
    if let Some(flush) = self.study.tick(now) {
      actions.push(SyncAction::StudyTime { seconds: self.study.elapsed_secs(now) });
      if matches!(flush, StudyFlush::Periodic) {
        actions.push(SyncAction::UpsertProgress(self.snapshot()));
      }
    }
    (out, actions)
  }

  /// Teardown: cancel playback, stop the study clock, and emit the final
  /// synchronous flush before the state is discarded.
  pub fn finish(&mut self) -> (SessionSummary, Vec<SyncAction>) {
    let now = Instant::now();
    // Leaves needs_poll() false so the poll task exits on its next tick.
    self.coordinator.stop(self.clock.as_mut());
    let study_seconds = self.study.finish(now);
    let snapshot = self.snapshot();
    let summary = SessionSummary {
      completion_percent: snapshot.completion_percent(),
      total_points: self.scorer.score().total_points,
      study_seconds,
    };
    let actions = vec![
      SyncAction::UpsertProgress(snapshot),
      SyncAction::StudyTime { seconds: study_seconds },
    ];
    (summary, actions)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use crate::domain::Segment;

  fn session_over(segments: Vec<(f64, f64, &str)>) -> DictationSession {
    let transcript: Vec<Segment> = segments
      .into_iter()
      .map(|(start, end, text)| Segment { index: 0, start_sec: start, end_sec: end, text: text.into() })
      .collect();
    let dur = transcript.last().map(|s| s.end_sec);
    DictationSession::with_clock(
      "s1".into(),
      "learner-1".into(),
      "lesson-1".into(),
      SegmentIndex::new(transcript),
      Box::new(ManualClock::new(dur)),
      HideLevel::Hard,
      None,
      &EngineTuning::default(),
    )
  }

  fn has_score_delta(actions: &[SyncAction], points: f64) -> bool {
    actions.iter().any(|a| matches!(a, SyncAction::ScoreDelta { points: p, .. } if (*p - points).abs() < 1e-9))
  }

  #[test]
  fn typing_a_full_sentence_awards_two_points() {
    // Scenario: "Hallo Welt" at full hide level, typed correctly.
    let mut s = session_over(vec![(0.0, 2.0, "Hallo Welt")]);

    let (r, actions) = s.check_word(0, 0, "Hallo").unwrap();
    assert_eq!(r.verdict, Verdict::Correct);
    assert!(!r.sentence_completed);
    assert!(has_score_delta(&actions, 1.0));

    let (r, actions) = s.check_word(0, 1, "Welt").unwrap();
    assert!(r.sentence_completed);
    assert_eq!(r.total_points, 2.0);
    assert!(actions.iter().any(|a| matches!(a, SyncAction::StreakActivity)));
    assert_eq!(s.completion_percent(), 100);
  }

  #[test]
  fn partial_input_never_penalizes_but_full_length_does_once() {
    let mut s = session_over(vec![(0.0, 2.0, "Hallo Welt")]);

    // 3 chars against "Welt" (4): pending, no penalty.
    let (r, actions) = s.check_word(0, 1, "Xel").unwrap();
    assert_eq!(r.verdict, Verdict::Pending);
    assert!(actions.is_empty());

    // Full-length wrong value: exactly one -0.5 with a streak reset.
    let (r, actions) = s.check_word(0, 1, "Xelx").unwrap();
    assert_eq!(r.verdict, Verdict::IncorrectResolved);
    assert!(has_score_delta(&actions, -0.5));
    assert!(actions.iter().any(|a| matches!(a, SyncAction::StreakReset)));

    // Repeating the mistake is absorbed by the processed guard.
    let (r, actions) = s.check_word(0, 1, "Xaaa").unwrap();
    assert_eq!(r.verdict, Verdict::IncorrectResolved);
    assert!(r.points_delta.is_none());
    assert!(!actions.iter().any(|a| matches!(a, SyncAction::StreakReset)));
  }

  #[test]
  fn streak_display_grows_from_the_second_sentence() {
    let mut s = session_over(vec![
      (0.0, 1.0, "Eins"),
      (1.0, 2.0, "Zwei"),
      (2.0, 3.0, "Drei"),
    ]);

    let (r, _) = s.check_word(0, 0, "Eins").unwrap();
    assert!(r.sentence_completed);
    assert_eq!(r.streak_notification, None);

    let (r, _) = s.check_word(1, 0, "Zwei").unwrap();
    assert_eq!(r.streak_notification, Some(1));

    let (r, _) = s.check_word(2, 0, "Drei").unwrap();
    assert_eq!(r.streak_notification, Some(2));
  }

  #[test]
  fn mistake_between_completions_voids_the_streak() {
    let mut s = session_over(vec![
      (0.0, 1.0, "Eins"),
      (1.0, 2.0, "Zwei"),
      (2.0, 3.0, "Drei und vier"),
    ]);
    s.check_word(0, 0, "Eins").unwrap();
    s.check_word(1, 0, "Zwei").unwrap();
    assert_eq!(s.streak().consecutive_sentence_count, 2);

    // Full-length wrong attempt in sentence 2.
    s.check_word(2, 0, "Xxxx").unwrap();
    assert_eq!(s.streak().consecutive_sentence_count, 0);

    // Completing it afterwards is a fresh run: no notification.
    let (_, _) = s.request_hint(2, 0).unwrap();
    let (_, _) = s.check_word(2, 1, "und").unwrap();
    let (r, _) = s.check_word(2, 2, "vier").unwrap();
    assert!(r.sentence_completed);
    assert_eq!(r.streak_notification, None);
  }

  #[test]
  fn hint_scores_like_typing_but_only_once() {
    let mut s = session_over(vec![(0.0, 2.0, "Hallo Welt")]);
    let (r, actions) = s.request_hint(0, 0).unwrap();
    assert_eq!(r.resolved_word.as_deref(), Some("Hallo"));
    assert!(has_score_delta(&actions, 1.0));

    // Typing the same word afterwards re-resolves without re-scoring.
    let (r, actions) = s.check_word(0, 0, "Hallo").unwrap();
    assert_eq!(r.verdict, Verdict::Correct);
    assert!(r.points_delta.is_none());
    assert!(!has_score_delta(&actions, 1.0));
  }

  #[test]
  fn reveal_all_completes_with_one_activity_post() {
    let mut s = session_over(vec![(0.0, 2.0, "Die Straßen sind leer.")]);
    s.check_word(0, 0, "Die").unwrap();
    let (r, actions) = s.reveal_all(0).unwrap();
    assert_eq!(r.revealed.len(), 3);
    assert!(r.sentence_completed);
    assert_eq!(r.total_points, 4.0);
    let activity = actions.iter().filter(|a| matches!(a, SyncAction::StreakActivity)).count();
    assert_eq!(activity, 1);
  }

  #[test]
  fn rendering_respects_completion_and_hide_level() {
    let mut s = session_over(vec![(0.0, 2.0, "Hallo Welt")]);
    let tokens = s.render_sentence(0).unwrap();
    assert!(tokens.iter().all(|t| t.hidden));

    s.check_word(0, 0, "Hallo").unwrap();
    let tokens = s.render_sentence(0).unwrap();
    assert!(!tokens[0].hidden);
    assert!(tokens[1].hidden);

    s.check_word(0, 1, "Welt").unwrap();
    let tokens = s.render_sentence(0).unwrap();
    assert!(tokens.iter().all(|t| !t.hidden));

    assert!(s.render_sentence(9).is_none());
  }

  #[test]
  fn playback_commands_drive_the_virtual_surface() {
    let mut s = session_over(vec![(0.0, 2.0, "Hallo Welt"), (2.0, 5.0, "Bis bald")]);
    s.play_sentence(1);
    assert!(matches!(s.playback_state(), PlaybackState::Playing { segment: 1 }));
    assert!(s.needs_poll());
    assert_eq!(s.position(), 2.0);

    s.toggle_play_pause();
    assert!(matches!(s.playback_state(), PlaybackState::Paused { segment: 1 }));

    let (summary, actions) = s.finish();
    assert_eq!(summary.completion_percent, 0);
    assert_eq!(actions.len(), 2);
  }

  #[test]
  fn restored_progress_preseeds_the_session() {
    let mut restore = CompletionRestore::default();
    restore.completed_sentences.push(0);
    restore
      .completed_words
      .entry(0)
      .or_default()
      .extend([(0, "Hallo".into()), (1, "Welt".into())]);

    let transcript = vec![
      Segment { index: 0, start_sec: 0.0, end_sec: 2.0, text: "Hallo Welt".into() },
      Segment { index: 0, start_sec: 2.0, end_sec: 4.0, text: "Bis bald".into() },
    ];
    let s = DictationSession::with_clock(
      "s1".into(),
      "learner-1".into(),
      "lesson-1".into(),
      SegmentIndex::new(transcript),
      Box::new(ManualClock::new(Some(4.0))),
      HideLevel::Hard,
      Some(restore),
      &EngineTuning::default(),
    );
    assert_eq!(s.completion_percent(), 50);
    let tokens = s.render_sentence(0).unwrap();
    assert!(tokens.iter().all(|t| !t.hidden));
  }
}
