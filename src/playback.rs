//! Segment-bounded playback: the state machine binding a media clock to the
//! transcript.
//!
//! Two modes of one coordinator: with auto-stop enabled, playback pauses at
//! the locked segment end; with it disabled, crossing a boundary re-locks to
//! the newly entered segment for uninterrupted multi-sentence playback.
//! All commands defer (no-op) while the clock has no finite duration.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::clock::MediaClock;
use crate::config::EngineTuning;
use crate::segment::SegmentIndex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
  Idle,
  Playing { segment: usize },
  Paused { segment: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekDirection {
  Backward,
  Forward,
}

/// What a per-tick poll observed and did.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickOutcome {
  pub auto_stopped: bool,
  /// Set when time-driven detection (or a boundary re-lock) moved the
  /// active segment.
  pub segment_changed: Option<usize>,
}

pub struct PlaybackCoordinator {
  state: PlaybackState,
  current_index: usize,
  end_lock: Option<f64>,
  paused_positions: BTreeMap<usize, f64>,
  auto_stop: bool,
  /// Time-driven segment re-detection is suppressed until this deadline;
  /// replaced on every explicit navigation or seek.
  suppress_until: Option<Instant>,
  stop_epsilon: f64,
  restart_epsilon: f64,
  seek_step: f64,
  seek_guard: f64,
  suppression: Duration,
}

impl PlaybackCoordinator {
  pub fn new(tuning: &EngineTuning) -> Self {
    Self {
      state: PlaybackState::Idle,
      current_index: 0,
      end_lock: None,
      paused_positions: BTreeMap::new(),
      auto_stop: true,
      suppress_until: None,
      stop_epsilon: tuning.stop_epsilon_sec,
      restart_epsilon: tuning.restart_epsilon_sec,
      seek_step: tuning.seek_step_sec,
      seek_guard: tuning.seek_guard_sec,
      suppression: Duration::from_millis(tuning.seek_suppression_ms),
    }
  }

  pub fn state(&self) -> PlaybackState {
    self.state
  }

  pub fn current_index(&self) -> usize {
    self.current_index
  }

  pub fn auto_stop(&self) -> bool {
    self.auto_stop
  }

  pub fn set_auto_stop(&mut self, enabled: bool) {
    self.auto_stop = enabled;
  }

  pub fn is_playing(&self) -> bool {
    matches!(self.state, PlaybackState::Playing { .. })
  }

  fn suppress_detection(&mut self, now: Instant) {
    self.suppress_until = Some(now + self.suppression);
  }

  /// Start (or resume) segment `i`. A recorded paused position inside
  /// `[start, end - restart_epsilon)` resumes from there; anything else
  /// starts at the segment head. Sets the end lock and plays.
  pub fn play_sentence(&mut self, clock: &mut dyn MediaClock, index: &SegmentIndex, i: usize, now: Instant) {
    if clock.duration().is_none() {
      return;
    }
    let Some(seg) = index.get(i) else { return };

    let resume = self
      .paused_positions
      .get(&i)
      .copied()
      .filter(|p| *p >= seg.start_sec && *p < seg.end_sec - self.restart_epsilon);
    let target = resume.unwrap_or(seg.start_sec);

    clock.seek(target);
    clock.play();
    self.end_lock = Some(seg.end_sec);
    self.current_index = i;
    self.state = PlaybackState::Playing { segment: i };
    self.suppress_detection(now);
  }

  /// Pause when playing (recording the position for resume); otherwise play
  /// the current segment per the resume rule.
  pub fn toggle_play_pause(&mut self, clock: &mut dyn MediaClock, index: &SegmentIndex, now: Instant) {
    if clock.duration().is_none() {
      return;
    }
    if self.is_playing() {
      self.paused_positions.insert(self.current_index, clock.position());
      clock.pause();
      self.end_lock = None;
      self.state = PlaybackState::Paused { segment: self.current_index };
    } else {
      self.play_sentence(clock, index, self.current_index, now);
    }
  }

  /// Relative seek clamped into the current segment; practicing one sentence
  /// never leaks into its neighbors.
  pub fn seek_relative(&mut self, clock: &mut dyn MediaClock, index: &SegmentIndex, direction: SeekDirection, now: Instant) {
    if clock.duration().is_none() {
      return;
    }
    let Some(seg) = index.get(self.current_index) else { return };

    let mut target = match direction {
      SeekDirection::Backward => clock.position() - self.seek_step,
      SeekDirection::Forward => clock.position() + self.seek_step,
    };
    // Max last: on a segment shorter than the guard, land at its start.
    target = target.min(seg.end_sec - self.seek_guard).max(seg.start_sec);
    clock.seek(target);
    if self.is_playing() {
      self.end_lock = Some(seg.end_sec);
    } else {
      // A seek while paused moves the resume point with it.
      self.paused_positions.insert(self.current_index, target);
    }
    self.suppress_detection(now);
  }

  /// Hard stop: pause, clear the end lock, and return to Idle.
  pub fn stop(&mut self, clock: &mut dyn MediaClock) {
    clock.pause();
    self.end_lock = None;
    self.state = PlaybackState::Idle;
  }

  /// Navigation: hard-stop whatever is playing and play the adjacent segment
  /// from its head (navigation does not resume paused positions).
  pub fn go_to_next(&mut self, clock: &mut dyn MediaClock, index: &SegmentIndex, now: Instant) {
    if let Some(next) = index.next(self.current_index) {
      self.stop(clock);
      self.paused_positions.remove(&next);
      self.play_sentence(clock, index, next, now);
    }
  }

  pub fn go_to_previous(&mut self, clock: &mut dyn MediaClock, index: &SegmentIndex, now: Instant) {
    if let Some(prev) = index.previous(self.current_index) {
      self.stop(clock);
      self.paused_positions.remove(&prev);
      self.play_sentence(clock, index, prev, now);
    }
  }

  pub fn set_rate(&mut self, clock: &mut dyn MediaClock, rate: f64) {
    clock.set_rate(rate);
  }

  /// Per-frame check while playing. The auto-stop comparison against the
  /// locked end runs first: a poll tick can land past the boundary (poll
  /// cadence is far coarser than the stop epsilon), and that overshoot must
  /// pause, not re-lock onto the next segment. Only then, time-driven segment
  /// re-detection (unless a just-issued seek suppressed it), which re-locks
  /// the end when continuous playback crosses a boundary.
  pub fn tick(&mut self, clock: &mut dyn MediaClock, index: &SegmentIndex, now: Instant) -> TickOutcome {
    let mut out = TickOutcome::default();
    if !self.is_playing() || clock.duration().is_none() {
      return out;
    }
    let pos = clock.position();

    if self.auto_stop {
      if let Some(end) = self.end_lock {
        if pos >= end - self.stop_epsilon {
          self.paused_positions.insert(self.current_index, pos);
          clock.pause();
          self.end_lock = None;
          self.state = PlaybackState::Paused { segment: self.current_index };
          out.auto_stopped = true;
          return out;
        }
      }
    }

    let suppressed = self.suppress_until.map_or(false, |until| now < until);
    if !suppressed {
      if let Some(active) = index.find_active(pos) {
        if active != self.current_index {
          self.current_index = active;
          self.state = PlaybackState::Playing { segment: active };
          self.end_lock = index.get(active).map(|s| s.end_sec);
          out.segment_changed = Some(active);
        }
      }
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use crate::domain::Segment;

  fn index() -> SegmentIndex {
    SegmentIndex::new(vec![
      Segment { index: 0, start_sec: 0.0, end_sec: 2.0, text: "Hallo Welt".into() },
      Segment { index: 1, start_sec: 2.0, end_sec: 5.0, text: "Wie geht es dir?".into() },
      Segment { index: 2, start_sec: 5.0, end_sec: 8.0, text: "Bis bald!".into() },
    ])
  }

  fn coordinator() -> PlaybackCoordinator {
    let mut tuning = EngineTuning::default();
    tuning.seek_suppression_ms = 0;
    PlaybackCoordinator::new(&tuning)
  }

  #[test]
  fn commands_defer_without_duration() {
    let idx = index();
    let mut clock = ManualClock::new(None);
    let mut c = coordinator();
    let now = Instant::now();
    c.play_sentence(&mut clock, &idx, 0, now);
    c.toggle_play_pause(&mut clock, &idx, now);
    c.seek_relative(&mut clock, &idx, SeekDirection::Forward, now);
    assert_eq!(c.state(), PlaybackState::Idle);
    assert!(!clock.playing);
  }

  #[test]
  fn auto_stop_pauses_at_the_locked_end() {
    let idx = index();
    let mut clock = ManualClock::new(Some(8.0));
    let mut c = coordinator();
    let now = Instant::now();

    c.play_sentence(&mut clock, &idx, 1, now);
    assert_eq!(c.state(), PlaybackState::Playing { segment: 1 });
    assert_eq!(clock.pos, 2.0);

    clock.pos = 4.99;
    let out = c.tick(&mut clock, &idx, now);
    assert!(out.auto_stopped);
    assert!(!clock.playing);
    assert_eq!(c.state(), PlaybackState::Paused { segment: 1 });
  }

  #[test]
  fn continuous_mode_relocks_across_the_boundary() {
    let idx = index();
    let mut clock = ManualClock::new(Some(8.0));
    let mut c = coordinator();
    let now = Instant::now();

    c.set_auto_stop(false);
    c.play_sentence(&mut clock, &idx, 0, now);
    clock.pos = 1.99;
    let out = c.tick(&mut clock, &idx, now);
    assert!(!out.auto_stopped);
    assert!(clock.playing);

    // Crossing the boundary re-locks onto the entered segment.
    clock.pos = 2.05;
    let out = c.tick(&mut clock, &idx, now);
    assert_eq!(out.segment_changed, Some(1));
    assert!(clock.playing);
    assert_eq!(c.current_index(), 1);

    // And the new lock keeps playback running past the old end.
    clock.pos = 4.0;
    let out = c.tick(&mut clock, &idx, now);
    assert!(!out.auto_stopped);
    assert!(clock.playing);
  }

  #[test]
  fn resume_uses_the_recorded_pause_position() {
    let idx = index();
    let mut clock = ManualClock::new(Some(8.0));
    let mut c = coordinator();
    let now = Instant::now();

    c.play_sentence(&mut clock, &idx, 1, now);
    clock.pos = 3.5;
    c.toggle_play_pause(&mut clock, &idx, now); // pause at 3.5
    assert_eq!(c.state(), PlaybackState::Paused { segment: 1 });

    c.toggle_play_pause(&mut clock, &idx, now); // resume
    assert_eq!(clock.pos, 3.5);
    assert!(clock.playing);
  }

  #[test]
  fn toggling_at_the_segment_end_restarts_from_its_head() {
    let idx = index();
    let mut clock = ManualClock::new(Some(8.0));
    let mut c = coordinator();
    let now = Instant::now();

    c.play_sentence(&mut clock, &idx, 1, now);
    clock.pos = 4.99;
    c.tick(&mut clock, &idx, now); // auto-stop records ~end position
    c.toggle_play_pause(&mut clock, &idx, now);
    assert_eq!(clock.pos, 2.0);
    assert!(clock.playing);
  }

  #[test]
  fn relative_seek_never_leaves_the_segment() {
    let idx = index();
    let mut clock = ManualClock::new(Some(8.0));
    let mut c = coordinator();
    let now = Instant::now();

    c.play_sentence(&mut clock, &idx, 1, now);
    c.seek_relative(&mut clock, &idx, SeekDirection::Backward, now);
    assert_eq!(clock.pos, 2.0);
    clock.pos = 4.0;
    c.seek_relative(&mut clock, &idx, SeekDirection::Forward, now);
    assert!((clock.pos - 4.9).abs() < 1e-9);
  }

  #[test]
  fn navigation_restarts_the_adjacent_segment() {
    let idx = index();
    let mut clock = ManualClock::new(Some(8.0));
    let mut c = coordinator();
    let now = Instant::now();

    c.play_sentence(&mut clock, &idx, 1, now);
    clock.pos = 3.0;
    c.go_to_next(&mut clock, &idx, now);
    assert_eq!(c.current_index(), 2);
    assert_eq!(clock.pos, 5.0);
    assert!(clock.playing);

    c.go_to_previous(&mut clock, &idx, now);
    assert_eq!(c.current_index(), 1);
    assert_eq!(clock.pos, 2.0);

    // No previous from the first segment: the command is a no-op.
    c.go_to_previous(&mut clock, &idx, now);
    c.go_to_previous(&mut clock, &idx, now);
    assert_eq!(c.current_index(), 0);
  }

  #[test]
  fn suppression_window_blocks_time_driven_redetection() {
    let idx = index();
    let mut clock = ManualClock::new(Some(8.0));
    let mut tuning = EngineTuning::default();
    tuning.seek_suppression_ms = 60_000;
    let mut c = PlaybackCoordinator::new(&tuning);
    let now = Instant::now();

    c.play_sentence(&mut clock, &idx, 2, now);
    // The clock briefly reports a stale position from the old segment;
    // detection must not snap the coordinator back.
    clock.pos = 1.0;
    let out = c.tick(&mut clock, &idx, now);
    assert_eq!(out.segment_changed, None);
    assert_eq!(c.current_index(), 2);
  }

  #[test]
  fn redetection_follows_the_position_once_unsuppressed() {
    let idx = index();
    let mut clock = ManualClock::new(Some(8.0));
    let mut c = coordinator();
    let now = Instant::now();

    c.set_auto_stop(false);
    c.play_sentence(&mut clock, &idx, 0, now);
    clock.pos = 6.0;
    let out = c.tick(&mut clock, &idx, now);
    assert_eq!(out.segment_changed, Some(2));
    assert_eq!(c.state(), PlaybackState::Playing { segment: 2 });
  }

  #[test]
  fn overshooting_the_locked_end_still_stops() {
    let idx = index();
    let mut clock = ManualClock::new(Some(8.0));
    let mut c = coordinator();
    let now = Instant::now();

    // Contiguous transcript: a coarse poll tick can land past the boundary,
    // inside the next segment. Auto-stop wins over re-detection.
    c.play_sentence(&mut clock, &idx, 0, now);
    clock.pos = 2.01;
    let out = c.tick(&mut clock, &idx, now);
    assert!(out.auto_stopped);
    assert_eq!(out.segment_changed, None);
    assert!(!clock.playing);
    assert_eq!(c.state(), PlaybackState::Paused { segment: 0 });
  }

  #[test]
  fn seeking_while_paused_moves_the_resume_point() {
    let idx = index();
    let mut clock = ManualClock::new(Some(8.0));
    let mut c = coordinator();
    let now = Instant::now();

    c.play_sentence(&mut clock, &idx, 1, now);
    clock.pos = 3.5;
    c.toggle_play_pause(&mut clock, &idx, now); // pause at 3.5
    c.seek_relative(&mut clock, &idx, SeekDirection::Forward, now);
    assert!((clock.pos - 4.9).abs() < 1e-9);

    c.toggle_play_pause(&mut clock, &idx, now); // resume from the seek target
    assert!((clock.pos - 4.9).abs() < 1e-9);
    assert!(clock.playing);
  }

  #[test]
  fn seek_in_a_degenerate_segment_lands_at_its_start() {
    // Segment shorter than the seek guard.
    let idx = SegmentIndex::new(vec![
      Segment { index: 0, start_sec: 0.0, end_sec: 0.05, text: "Ja".into() },
    ]);
    let mut clock = ManualClock::new(Some(0.05));
    let mut c = coordinator();
    let now = Instant::now();

    c.play_sentence(&mut clock, &idx, 0, now);
    c.seek_relative(&mut clock, &idx, SeekDirection::Forward, now);
    assert_eq!(clock.pos, 0.0);
  }
}
