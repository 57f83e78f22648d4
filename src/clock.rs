//! The positional-control contract the engine needs from a playback surface,
//! plus a wall-clock backed implementation used by server-driven sessions.
//!
//! The rest of the engine is agnostic to what actually renders the media:
//! a local audio element, an embedded video player, or (here) a virtual
//! timeline that advances with real time while "playing".

use std::time::Instant;

/// Contract required from any playback surface. `seek` clamps into
/// `[0, duration]`. While `duration()` is `None` (media not loaded) all
/// coordinator commands are no-ops.
pub trait MediaClock {
  fn position(&self) -> f64;
  fn duration(&self) -> Option<f64>;
  fn play(&mut self);
  fn pause(&mut self);
  fn seek(&mut self, t: f64);
  fn is_playing(&self) -> bool;
  fn set_rate(&mut self, rate: f64);
}

/// Virtual timeline: position advances with `Instant` while playing, scaled
/// by the playback rate. Duration comes from the lesson.
pub struct TimelineClock {
  duration: Option<f64>,
  base_pos: f64,
  started_at: Option<Instant>,
  rate: f64,
}

impl TimelineClock {
  pub fn new(duration: Option<f64>) -> Self {
    Self { duration, base_pos: 0.0, started_at: None, rate: 1.0 }
  }

  fn clamp(&self, t: f64) -> f64 {
    let upper = self.duration.unwrap_or(0.0);
    t.max(0.0).min(upper)
  }
}

impl MediaClock for TimelineClock {
  fn position(&self) -> f64 {
    match self.started_at {
      Some(since) => self.clamp(self.base_pos + since.elapsed().as_secs_f64() * self.rate),
      None => self.base_pos,
    }
  }

  fn duration(&self) -> Option<f64> {
    self.duration
  }

  fn play(&mut self) {
    if self.duration.is_none() || self.started_at.is_some() {
      return;
    }
    self.started_at = Some(Instant::now());
  }

  fn pause(&mut self) {
    self.base_pos = self.position();
    self.started_at = None;
  }

  fn seek(&mut self, t: f64) {
    let t = self.clamp(t);
    self.base_pos = t;
    if self.started_at.is_some() {
      self.started_at = Some(Instant::now());
    }
  }

  fn is_playing(&self) -> bool {
    self.started_at.is_some()
  }

  fn set_rate(&mut self, rate: f64) {
    // Rebase so the position stays continuous across the rate change.
    let pos = self.position();
    self.base_pos = pos;
    if self.started_at.is_some() {
      self.started_at = Some(Instant::now());
    }
    self.rate = rate.max(0.1);
  }
}

/// Scripted clock for tests: the position moves only when told to.
#[cfg(test)]
pub struct ManualClock {
  pub pos: f64,
  pub dur: Option<f64>,
  pub playing: bool,
  pub rate: f64,
}

#[cfg(test)]
impl ManualClock {
  pub fn new(dur: Option<f64>) -> Self {
    Self { pos: 0.0, dur, playing: false, rate: 1.0 }
  }

  pub fn advance(&mut self, dt: f64) {
    if self.playing {
      self.pos += dt * self.rate;
      if let Some(d) = self.dur {
        self.pos = self.pos.min(d);
      }
    }
  }
}

#[cfg(test)]
impl MediaClock for ManualClock {
  fn position(&self) -> f64 { self.pos }
  fn duration(&self) -> Option<f64> { self.dur }
  fn play(&mut self) {
    if self.dur.is_some() { self.playing = true; }
  }
  fn pause(&mut self) { self.playing = false; }
  fn seek(&mut self, t: f64) {
    let upper = self.dur.unwrap_or(0.0);
    self.pos = t.max(0.0).min(upper);
  }
  fn is_playing(&self) -> bool { self.playing }
  fn set_rate(&mut self, rate: f64) { self.rate = rate.max(0.1); }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timeline_clock_noops_without_duration() {
    let mut c = TimelineClock::new(None);
    c.play();
    assert!(!c.is_playing());
    c.seek(5.0);
    assert_eq!(c.position(), 0.0);
  }

  #[test]
  fn seek_clamps_into_timeline() {
    let mut c = TimelineClock::new(Some(10.0));
    c.seek(-3.0);
    assert_eq!(c.position(), 0.0);
    c.seek(42.0);
    assert_eq!(c.position(), 10.0);
  }

  #[test]
  fn pause_freezes_position() {
    let mut c = TimelineClock::new(Some(10.0));
    c.seek(2.0);
    c.play();
    c.pause();
    let frozen = c.position();
    std::thread::sleep(std::time::Duration::from_millis(10));
    assert_eq!(c.position(), frozen);
  }
}
