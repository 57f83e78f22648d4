//! Ordered, time-coded transcript with active-segment lookup.

use crate::domain::{word_slots, Segment};

/// Holds the sorted segment sequence for one lesson session.
///
/// Lookup assumes ascending, non-overlapping segments. The engine performs no
/// validation; on pathological overlapping input the policy is: the
/// latest-starting segment covering `t` wins (a consequence of the binary
/// search below). Gaps between segments resolve to "none".
pub struct SegmentIndex {
  segments: Vec<Segment>,
}

impl SegmentIndex {
  pub fn new(mut segments: Vec<Segment>) -> Self {
    for (i, seg) in segments.iter_mut().enumerate() {
      seg.index = i;
    }
    Self { segments }
  }

  /// The unique index with `start <= t < end`, or None in gaps and on an
  /// empty transcript.
  pub fn find_active(&self, t: f64) -> Option<usize> {
    let i = self.segments.partition_point(|s| s.start_sec <= t);
    if i == 0 {
      return None;
    }
    let seg = &self.segments[i - 1];
    (t < seg.end_sec).then_some(i - 1)
  }

  pub fn get(&self, i: usize) -> Option<&Segment> {
    self.segments.get(i)
  }

  pub fn len(&self) -> usize {
    self.segments.len()
  }

  pub fn is_empty(&self) -> bool {
    self.segments.is_empty()
  }

  pub fn next(&self, i: usize) -> Option<usize> {
    (i + 1 < self.segments.len()).then_some(i + 1)
  }

  pub fn previous(&self, i: usize) -> Option<usize> {
    i.checked_sub(1)
  }

  /// Maskable word indices of one sentence.
  pub fn maskable_indices(&self, sentence: usize) -> Vec<usize> {
    self
      .get(sentence)
      .map(|seg| {
        word_slots(sentence, &seg.text)
          .into_iter()
          .filter(|s| s.maskable)
          .map(|s| s.word_index)
          .collect()
      })
      .unwrap_or_default()
  }

  /// Total maskable words across the whole transcript, the denominator of
  /// the lesson's completion percent.
  pub fn total_maskable_words(&self) -> usize {
    self
      .segments
      .iter()
      .map(|seg| {
        word_slots(seg.index, &seg.text)
          .iter()
          .filter(|s| s.maskable)
          .count()
      })
      .sum()
  }
}
