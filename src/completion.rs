//! Per-word and per-sentence completion tracking.
//!
//! Entries are write-once: a (sentence, word) resolution is recorded at most
//! once and never removed during a session. A sentence is complete iff every
//! maskable word index in it has an entry. Duplicate resolution events are
//! absorbed here and must never re-trigger completion side effects.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{word_slots, WordSlot};
use crate::segment::SegmentIndex;
use crate::util::{fold_digraphs, sanitize_expected};

/// Outcome of a single typed check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
  /// Typed value matches; the slot is now resolved.
  Correct,
  /// Slot fully filled but wrong.
  IncorrectResolved,
  /// Partial input; no state change.
  Pending,
}

#[derive(Clone, Debug)]
pub struct CheckOutcome {
  pub verdict: Verdict,
  /// Set when this event transitioned the sentence into completion.
  pub sentence_completed: bool,
  /// The resolved surface word, present on correct resolutions.
  pub resolved_word: Option<String>,
}

#[derive(Clone, Debug)]
pub struct RevealOutcome {
  /// (word_index, word) pairs resolved by this pass.
  pub revealed: Vec<(usize, String)>,
  pub sentence_completed: bool,
}

/// Snapshot shape used to pre-seed a session from persisted progress.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CompletionRestore {
  #[serde(default)]
  pub completed_sentences: Vec<usize>,
  #[serde(default)]
  pub completed_words: BTreeMap<usize, BTreeMap<usize, String>>,
}

#[derive(Debug, Default)]
pub struct CompletionTracker {
  sentence_completion: BTreeSet<usize>,
  word_completion: BTreeMap<usize, BTreeMap<usize, String>>,
}

impl CompletionTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// Pre-seed from a previously persisted snapshot.
  pub fn restore(snapshot: CompletionRestore) -> Self {
    Self {
      sentence_completion: snapshot.completed_sentences.into_iter().collect(),
      word_completion: snapshot.completed_words,
    }
  }

  pub fn completed_sentences(&self) -> &BTreeSet<usize> {
    &self.sentence_completion
  }

  pub fn word_completion(&self) -> &BTreeMap<usize, BTreeMap<usize, String>> {
    &self.word_completion
  }

  pub fn is_sentence_complete(&self, sentence: usize) -> bool {
    self.sentence_completion.contains(&sentence)
  }

  /// Resolution map for one sentence, the masking override input.
  pub fn resolved_for(&self, sentence: usize) -> BTreeMap<usize, String> {
    self.word_completion.get(&sentence).cloned().unwrap_or_default()
  }

  /// Count of resolved words across the lesson.
  pub fn correct_words_count(&self) -> usize {
    self.word_completion.values().map(|m| m.len()).sum()
  }

  fn slot_of(index: &SegmentIndex, sentence: usize, word: usize) -> Option<WordSlot> {
    let seg = index.get(sentence)?;
    word_slots(sentence, &seg.text)
      .into_iter()
      .find(|s| s.word_index == word && s.maskable)
  }

  fn record(&mut self, sentence: usize, word: usize, resolved: String) {
    self
      .word_completion
      .entry(sentence)
      .or_default()
      .entry(word)
      .or_insert(resolved);
  }

  /// Re-evaluate sentence completion after a recording. Idempotent: returns
  /// true only on the transition into the completed set.
  fn reevaluate(&mut self, index: &SegmentIndex, sentence: usize) -> bool {
    if self.sentence_completion.contains(&sentence) {
      return false;
    }
    let maskable = index.maskable_indices(sentence);
    if maskable.is_empty() {
      return false;
    }
    let resolved = match self.word_completion.get(&sentence) {
      Some(m) => m,
      None => return false,
    };
    if maskable.iter().all(|w| resolved.contains_key(w)) {
      self.sentence_completion.insert(sentence);
      return true;
    }
    false
  }

  /// Check typed input against the slot's expected word. The expected word is
  /// derived from the lesson's own tokenization; callers address slots purely
  /// by (sentence, word) identity. Returns None for unknown or non-maskable
  /// slots, which callers treat as a no-op.
  pub fn check_word(
    &mut self,
    index: &SegmentIndex,
    sentence: usize,
    word: usize,
    typed: &str,
  ) -> Option<CheckOutcome> {
    let slot = Self::slot_of(index, sentence, word)?;
    let expected = sanitize_expected(&slot.pure_word);

    if fold_digraphs(typed) == fold_digraphs(&expected) {
      self.record(sentence, word, slot.pure_word.clone());
      let sentence_completed = self.reevaluate(index, sentence);
      return Some(CheckOutcome {
        verdict: Verdict::Correct,
        sentence_completed,
        resolved_word: Some(slot.pure_word),
      });
    }

    let verdict = if typed.chars().count() == expected.chars().count() {
      Verdict::IncorrectResolved
    } else {
      Verdict::Pending
    };
    Some(CheckOutcome { verdict, sentence_completed: false, resolved_word: None })
  }

  /// Resolve one slot as if hinted.
  pub fn request_hint(
    &mut self,
    index: &SegmentIndex,
    sentence: usize,
    word: usize,
  ) -> Option<CheckOutcome> {
    let slot = Self::slot_of(index, sentence, word)?;
    self.record(sentence, word, slot.pure_word.clone());
    let sentence_completed = self.reevaluate(index, sentence);
    Some(CheckOutcome {
      verdict: Verdict::Correct,
      sentence_completed,
      resolved_word: Some(slot.pure_word),
    })
  }

  /// Batch-resolve every still-open slot of a sentence, each as if hinted,
  /// with a single completion re-evaluation at the end.
  pub fn reveal_all(&mut self, index: &SegmentIndex, sentence: usize) -> Option<RevealOutcome> {
    let seg = index.get(sentence)?;
    let mut revealed = Vec::new();
    for slot in word_slots(sentence, &seg.text) {
      if !slot.maskable {
        continue;
      }
      let open = self
        .word_completion
        .get(&sentence)
        .map_or(true, |m| !m.contains_key(&slot.word_index));
      if open {
        self.record(sentence, slot.word_index, slot.pure_word.clone());
        revealed.push((slot.word_index, slot.pure_word));
      }
    }
    let sentence_completed = self.reevaluate(index, sentence);
    Some(RevealOutcome { revealed, sentence_completed })
  }
}
