//! Deciding which words of a sentence are hidden behind input slots.
//!
//! The UI regenerates a sentence from scratch on every switch, so the same
//! (sentence, hide level) pair must always produce the same masked pattern
//! without any per-word render state. Selection therefore ranks maskable
//! tokens by a deterministic hash keyed on (sentence_index, word_index) and
//! hides the first `ceil(n * pct / 100)` of them.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::word_slots;

/// One rendered token: either revealed text or a blank slot sized to the
/// hidden word's char count.
#[derive(Clone, Debug, Serialize)]
pub struct MaskedToken {
  pub word_index: usize,
  /// Revealed text; empty while hidden.
  pub text: String,
  pub punctuation: String,
  pub hidden: bool,
  /// Char count of the alphanumeric core; sizes the blank slot.
  pub length: usize,
  pub maskable: bool,
}

/// splitmix64 finalizer. Weak PRNGs are fine here: the requirement is
/// determinism per (sentence, word), not randomness quality.
fn rank_key(sentence_index: usize, word_index: usize) -> u64 {
  let mut z = ((sentence_index as u64) << 32) ^ (word_index as u64);
  z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
  z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
  z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
  z ^ (z >> 31)
}

/// Mask one sentence. `resolved` is the tracker's word-resolution map for the
/// sentence; resolved indices are never hidden regardless of ranking.
pub fn mask_sentence(
  sentence_index: usize,
  text: &str,
  hide_percentage: u8,
  resolved: &BTreeMap<usize, String>,
) -> Vec<MaskedToken> {
  let slots = word_slots(sentence_index, text);

  let mut unresolved: Vec<usize> = slots
    .iter()
    .filter(|s| s.maskable && !resolved.contains_key(&s.word_index))
    .map(|s| s.word_index)
    .collect();

  let to_hide = if hide_percentage >= 100 {
    unresolved.len()
  } else {
    (unresolved.len() * hide_percentage as usize).div_ceil(100)
  };

  unresolved.sort_by_key(|&w| rank_key(sentence_index, w));
  let hidden: Vec<usize> = unresolved.into_iter().take(to_hide).collect();

  slots
    .into_iter()
    .map(|slot| {
      let length = slot.pure_word.chars().count();
      if !slot.maskable {
        // Punctuation-only tokens pass through as literal text.
        return MaskedToken {
          word_index: slot.word_index,
          text: slot.surface_form,
          punctuation: String::new(),
          hidden: false,
          length: 0,
          maskable: false,
        };
      }
      let hide = hidden.contains(&slot.word_index);
      MaskedToken {
        word_index: slot.word_index,
        text: if hide { String::new() } else { slot.pure_word },
        punctuation: slot.punctuation,
        hidden: hide,
        length,
        maskable: true,
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn hidden_set(tokens: &[MaskedToken]) -> Vec<usize> {
    tokens.iter().filter(|t| t.hidden).map(|t| t.word_index).collect()
  }

  const TEXT: &str = "Danach fahre ich mit dem Fahrrad zur Arbeit.";

  #[test]
  fn masking_is_deterministic() {
    let resolved = BTreeMap::new();
    let a = mask_sentence(3, TEXT, 60, &resolved);
    let b = mask_sentence(3, TEXT, 60, &resolved);
    assert_eq!(hidden_set(&a), hidden_set(&b));
  }

  #[test]
  fn hide_count_matches_ceil() {
    let resolved = BTreeMap::new();
    // 8 maskable words at 60% -> ceil(4.8) = 5.
    let tokens = mask_sentence(3, TEXT, 60, &resolved);
    assert_eq!(hidden_set(&tokens).len(), 5);
    // 30% -> ceil(2.4) = 3.
    let tokens = mask_sentence(3, TEXT, 30, &resolved);
    assert_eq!(hidden_set(&tokens).len(), 3);
    // 0% hides nothing.
    let tokens = mask_sentence(3, TEXT, 0, &resolved);
    assert!(hidden_set(&tokens).is_empty());
  }

  #[test]
  fn full_level_hides_every_unresolved_word() {
    let mut resolved = BTreeMap::new();
    resolved.insert(1, "fahre".to_string());
    let tokens = mask_sentence(3, TEXT, 100, &resolved);
    assert_eq!(hidden_set(&tokens).len(), 7);
    assert!(!tokens[1].hidden);
    assert_eq!(tokens[1].text, "fahre");
  }

  #[test]
  fn resolved_words_never_hide_and_count_shrinks() {
    let mut resolved = BTreeMap::new();
    resolved.insert(0, "Danach".to_string());
    resolved.insert(2, "ich".to_string());
    // 6 unresolved at 60% -> ceil(3.6) = 4, none of them index 0 or 2.
    let tokens = mask_sentence(3, TEXT, 60, &resolved);
    let hidden = hidden_set(&tokens);
    assert_eq!(hidden.len(), 4);
    assert!(!hidden.contains(&0) && !hidden.contains(&2));
  }

  #[test]
  fn punctuation_only_tokens_pass_through() {
    let resolved = BTreeMap::new();
    let tokens = mask_sentence(0, "Ja — genau!", 100, &resolved);
    assert!(!tokens[1].maskable);
    assert!(!tokens[1].hidden);
    assert_eq!(tokens[1].text, "—");
  }

  #[test]
  fn blank_slots_are_sized_to_the_word() {
    let resolved = BTreeMap::new();
    let tokens = mask_sentence(0, "Hallo Welt", 100, &resolved);
    assert_eq!(tokens[0].length, 5);
    assert_eq!(tokens[1].length, 4);
    assert!(tokens.iter().all(|t| t.hidden));
  }
}
