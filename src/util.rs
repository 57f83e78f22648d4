//! Small utility helpers used across modules.

/// True if the char belongs to the learner-language alphabet: ASCII
/// alphanumerics plus German umlauts and sharp s. Tokens with at least one
/// such char are maskable; everything else is treated as punctuation.
pub fn is_learner_alnum(ch: char) -> bool {
  ch.is_ascii_alphanumeric() || matches!(ch, 'ä' | 'ö' | 'ü' | 'Ä' | 'Ö' | 'Ü' | 'ß')
}

/// The alphanumeric core of a token ("Welt," -> "Welt").
pub fn pure_word(token: &str) -> String {
  token.chars().filter(|c| is_learner_alnum(*c)).collect()
}

/// The non-alphanumeric remainder of a token ("Welt," -> ",").
pub fn punctuation_of(token: &str) -> String {
  token.chars().filter(|c| !is_learner_alnum(*c)).collect()
}

/// Strip the fixed punctuation set from an expected word before comparison.
pub fn sanitize_expected(word: &str) -> String {
  const STRIP: &str = ".,/#!$%^&*;:{}=-_`~()?";
  word.chars().filter(|c| !STRIP.contains(*c)).collect()
}

/// Case-insensitive folding that also maps umlauts onto their digraph
/// spellings, so a learner typing "ue" matches "ü" and "ss" matches "ß".
/// Both sides of a comparison must be folded.
pub fn fold_digraphs(s: &str) -> String {
  let lower = s.to_lowercase();
  let mut out = String::with_capacity(lower.len());
  for ch in lower.chars() {
    match ch {
      'ä' => out.push_str("ae"),
      'ö' => out.push_str("oe"),
      'ü' => out.push_str("ue"),
      'ß' => out.push_str("ss"),
      other => out.push(other),
    }
  }
  out
}
