//! Phoneme clean-up and character-level tokenisation for Kokoro.
//!
//! Every character of the cleaned IPA string maps to an index in a fixed
//! symbol table; characters outside the table are dropped. The model input is
//! the token sequence wrapped in pad tokens (0) on both ends.

use std::collections::HashMap;

use fancy_regex::Regex;
use once_cell::sync::Lazy;

use crate::voices::Language;

/// Longest token sequence the model accepts (before padding).
pub const MAX_TOKENS: usize = 510;

// ─────────────────────────────────────────────────────────────────────────────
// Vocabulary — order matters, index = token id
// ─────────────────────────────────────────────────────────────────────────────

const PAD: char = '$';

const PUNCTUATION: &str = ";:,.!?¡¿—…\"«»\u{201C}\u{201D} ";

const LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const IPA_LETTERS: &str =
    "ɑɐɒæɓʙβɔɕçɗɖðʤəɘɚɛɜɝɞɟʄɡɠɢʛɦɧħɥʜɨɪʝɭɬɫɮʟɱɯɰŋɳɲɴøɵɸθœɶʘɹɺɾɻʀʁɽʂʃʈʧʉʊʋⱱʌɣɤʍχʎʏʑʐʒʔʡʕʢǀǁǂǃˈˌːˑʼʴʰʱʲʷˠˤ˞↓↑→↗↘\u{2019}\u{0329}\u{2018}ᵻ";

static VOCAB: Lazy<HashMap<char, i64>> = Lazy::new(|| {
    std::iter::once(PAD)
        .chain(PUNCTUATION.chars())
        .chain(LETTERS.chars())
        .chain(IPA_LETTERS.chars())
        .enumerate()
        .map(|(i, c)| (c, i as i64))
        .collect()
});

// ─────────────────────────────────────────────────────────────────────────────
// Phoneme fix-ups
// ─────────────────────────────────────────────────────────────────────────────

static RE_HUNDRED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?<=[a-zɹː])(?=hˈʌndɹɪd)").unwrap());
static RE_TRAILING_Z: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#" z(?=[;:,.!?¡¿—…"«»“” ]|$)"#).unwrap());
static RE_NINETY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?<=nˈaɪn)ti(?!ː)").unwrap());

/// Clean raw espeak-ng IPA into the symbol set the model was trained on.
pub fn clean_phonemes(ipa: &str, language: Language) -> String {
    let ps = ipa
        .replace("kəkˈoːɹoʊ", "kˈoʊkəɹoʊ")
        .replace("kəkˈɔːɹəʊ", "kˈəʊkəɹəʊ")
        .replace('ʲ', "j")
        .replace('r', "ɹ")
        .replace('x', "k")
        .replace('ɬ', "l");

    let ps = RE_HUNDRED.replace_all(&ps, " ");
    let mut ps = RE_TRAILING_Z.replace_all(&ps, "z").into_owned();
    if language == Language::AmericanEnglish {
        ps = RE_NINETY.replace_all(&ps, "di").into_owned();
    }

    ps.chars()
        .filter(|c| VOCAB.contains_key(c))
        .collect::<String>()
        .trim()
        .to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokenisation
// ─────────────────────────────────────────────────────────────────────────────

pub fn char_to_id(c: char) -> Option<i64> {
    VOCAB.get(&c).copied()
}

/// Map cleaned phonemes to token ids, truncated to [`MAX_TOKENS`]. No padding.
pub fn tokenize(phonemes: &str) -> Vec<i64> {
    let mut ids: Vec<i64> = phonemes.chars().filter_map(char_to_id).collect();
    if ids.len() > MAX_TOKENS {
        tracing::warn!(len = ids.len(), "phoneme sequence truncated to {MAX_TOKENS} tokens");
        ids.truncate(MAX_TOKENS);
    }
    ids
}

/// Wrap a token sequence in the start / end pad tokens.
pub fn pad(tokens: &[i64]) -> Vec<i64> {
    let mut padded = Vec::with_capacity(tokens.len() + 2);
    padded.push(0);
    padded.extend_from_slice(tokens);
    padded.push(0);
    padded
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_is_zero_and_unique_ids() {
        assert_eq!(char_to_id('$'), Some(0));
        let mut seen = std::collections::HashSet::new();
        for &idx in VOCAB.values() {
            assert!(seen.insert(idx), "duplicate index {idx}");
        }
    }

    #[test]
    fn punctuation_precedes_letters() {
        assert_eq!(char_to_id(';'), Some(1));
        assert_eq!(char_to_id(' '), Some(16));
        assert_eq!(char_to_id('A'), Some(17));
    }

    #[test]
    fn unknown_chars_are_dropped() {
        assert_eq!(char_to_id('中'), None);
        assert_eq!(tokenize("a中b"), vec![char_to_id('a').unwrap(), char_to_id('b').unwrap()]);
    }

    #[test]
    fn tokens_are_truncated() {
        let long = "a".repeat(MAX_TOKENS + 40);
        assert_eq!(tokenize(&long).len(), MAX_TOKENS);
    }

    #[test]
    fn padding_wraps_sequence() {
        assert_eq!(pad(&[5, 6]), vec![0, 5, 6, 0]);
        assert_eq!(pad(&[]), vec![0, 0]);
    }

    #[test]
    fn clean_maps_espeak_symbols() {
        assert_eq!(clean_phonemes("rˈɛd", Language::BritishEnglish), "ɹˈɛd");
        assert_eq!(clean_phonemes("lˈɔx", Language::BritishEnglish), "lˈɔk");
        assert_eq!(clean_phonemes("  həlˈoʊ  ", Language::AmericanEnglish), "həlˈoʊ");
    }

    #[test]
    fn clean_joins_plural_z() {
        assert_eq!(clean_phonemes("kæts z.", Language::AmericanEnglish), "kætsz.");
    }

    #[test]
    fn ninety_flapping_is_american_only() {
        assert_eq!(clean_phonemes("nˈaɪnti", Language::AmericanEnglish), "nˈaɪndi");
        assert_eq!(clean_phonemes("nˈaɪnti", Language::BritishEnglish), "nˈaɪnti");
    }

    #[test]
    fn clean_splits_hundred() {
        assert_eq!(
            clean_phonemes("tˈuːhˈʌndɹɪd", Language::AmericanEnglish),
            "tˈuː hˈʌndɹɪd"
        );
    }
}
