//! Voice catalog and the voice-id → language lookup.
//!
//! Kokoro voice ids follow the pattern `<lang><gender>_<name>`, e.g.
//! `af_bella` (American English, female) or `bm_george` (British English,
//! male). The language hint handed to the phonemiser is derived from the first
//! character of the id; [`Language::for_voice`] is the only place that knows
//! this convention.

use thiserror::Error;

/// Voices offered in the selector, in display order.
const DEFAULT_VOICES: &[(&str, &str)] = &[
    ("Emma", "bf_emma"),
    ("Bella", "af_bella"),
    ("Nicole", "af_nicole"),
    ("Sarah", "af_sarah"),
    ("Sky", "af_sky"),
    ("Adam", "am_adam"),
    ("Michael", "am_michael"),
    ("Isabella", "bf_isabella"),
    ("George", "bm_george"),
    ("Lewis", "bm_lewis"),
];

/// A single selectable voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceEntry {
    pub display_name: String,
    pub id: String,
}

/// Display name → voice id table. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct VoiceCatalog {
    entries: Vec<VoiceEntry>,
}

impl Default for VoiceCatalog {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_VOICES.iter().copied())
    }
}

impl VoiceCatalog {
    /// Build a catalog from `(display_name, id)` pairs.
    ///
    /// Later duplicates of a display name are dropped so names stay unique.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut entries: Vec<VoiceEntry> = Vec::new();
        for (name, id) in pairs {
            if entries.iter().any(|e| e.display_name == name) {
                continue;
            }
            entries.push(VoiceEntry { display_name: name.to_string(), id: id.to_string() });
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[VoiceEntry] {
        &self.entries
    }

    pub fn display_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.display_name.as_str())
    }

    /// Resolve a display name to its voice id.
    pub fn id_for(&self, display_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.display_name == display_name)
            .map(|e| e.id.as_str())
    }

    /// The entry selected when the window opens.
    pub fn first(&self) -> Option<&VoiceEntry> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Language hint
// ─────────────────────────────────────────────────────────────────────────────

/// Language the phonemiser is switched to for a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    AmericanEnglish,
    BritishEnglish,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("no language known for voice '{0}' (expected an id starting with 'a' or 'b')")]
pub struct UnknownLanguage(pub String);

impl Language {
    /// Derive the language from the leading character of a voice id.
    pub fn for_voice(voice_id: &str) -> Result<Self, UnknownLanguage> {
        match voice_id.chars().next() {
            Some('a') => Ok(Self::AmericanEnglish),
            Some('b') => Ok(Self::BritishEnglish),
            _ => Err(UnknownLanguage(voice_id.to_string())),
        }
    }

    /// espeak-ng voice name used for phonemisation.
    pub fn espeak_voice(self) -> &'static str {
        match self {
            Self::AmericanEnglish => "en-us",
            Self::BritishEnglish => "en-gb",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_keeps_order() {
        let catalog = VoiceCatalog::default();
        assert_eq!(catalog.len(), 10);
        assert_eq!(catalog.first().unwrap().display_name, "Emma");
        let names: Vec<&str> = catalog.display_names().collect();
        assert_eq!(names[1], "Bella");
        assert_eq!(names.last(), Some(&"Lewis"));
    }

    #[test]
    fn resolves_display_names() {
        let catalog = VoiceCatalog::default();
        assert_eq!(catalog.id_for("Bella"), Some("af_bella"));
        assert_eq!(catalog.id_for("George"), Some("bm_george"));
        assert_eq!(catalog.id_for("Nobody"), None);
    }

    #[test]
    fn duplicate_names_are_dropped() {
        let catalog = VoiceCatalog::from_pairs([("A", "af_a"), ("A", "af_b"), ("B", "bf_b")]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.id_for("A"), Some("af_a"));
    }

    #[test]
    fn language_from_leading_char() {
        assert_eq!(Language::for_voice("af_bella"), Ok(Language::AmericanEnglish));
        assert_eq!(Language::for_voice("bm_lewis"), Ok(Language::BritishEnglish));
        assert_eq!(Language::BritishEnglish.espeak_voice(), "en-gb");
    }

    #[test]
    fn unknown_language_is_an_error() {
        assert!(Language::for_voice("zf_xiaobei").is_err());
        assert!(Language::for_voice("").is_err());
    }

    #[test]
    fn every_default_voice_has_a_language() {
        for entry in VoiceCatalog::default().entries() {
            assert!(Language::for_voice(&entry.id).is_ok(), "{}", entry.id);
        }
    }
}
