//! Processing-language table.
//!
//! Matching normalization (stopwords, abbreviations, stemming) supports a
//! small fixed set of languages.  MARC records carry three-letter codes in
//! the 008/041 fields; anything outside the supported set falls back to
//! English with an explicit indicator so downstream consumers can tell a
//! detected language from a guess.

use serde::{Deserialize, Serialize};

/// A language with matching-normalization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Language {
    #[default]
    English,
    French,
    German,
    Spanish,
    Italian,
}

impl Language {
    /// The three-letter processing code for this language.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "eng",
            Language::French => "fre",
            Language::German => "ger",
            Language::Spanish => "spa",
            Language::Italian => "ita",
        }
    }
}

/// How the processing language was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LanguageStatus {
    /// The source carried a code we support.
    Detected,
    /// The source carried no code at all.
    #[default]
    FallbackEnglish,
    /// The source carried a code outside the processing set.
    UnknownCode,
}

impl LanguageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageStatus::Detected => "detected",
            LanguageStatus::FallbackEnglish => "fallback_english",
            LanguageStatus::UnknownCode => "unknown_code",
        }
    }
}

/// Map a MARC language code onto the processing set.
///
/// Accepts the usual two- and three-letter variants for each supported
/// language.  Unknown codes fall back to English.
///
/// ```
/// use copystat::lang::{map_marc_language, Language, LanguageStatus};
///
/// assert_eq!(map_marc_language("fre"), (Language::French, LanguageStatus::Detected));
/// assert_eq!(map_marc_language("deu"), (Language::German, LanguageStatus::Detected));
/// assert_eq!(map_marc_language(""), (Language::English, LanguageStatus::FallbackEnglish));
/// assert_eq!(map_marc_language("rus"), (Language::English, LanguageStatus::UnknownCode));
/// ```
pub fn map_marc_language(code: &str) -> (Language, LanguageStatus) {
    let clean = code.trim().to_lowercase();

    if clean.is_empty() {
        return (Language::English, LanguageStatus::FallbackEnglish);
    }

    let lang = match clean.as_str() {
        "eng" | "en" => Some(Language::English),
        "fre" | "fr" | "fra" => Some(Language::French),
        "ger" | "de" | "deu" => Some(Language::German),
        "spa" | "es" | "esp" => Some(Language::Spanish),
        "ita" | "it" | "ital" => Some(Language::Italian),
        _ => None,
    };

    match lang {
        Some(l) => (l, LanguageStatus::Detected),
        None => (Language::English, LanguageStatus::UnknownCode),
    }
}
