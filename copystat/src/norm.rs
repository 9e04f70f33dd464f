//! Text and identifier normalization.
//!
//! Three pipelines of increasing aggressiveness:
//!
//! * [`normalize_minimal`] - whitespace cleanup only, for display fields.
//! * [`normalize_standard`] - case/diacritic/punctuation folding, the
//!   shared base for indexing and scoring.
//! * [`normalize_for_matching`] - standard plus language-aware
//!   abbreviation expansion, stopword removal, and stemming.
//!
//! All routines are pure functions of their inputs.  Standard
//! normalization is idempotent; matching normalization is a no-op when
//! applied to its own output.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;

use crate::lang::Language;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
// Anchored on start-or-non-digit rather than \b so copyright-prefixed
// dates ("c1923.", "©1947") still yield their year; the trailing guard
// keeps longer digit runs from matching a four-digit prefix.
static RE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])(1[5-9]\d{2}|20\d{2})(?:[^0-9]|$)").unwrap());

/// Collapse runs of whitespace, preserving case and punctuation.
///
/// ```
/// assert_eq!(copystat::norm::normalize_minimal("  The   Great\tGatsby "), "The Great Gatsby");
/// ```
pub fn normalize_minimal(value: &str) -> String {
    RE_WHITESPACE.replace_all(value.trim(), " ").into_owned()
}

/// Remove bracketed annotations such as `[microform]` or
/// `[electronic resource]`.
///
/// ```
/// assert_eq!(
///     copystat::norm::remove_bracketed("Poems [microform] : a selection"),
///     "Poems  : a selection"
/// );
/// ```
pub fn remove_bracketed(value: &str) -> String {
    RE_BRACKETED.replace_all(value, "").into_owned()
}

/// Lower-case, fold diacritics to ASCII, replace punctuation with
/// spaces, drop bracketed annotations, collapse single-letter word
/// runs, and collapse whitespace.
///
/// Idempotent: applying it to its own output changes nothing.
///
/// ```
/// use copystat::norm::normalize_standard;
///
/// assert_eq!(normalize_standard("Étude sur l'âge"), "etude sur l age");
/// assert_eq!(normalize_standard("Report of the U. S. A. commission"), "report of the usa commission");
/// assert_eq!(normalize_standard("Poems [microform]"), "poems");
/// ```
pub fn normalize_standard(value: &str) -> String {
    let stripped = remove_bracketed(value);

    // NFKD first so ligatures and composed forms decompose before the
    // ASCII transliteration pass.
    let decomposed: String = stripped.nfkd().collect();
    let folded = any_ascii(&decomposed).to_lowercase();

    let spaced: String = folded
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();

    join_single_letter_runs(spaced.split_whitespace())
}

/// Merge consecutive single-letter tokens ("u s a" becomes "usa").
/// A lone single-letter token is left as-is.
fn join_single_letter_runs<'a>(tokens: impl Iterator<Item = &'a str>) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut run: Vec<&str> = Vec::new();

    for tok in tokens {
        if tok.chars().count() == 1 {
            run.push(tok);
            continue;
        }
        flush_run(&mut out, &mut run);
        out.push(tok.to_string());
    }
    flush_run(&mut out, &mut run);

    out.join(" ")
}

fn flush_run(out: &mut Vec<String>, run: &mut Vec<&str>) {
    match run.len() {
        0 => {}
        1 => out.push(run[0].to_string()),
        _ => out.push(run.concat()),
    }
    run.clear();
}

/// Full matching normalization: [`normalize_standard`], then
/// language-specific abbreviation expansion, stopword removal, and
/// suffix-stripping stemming.
///
/// Empty input yields "".
///
/// ```
/// use copystat::lang::Language;
/// use copystat::norm::normalize_for_matching;
///
/// let a = normalize_for_matching("The Annual Report of the Smith Co.", Language::English);
/// let b = normalize_for_matching("Annual report, Smith Company", Language::English);
/// assert_eq!(a, b);
/// ```
pub fn normalize_for_matching(value: &str, language: Language) -> String {
    let base = normalize_standard(value);
    if base.is_empty() {
        return String::new();
    }

    let stemmer = stemmer_for(language);
    let stopwords = stopwords_for(language);
    let abbreviations = abbreviations_for(language);

    let mut out: Vec<String> = Vec::new();
    for token in base.split_whitespace() {
        let token = abbreviations
            .iter()
            .find(|(abbr, _)| *abbr == token)
            .map(|(_, full)| *full)
            .unwrap_or(token);

        if stopwords.contains(&token) {
            continue;
        }

        out.push(stemmer.stem(token).into_owned());
    }

    out.join(" ")
}

fn stemmer_for(language: Language) -> &'static Stemmer {
    static ENGLISH: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::English));
    static FRENCH: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::French));
    static GERMAN: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::German));
    static SPANISH: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::Spanish));
    static ITALIAN: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::Italian));

    match language {
        Language::English => &ENGLISH,
        Language::French => &FRENCH,
        Language::German => &GERMAN,
        Language::Spanish => &SPANISH,
        Language::Italian => &ITALIAN,
    }
}

fn stopwords_for(language: Language) -> &'static [&'static str] {
    match language {
        Language::English => &[
            "a", "an", "and", "at", "by", "for", "from", "in", "of", "on", "or", "the", "to",
            "with",
        ],
        Language::French => &[
            "de", "des", "du", "en", "et", "la", "le", "les", "ou", "sur", "un", "une",
        ],
        Language::German => &[
            "das", "der", "die", "ein", "eine", "im", "in", "und", "von", "zu", "zur",
        ],
        Language::Spanish => &[
            "de", "del", "el", "en", "la", "las", "los", "un", "una", "y",
        ],
        Language::Italian => &[
            "del", "della", "di", "e", "gli", "i", "il", "in", "la", "le", "lo", "un", "una",
        ],
    }
}

/// Token-for-token expansions applied after standard normalization,
/// so the keys are already lower-case and punctuation-free.
fn abbreviations_for(language: Language) -> &'static [(&'static str, &'static str)] {
    match language {
        Language::English => &[
            ("assn", "association"),
            ("bros", "brothers"),
            ("co", "company"),
            ("corp", "corporation"),
            ("dept", "department"),
            ("inc", "incorporated"),
            ("ltd", "limited"),
            ("soc", "society"),
            ("univ", "university"),
            ("vol", "volume"),
        ],
        Language::French => &[
            ("cie", "compagnie"),
            ("ed", "edition"),
            ("libr", "librairie"),
        ],
        Language::German => &[
            ("ges", "gesellschaft"),
            ("verl", "verlag"),
        ],
        Language::Spanish => &[
            ("cia", "compania"),
            ("ed", "edicion"),
        ],
        Language::Italian => &[
            ("ed", "edizione"),
            ("flli", "fratelli"),
        ],
    }
}

/// Normalize a Library of Congress Control Number so every syntactic
/// variant of the same identifier maps to one key.
///
/// Rules: anything after a '/' (revision markers) is dropped; a
/// hyphenated serial is zero-padded to six digits; all remaining
/// non-alphanumerics are removed; the alphabetic prefix is
/// lower-cased; leading zeros are dropped from the numeric tail only
/// when the total digit count exceeds eight.
///
/// ```
/// use copystat::norm::normalize_lccn;
///
/// assert_eq!(normalize_lccn("25-12345"), "25012345");
/// assert_eq!(normalize_lccn("   68004538 "), "68004538");
/// assert_eq!(normalize_lccn("N78-890351"), "n78890351");
/// assert_eq!(normalize_lccn("78-890351//r75"), "78890351");
/// assert_eq!(normalize_lccn("n 78890351 "), "n78890351");
/// ```
pub fn normalize_lccn(raw: &str) -> String {
    let value = raw.trim().split('/').next().unwrap_or("").trim();

    let joined = match value.split_once('-') {
        Some((head, tail)) => {
            let mut s: String = head
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            let serial: String = tail.chars().filter(|c| c.is_ascii_digit()).collect();
            if !serial.is_empty() {
                s.push_str(&format!("{serial:0>6}"));
            }
            s
        }
        None => value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase(),
    };

    let prefix: String = joined
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let digits: String = joined
        .chars()
        .skip_while(|c| c.is_ascii_alphabetic())
        .filter(|c| c.is_ascii_digit())
        .collect();

    if digits.len() > 8 {
        format!("{prefix}{}", digits.trim_start_matches('0'))
    } else {
        format!("{prefix}{digits}")
    }
}

/// Extract the first four-digit year in [1500, 2099] that stands
/// apart from any longer digit run.
///
/// ```
/// use copystat::norm::extract_year;
///
/// assert_eq!(extract_year("c1923."), Some(1923));
/// assert_eq!(extract_year("©1947"), Some(1947));
/// assert_eq!(extract_year("[1950]"), Some(1950));
/// assert_eq!(extract_year("12345 not a year"), None);
/// assert_eq!(extract_year("printed 1476"), None);
/// ```
pub fn extract_year(value: &str) -> Option<i32> {
    RE_YEAR
        .captures(value)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_normalization_is_idempotent() {
        let cases = [
            "The Great Gatsby / by F. Scott Fitzgerald",
            "Étude sur l'âge d'or",
            "U. S. A. Naval report [microform]",
            "  odd   spacing\tand\npunct!!  ",
            "",
        ];
        for case in cases {
            let once = normalize_standard(case);
            assert_eq!(normalize_standard(&once), once, "case: {case:?}");
        }
    }

    #[test]
    fn matching_normalization_second_pass_is_noop() {
        let cases = [
            ("The Annual Report of the Smith Co.", Language::English),
            ("Histoire de la littérature française", Language::French),
            ("Geschichte der deutschen Literatur", Language::German),
        ];
        for (case, lang) in cases {
            let once = normalize_for_matching(case, lang);
            assert_eq!(normalize_for_matching(&once, lang), once, "case: {case:?}");
        }
    }

    #[test]
    fn matching_normalization_empty_input() {
        assert_eq!(normalize_for_matching("", Language::English), "");
        assert_eq!(normalize_for_matching("   ", Language::English), "");
    }

    #[test]
    fn single_letter_runs_collapse() {
        assert_eq!(normalize_standard("u s a"), "usa");
        assert_eq!(normalize_standard("a book"), "a book");
        assert_eq!(normalize_standard("j k rowling"), "jk rowling");
    }

    #[test]
    fn lccn_variants_share_a_key() {
        let variants = ["n78-890351", "N78890351", " n 78-890351 ", "n78-890351//r75"];
        let keys: Vec<String> = variants.iter().map(|v| normalize_lccn(v)).collect();
        for key in &keys {
            assert_eq!(key, &keys[0]);
        }
    }

    #[test]
    fn lccn_serial_padding() {
        assert_eq!(normalize_lccn("25-12345"), "25012345");
        assert_eq!(normalize_lccn("25-1"), "25000001");
    }

    #[test]
    fn lccn_long_tail_drops_leading_zeros() {
        assert_eq!(normalize_lccn("sn0000123456"), "sn123456");
        assert_eq!(normalize_lccn("sn00123456"), "sn00123456");
    }

    #[test]
    fn year_extraction_bounds() {
        assert_eq!(extract_year("1499"), None);
        assert_eq!(extract_year("1500"), Some(1500));
        assert_eq!(extract_year("2099"), Some(2099));
        assert_eq!(extract_year("2100"), None);
        assert_eq!(extract_year("published 1925, reprinted 1950"), Some(1925));
    }

    #[test]
    fn year_extraction_copyright_prefixes() {
        assert_eq!(extract_year("c1923."), Some(1923));
        assert_eq!(extract_year("©1947"), Some(1947));
        assert_eq!(extract_year("[c1950]"), Some(1950));
        // A four-digit prefix of a longer run is not a year.
        assert_eq!(extract_year("id 19234567"), None);
    }

    #[test]
    fn diacritics_fold_to_ascii() {
        assert_eq!(normalize_standard("Müller"), "muller");
        assert_eq!(normalize_standard("Æsop"), "aesop");
        assert_eq!(normalize_standard("naïve"), "naive");
    }
}
