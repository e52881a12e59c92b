// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Suffix-stripping stemmers.
//!
//! English follows the first steps of Porter's algorithm (plurals, -ed/-ing,
//! terminal y, common derivational endings). German, Finnish and Swedish
//! strip the longest matching inflectional suffix that leaves a stem of at
//! least three characters.

use crate::language::Language;

const MIN_STEM_CHARS: usize = 3;

const GERMAN_SUFFIXES: &[&str] = &[
    "heiten", "keiten", "ungen", "heit", "keit", "ung", "ern", "em", "en", "er", "es", "e", "s",
];

const FINNISH_SUFFIXES: &[&str] = &[
    "tten", "issa", "issä", "ista", "istä", "illa", "illä", "ilta", "iltä", "ille", "ssa", "ssä",
    "sta", "stä", "lla", "llä", "lta", "ltä", "lle", "ksi", "ine", "iin", "ien", "jen", "den",
    "na", "nä", "en", "an", "än", "in", "ja", "jä", "n", "t", "a", "ä", "i",
];

const SWEDISH_SUFFIXES: &[&str] = &[
    "heterna", "hetens", "arna", "erna", "orna", "ande", "arne", "aste", "aren", "ades", "erns",
    "ade", "are", "ern", "ens", "het", "ast", "ad", "en", "ar", "er", "or", "as", "es", "at",
    "a", "e", "s",
];

const ENGLISH_DERIVATIONAL: &[(&str, &str)] = &[
    ("ational", "ate"),
    ("ization", "ize"),
    ("fulness", "ful"),
    ("iveness", "ive"),
    ("ousness", "ous"),
    ("tional", "tion"),
    ("biliti", "ble"),
    ("alism", "al"),
    ("ation", "ate"),
    ("ness", ""),
];

/// Languages with a stemmer
pub fn supports(language: Language) -> bool {
    matches!(
        language,
        Language::English | Language::German | Language::Finnish | Language::Swedish
    )
}

/// Stem a lowercased token. Returns `None` for unsupported languages.
pub fn stem(language: Language, word: &str) -> Option<String> {
    let stemmed = match language {
        Language::English => stem_english(word),
        Language::German => strip_longest(word, GERMAN_SUFFIXES),
        Language::Finnish => strip_longest(word, FINNISH_SUFFIXES),
        Language::Swedish => strip_longest(word, SWEDISH_SUFFIXES),
        _ => return None,
    };
    Some(stemmed)
}

fn strip_longest(word: &str, suffixes: &[&str]) -> String {
    suffixes
        .iter()
        .filter(|suffix| word.ends_with(**suffix))
        .filter(|suffix| word.chars().count() - suffix.chars().count() >= MIN_STEM_CHARS)
        .max_by_key(|suffix| suffix.len())
        .map(|suffix| word[..word.len() - suffix.len()].to_string())
        .unwrap_or_else(|| word.to_string())
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

fn has_vowel(s: &str) -> bool {
    s.chars().any(is_vowel)
}

fn stem_english(word: &str) -> String {
    if word.chars().count() <= 3 {
        return word.to_string();
    }

    let mut w = word.to_string();

    // Plurals
    if w.ends_with("sses") || w.ends_with("ies") {
        w.truncate(w.len() - 2);
    } else if w.ends_with('s') && !w.ends_with("ss") && !w.ends_with("us") && !w.ends_with("is")
    {
        w.pop();
    }

    // -ed / -ing
    let mut stripped = false;
    for suffix in ["ingly", "edly", "ing", "ed"] {
        if let Some(stem) = w.strip_suffix(suffix) {
            if stem.chars().count() >= 2 && has_vowel(stem) {
                w = stem.to_string();
                stripped = true;
            }
            break;
        }
    }
    if stripped {
        if w.ends_with("at") || w.ends_with("bl") || w.ends_with("iz") {
            w.push('e');
        } else {
            let chars: Vec<char> = w.chars().collect();
            let n = chars.len();
            if n >= 2
                && chars[n - 1] == chars[n - 2]
                && !is_vowel(chars[n - 1])
                && !matches!(chars[n - 1], 'l' | 's' | 'z')
            {
                w.pop();
            }
        }
    }

    // Terminal y after a consonant
    let chars: Vec<char> = w.chars().collect();
    let n = chars.len();
    if n > 2 && chars[n - 1] == 'y' && !is_vowel(chars[n - 2]) {
        w.pop();
        w.push('i');
    }

    for (suffix, replacement) in ENGLISH_DERIVATIONAL {
        if let Some(stem) = w.strip_suffix(suffix) {
            if stem.chars().count() >= 2 {
                w = format!("{}{}", stem, replacement);
            }
            break;
        }
    }

    w
}
