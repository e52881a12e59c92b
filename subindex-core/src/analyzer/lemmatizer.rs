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

//! Dictionary and rule based lemmatizer.
//!
//! Irregular forms are looked up in an exception table; regular plurals and
//! verb inflections are reduced by rule. Unlike the stemmer the output is
//! meant to be a dictionary word.

use crate::language::Language;
use std::collections::HashMap;
use std::sync::LazyLock;

static ENGLISH_EXCEPTIONS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    [
        ("am", "be"),
        ("are", "be"),
        ("is", "be"),
        ("was", "be"),
        ("were", "be"),
        ("been", "be"),
        ("being", "be"),
        ("has", "have"),
        ("had", "have"),
        ("having", "have"),
        ("does", "do"),
        ("did", "do"),
        ("done", "do"),
        ("went", "go"),
        ("gone", "go"),
        ("goes", "go"),
        ("made", "make"),
        ("taken", "take"),
        ("took", "take"),
        ("written", "write"),
        ("wrote", "write"),
        ("children", "child"),
        ("men", "man"),
        ("women", "woman"),
        ("mice", "mouse"),
        ("geese", "goose"),
        ("feet", "foot"),
        ("teeth", "tooth"),
        ("people", "person"),
        ("leaves", "leaf"),
        ("knives", "knife"),
        ("wives", "wife"),
        ("lives", "life"),
        ("analyses", "analysis"),
        ("theses", "thesis"),
        ("crises", "crisis"),
        ("criteria", "criterion"),
        ("phenomena", "phenomenon"),
        ("data", "datum"),
        ("better", "good"),
        ("best", "good"),
        ("worse", "bad"),
        ("worst", "bad"),
    ]
    .into_iter()
    .collect()
});

/// Languages with a lemmatizer
pub fn supports(language: Language) -> bool {
    matches!(language, Language::English)
}

/// Lemmatize a lowercased token. Returns `None` for unsupported languages.
pub fn lemmatize(language: Language, word: &str) -> Option<String> {
    match language {
        Language::English => Some(lemmatize_english(word)),
        _ => None,
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

fn undouble(stem: &str) -> String {
    let chars: Vec<char> = stem.chars().collect();
    let n = chars.len();
    if n >= 3
        && chars[n - 1] == chars[n - 2]
        && !is_vowel(chars[n - 1])
        && !matches!(chars[n - 1], 'l' | 's' | 'z')
    {
        chars[..n - 1].iter().collect()
    } else {
        stem.to_string()
    }
}

fn lemmatize_english(word: &str) -> String {
    if let Some(lemma) = ENGLISH_EXCEPTIONS.get(word) {
        return lemma.to_string();
    }
    if word.chars().count() <= 3 {
        return word.to_string();
    }

    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    for suffix in ["sses", "xes", "ches", "shes", "zzes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") && !word.ends_with("is")
    {
        return word[..word.len() - 1].to_string();
    }

    if let Some(stem) = word.strip_suffix("ied") {
        return format!("{}y", stem);
    }
    if let Some(stem) = word.strip_suffix("ing") {
        if stem.chars().count() >= 3 && stem.chars().any(is_vowel) {
            return undouble(stem);
        }
    }
    if let Some(stem) = word.strip_suffix("ed") {
        if stem.chars().count() >= 3 && stem.chars().any(is_vowel) {
            return undouble(stem);
        }
    }

    word.to_string()
}
