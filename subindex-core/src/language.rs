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

//! Language table
//!
//! Projects declare their language as an ISO 639-1 code, while analyzer
//! arguments usually name it (`snowball(english)`). Both forms resolve here.

use serde::{Deserialize, Serialize};

/// Languages known to the analyzer pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    /// English
    English,
    /// German
    German,
    /// Finnish
    Finnish,
    /// Swedish
    Swedish,
    /// French
    French,
    /// Spanish
    Spanish,
}

impl Language {
    /// Get ISO 639-1 language code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::German => "de",
            Self::Finnish => "fi",
            Self::Swedish => "sv",
            Self::French => "fr",
            Self::Spanish => "es",
        }
    }

    /// Get the English language name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::English => "english",
            Self::German => "german",
            Self::Finnish => "finnish",
            Self::Swedish => "swedish",
            Self::French => "french",
            Self::Spanish => "spanish",
        }
    }

    /// Parse from a code or a name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Some(Self::English),
            "de" | "german" | "deutsch" => Some(Self::German),
            "fi" | "finnish" | "suomi" => Some(Self::Finnish),
            "sv" | "swedish" | "svenska" => Some(Self::Swedish),
            "fr" | "french" | "français" => Some(Self::French),
            "es" | "spanish" | "español" => Some(Self::Spanish),
            _ => None,
        }
    }

    /// Get all known languages.
    pub fn all() -> &'static [Language] {
        &[
            Self::English,
            Self::German,
            Self::Finnish,
            Self::Swedish,
            Self::French,
            Self::Spanish,
        ]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Normalize a language code or name to its code.
///
/// Unknown languages are returned lowercased so that projects in languages
/// without analyzer support can still use the `simple` analyzer.
pub fn normalize_code(s: &str) -> String {
    Language::parse(s)
        .map(|l| l.code().to_string())
        .unwrap_or_else(|| s.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::English.code(), "en");
        assert_eq!(Language::Finnish.code(), "fi");
        assert_eq!(Language::Swedish.code(), "sv");
    }

    #[test]
    fn test_language_parse() {
        assert_eq!(Language::parse("en"), Some(Language::English));
        assert_eq!(Language::parse("English"), Some(Language::English));
        assert_eq!(Language::parse("suomi"), Some(Language::Finnish));
        assert_eq!(Language::parse("xx"), None);
    }

    #[test]
    fn test_all_round_trip_through_code() {
        for lang in Language::all() {
            assert_eq!(Language::parse(lang.code()), Some(*lang));
            assert_eq!(Language::parse(lang.name()), Some(*lang));
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("English"), "en");
        assert_eq!(normalize_code("LA"), "la");
    }
}
