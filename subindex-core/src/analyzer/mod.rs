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

//! Analyzer pipeline
//!
//! Text → tokenizer → (stemmer | lemmatizer) → tokens
//!
//! Analyzers are declared in project configuration as `family` or
//! `family(arguments)`, e.g. `simple`, `snowball(english)` or
//! `lemma(en, token_min_length=2)`. The first positional argument names the
//! language; `key=value` arguments become analyzer parameters.
//!
//! Every analyzer is resolved once when its project is built, so an
//! unsupported family/language combination fails registry construction
//! instead of the first request.

mod lemmatizer;
mod stemmer;
mod tokenizer;

pub use tokenizer::{is_valid_token, tokenize, DEFAULT_TOKEN_MIN_LENGTH};

use crate::error::{IndexError, Result};
use crate::language::{normalize_code, Language};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static ANALYZER_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_-]*)\s*(?:\((.*)\))?\s*$").expect("valid analyzer regex")
});

/// Analyzer families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerFamily {
    /// Lowercased word tokens
    Simple,
    /// Tokens reduced by a suffix-stripping stemmer
    Stemming,
    /// Tokens reduced to dictionary lemmas
    Lemmatizing,
}

impl AnalyzerFamily {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "simple" => Some(Self::Simple),
            "snowball" | "stemming" | "stem" => Some(Self::Stemming),
            "lemma" | "lemmatizing" | "lemmatizer" => Some(Self::Lemmatizing),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Stemming => "snowball",
            Self::Lemmatizing => "lemma",
        }
    }
}

/// Declared analyzer: language, family and parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerSpec {
    pub language: String,
    pub family: AnalyzerFamily,
    pub params: BTreeMap<String, String>,
}

impl AnalyzerSpec {
    pub fn new(language: impl Into<String>, family: AnalyzerFamily) -> Self {
        Self {
            language: normalize_code(&language.into()),
            family,
            params: BTreeMap::new(),
        }
    }

    /// Parse an analyzer declaration.
    ///
    /// `default_language` is used when the declaration names no language.
    pub fn parse(declaration: &str, default_language: &str) -> Result<Self> {
        let unsupported = || IndexError::UnsupportedAnalyzer {
            language: default_language.to_string(),
            analyzer: declaration.to_string(),
        };

        let caps = ANALYZER_SYNTAX.captures(declaration).ok_or_else(unsupported)?;
        let family = AnalyzerFamily::parse(&caps[1]).ok_or_else(unsupported)?;

        let mut language = normalize_code(default_language);
        let mut params = BTreeMap::new();
        if let Some(args) = caps.get(2) {
            let mut positional = 0;
            for arg in args.as_str().split(',').map(str::trim).filter(|a| !a.is_empty()) {
                match arg.split_once('=') {
                    Some((key, value)) => {
                        params.insert(key.trim().to_string(), value.trim().to_string());
                    }
                    None if positional == 0 => {
                        language = normalize_code(arg);
                        positional += 1;
                    }
                    None => return Err(unsupported()),
                }
            }
        }

        Ok(Self {
            language,
            family,
            params,
        })
    }

    pub fn token_min_length(&self) -> Result<usize> {
        match self.params.get("token_min_length") {
            None => Ok(DEFAULT_TOKEN_MIN_LENGTH),
            Some(value) => value.parse().map_err(|_| IndexError::Config(format!(
                "analyzer parameter token_min_length must be a non-negative integer, got '{}'",
                value
            ))),
        }
    }
}

impl std::fmt::Display for AnalyzerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}", self.family.name(), self.language)?;
        for (key, value) in &self.params {
            write!(f, ", {}={}", key, value)?;
        }
        f.write_str(")")
    }
}

/// A resolved, ready-to-run analyzer
#[derive(Debug, Clone)]
pub struct Analyzer {
    spec: AnalyzerSpec,
    language: Option<Language>,
    min_length: usize,
}

impl Analyzer {
    /// Resolve a declaration, failing with `UnsupportedAnalyzer` when the
    /// family has no implementation for its language.
    pub fn from_spec(spec: &AnalyzerSpec) -> Result<Self> {
        let language = Language::parse(&spec.language);
        let supported = match (spec.family, language) {
            (AnalyzerFamily::Simple, _) => true,
            (AnalyzerFamily::Stemming, Some(lang)) => stemmer::supports(lang),
            (AnalyzerFamily::Lemmatizing, Some(lang)) => lemmatizer::supports(lang),
            (_, None) => false,
        };
        if !supported {
            return Err(IndexError::UnsupportedAnalyzer {
                language: spec.language.clone(),
                analyzer: spec.family.name().to_string(),
            });
        }

        Ok(Self {
            spec: spec.clone(),
            language,
            min_length: spec.token_min_length()?,
        })
    }

    pub fn spec(&self) -> &AnalyzerSpec {
        &self.spec
    }

    /// Analyze text into normalized tokens
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let tokens = tokenize(text, self.min_length);
        match (self.spec.family, self.language) {
            (AnalyzerFamily::Stemming, Some(lang)) => tokens
                .into_iter()
                .map(|t| stemmer::stem(lang, &t).unwrap_or(t))
                .collect(),
            (AnalyzerFamily::Lemmatizing, Some(lang)) => tokens
                .into_iter()
                .map(|t| lemmatizer::lemmatize(lang, &t).unwrap_or(t))
                .collect(),
            _ => tokens,
        }
    }
}

/// Analyze `text` with a freshly resolved analyzer.
pub fn analyze(language: &str, spec: &AnalyzerSpec, text: &str) -> Result<Vec<String>> {
    let language = normalize_code(language);
    if language != spec.language {
        return Err(IndexError::UnsupportedAnalyzer {
            language,
            analyzer: spec.to_string(),
        });
    }
    Ok(Analyzer::from_spec(spec)?.analyze(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let spec = AnalyzerSpec::parse("simple", "en").unwrap();
        assert_eq!(spec.family, AnalyzerFamily::Simple);
        assert_eq!(spec.language, "en");
        assert!(spec.params.is_empty());
    }

    #[test]
    fn test_parse_with_language_and_params() {
        let spec = AnalyzerSpec::parse("snowball(english, token_min_length=2)", "fi").unwrap();
        assert_eq!(spec.family, AnalyzerFamily::Stemming);
        assert_eq!(spec.language, "en");
        assert_eq!(spec.params.get("token_min_length").map(String::as_str), Some("2"));
        assert_eq!(spec.to_string(), "snowball(en, token_min_length=2)");
    }

    #[test]
    fn test_parse_rejects_unknown_family() {
        let err = AnalyzerSpec::parse("voikko(fi)", "fi").unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedAnalyzer { .. }));
        assert!(AnalyzerSpec::parse("snowball(en, fi)", "en").is_err());
        assert!(AnalyzerSpec::parse("snow ball", "en").is_err());
    }

    #[test]
    fn test_unsupported_combination_fails_at_resolution() {
        let spec = AnalyzerSpec::parse("lemma", "fi").unwrap();
        let err = Analyzer::from_spec(&spec).unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedAnalyzer { .. }));

        let spec = AnalyzerSpec::parse("snowball", "la").unwrap();
        assert!(Analyzer::from_spec(&spec).is_err());

        // The simple analyzer works for any language
        let spec = AnalyzerSpec::parse("simple", "la").unwrap();
        assert!(Analyzer::from_spec(&spec).is_ok());
    }

    #[test]
    fn test_stemming_analyzer() {
        let spec = AnalyzerSpec::parse("snowball(english)", "en").unwrap();
        let analyzer = Analyzer::from_spec(&spec).unwrap();
        assert_eq!(
            analyzer.analyze("Running cats, hopping ponies."),
            vec!["run", "cat", "hop", "poni"]
        );
    }

    #[test]
    fn test_lemmatizing_analyzer() {
        let spec = AnalyzerSpec::parse("lemma", "en").unwrap();
        let analyzer = Analyzer::from_spec(&spec).unwrap();
        assert_eq!(
            analyzer.analyze("Children studied libraries"),
            vec!["child", "study", "library"]
        );
    }

    #[test]
    fn test_analyze_is_deterministic() {
        let spec = AnalyzerSpec::new("en", AnalyzerFamily::Stemming);
        let text = "Archives and libraries catalogue their collections";
        let first = analyze("en", &spec, text).unwrap();
        let second = analyze("english", &spec, text).unwrap();
        assert_eq!(first, second);
        assert!(analyze("fi", &spec, text).is_err());
    }

    #[test]
    fn test_bad_token_min_length() {
        let spec = AnalyzerSpec::parse("simple(en, token_min_length=x)", "en").unwrap();
        assert!(matches!(Analyzer::from_spec(&spec), Err(IndexError::Config(_))));
    }
}
