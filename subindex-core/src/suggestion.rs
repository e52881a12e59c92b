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

//! Concepts, suggestions and ranked suggestion lists

use crate::vocabulary::Vocabulary;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// A controlled-vocabulary subject identifier (usually a URI).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Concept(String);

impl Concept {
    pub fn new(id: impl Into<String>) -> Self {
        Concept(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Concept {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Concept {
    fn from(id: &str) -> Self {
        Concept(id.to_string())
    }
}

impl From<String> for Concept {
    fn from(id: String) -> Self {
        Concept(id)
    }
}

/// A single (concept, score) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub concept: Concept,

    /// Score in [0.0, 1.0]
    pub score: f64,

    /// Vocabulary label, when the concept has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Suggestion {
    pub fn new(concept: impl Into<Concept>, score: f64) -> Self {
        Self {
            concept: concept.into(),
            score,
            label: None,
        }
    }
}

/// A source that could not answer during an ensemble request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedSource {
    pub project_id: String,
    pub reason: String,
}

impl DegradedSource {
    pub fn new(project_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for DegradedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.project_id, self.reason)
    }
}

/// Ranked, length-bounded list of suggestions.
///
/// Scores are non-increasing and concepts unique. Lists are built once per
/// request and only handed out by value or shared reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionList {
    suggestions: Vec<Suggestion>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    degraded: Vec<DegradedSource>,
}

impl SuggestionList {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a list from raw per-concept scores.
    ///
    /// Concepts outside `vocabulary` and non-finite scores are dropped,
    /// scores are clamped to [0, 1], the list is ordered by score descending
    /// with ties broken by ascending concept id, then truncated to `limit`.
    pub fn from_scores<I, C>(scores: I, vocabulary: &Vocabulary, limit: usize) -> Self
    where
        I: IntoIterator<Item = (C, f64)>,
        C: Into<Concept>,
    {
        let mut best: HashMap<Concept, f64> = HashMap::new();
        let mut dropped = 0usize;

        for (concept, score) in scores {
            let concept = concept.into();
            if !score.is_finite() {
                continue;
            }
            if !vocabulary.contains(&concept) {
                dropped += 1;
                continue;
            }
            let score = score.clamp(0.0, 1.0);
            best.entry(concept)
                .and_modify(|s| {
                    if score > *s {
                        *s = score;
                    }
                })
                .or_insert(score);
        }

        if dropped > 0 {
            debug!(
                "Dropped {} concepts outside vocabulary '{}'",
                dropped,
                vocabulary.id()
            );
        }

        let mut suggestions: Vec<Suggestion> = best
            .into_iter()
            .map(|(concept, score)| {
                let label = vocabulary.label(&concept).map(str::to_string);
                Suggestion {
                    concept,
                    score,
                    label,
                }
            })
            .collect();
        sort_suggestions(&mut suggestions);
        suggestions.truncate(limit);

        Self {
            suggestions,
            degraded: Vec::new(),
        }
    }

    /// Attach the sources that failed while producing this list
    pub fn with_degraded(mut self, degraded: Vec<DegradedSource>) -> Self {
        self.degraded = degraded;
        self
    }

    /// Drop suggestions scoring below `threshold`
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        // Scores are sorted, so everything after the first miss goes too.
        let keep = self
            .suggestions
            .iter()
            .take_while(|s| s.score >= threshold)
            .count();
        self.suggestions.truncate(keep);
        self
    }

    /// Keep at most `limit` suggestions
    pub fn truncated(mut self, limit: usize) -> Self {
        self.suggestions.truncate(limit);
        self
    }

    pub fn len(&self) -> usize {
        self.suggestions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Suggestion> + '_ {
        self.suggestions.iter()
    }

    pub fn as_slice(&self) -> &[Suggestion] {
        &self.suggestions
    }

    /// Score of `concept`, if it was suggested
    pub fn get(&self, concept: &str) -> Option<f64> {
        self.suggestions
            .iter()
            .find(|s| s.concept.as_str() == concept)
            .map(|s| s.score)
    }

    pub fn degraded(&self) -> &[DegradedSource] {
        &self.degraded
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Suggestion>, Vec<DegradedSource>) {
        (self.suggestions, self.degraded)
    }
}

impl<'a> IntoIterator for &'a SuggestionList {
    type Item = &'a Suggestion;
    type IntoIter = std::slice::Iter<'a, Suggestion>;

    fn into_iter(self) -> Self::IntoIter {
        self.suggestions.iter()
    }
}

/// Output ordering: score descending, then concept id ascending
pub fn rank_order(a: &Suggestion, b: &Suggestion) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.concept.cmp(&b.concept))
}

pub fn sort_suggestions(suggestions: &mut [Suggestion]) {
    suggestions.sort_by(rank_order);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn vocab() -> Vocabulary {
        Vocabulary::from_pairs(
            "yso",
            "en",
            [("A", Some("Apples")), ("B", None), ("C", Some("Cherries"))],
        )
    }

    #[test]
    fn test_from_scores_filters_and_orders() {
        let list = SuggestionList::from_scores(
            vec![("B", 0.4), ("X", 0.99), ("A", 0.9), ("C", 0.4)],
            &vocab(),
            10,
        );

        let ids: Vec<&str> = list.iter().map(|s| s.concept.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(list.as_slice()[0].label.as_deref(), Some("Apples"));
        assert!(list.as_slice()[1].label.is_none());
        assert!(list.get("X").is_none());
    }

    #[test]
    fn test_from_scores_clamps_and_dedupes() {
        let list = SuggestionList::from_scores(
            vec![("A", 1.7), ("B", -0.2), ("B", 0.3), ("C", f64::NAN)],
            &vocab(),
            10,
        );

        assert_eq!(list.len(), 2);
        assert_eq!(list.get("A"), Some(1.0));
        assert_eq!(list.get("B"), Some(0.3));
    }

    #[test]
    fn test_threshold_and_limit() {
        let list = SuggestionList::from_scores(vec![("A", 0.9), ("B", 0.5), ("C", 0.1)], &vocab(), 2);
        assert_eq!(list.len(), 2);

        let list = list.with_threshold(0.6);
        assert_eq!(list.len(), 1);
        assert_eq!(list.get("A"), Some(0.9));
    }

    #[test]
    fn test_zero_limit_is_empty() {
        let list = SuggestionList::from_scores(vec![("A", 0.9)], &vocab(), 0);
        assert!(list.is_empty());
    }

    #[test]
    fn test_serialization_skips_empty_degraded() {
        let list = SuggestionList::from_scores(vec![("B", 0.5)], &vocab(), 5);
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(json, r#"{"suggestions":[{"concept":"B","score":0.5}]}"#);

        let degraded = list.with_degraded(vec![DegradedSource::new("maui-en", "timeout")]);
        assert!(degraded.is_degraded());
        assert!(serde_json::to_string(&degraded).unwrap().contains("maui-en"));
    }

    proptest! {
        #[test]
        fn prop_bounded_and_sorted(
            scores in proptest::collection::vec(("[A-E]", 0.0f64..1.0), 0..40),
            limit in 0usize..8,
        ) {
            let vocab = Vocabulary::from_pairs(
                "v",
                "en",
                ["A", "B", "C", "D", "E"].into_iter().map(|c| (c, None::<&str>)),
            );
            let list = SuggestionList::from_scores(scores, &vocab, limit);

            prop_assert!(list.len() <= limit);
            for pair in list.as_slice().windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
                prop_assert!(pair[0].concept != pair[1].concept);
            }
            for s in list.iter() {
                prop_assert!((0.0..=1.0).contains(&s.score));
            }
        }
    }
}
