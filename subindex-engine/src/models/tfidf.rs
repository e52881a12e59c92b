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

//! Term-weighting model
//!
//! The document is turned into a tf-idf vector over the model's known terms
//! and compared with each concept's precomputed reference vector by cosine
//! similarity.

use super::ScoringModel;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Precomputed idf table and per-concept reference vectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfModel {
    idf: HashMap<String, f64>,
    concepts: BTreeMap<String, BTreeMap<String, f64>>,

    #[serde(skip)]
    norms: BTreeMap<String, f64>,
}

impl TfidfModel {
    pub fn new(
        idf: HashMap<String, f64>,
        concepts: BTreeMap<String, BTreeMap<String, f64>>,
    ) -> Self {
        let mut model = Self {
            idf,
            concepts,
            norms: BTreeMap::new(),
        };
        model.compute_norms();
        model
    }

    /// Parse the JSON form and prepare vector norms
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut model: Self = serde_json::from_str(json)?;
        model.compute_norms();
        Ok(model)
    }

    fn compute_norms(&mut self) {
        self.norms = self
            .concepts
            .iter()
            .map(|(concept, vector)| (concept.clone(), l2_norm(vector.values())))
            .collect();
    }

    pub fn num_concepts(&self) -> usize {
        self.concepts.len()
    }

    pub fn num_terms(&self) -> usize {
        self.idf.len()
    }

    /// tf-idf vector of a token sequence; unknown terms are ignored.
    ///
    /// Ordered maps keep every floating point sum in the same order, so
    /// identical tokens always produce bit-identical scores.
    pub fn document_vector(&self, tokens: &[String]) -> BTreeMap<String, f64> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for token in tokens {
            if self.idf.contains_key(token) {
                *counts.entry(token.as_str()).or_insert(0) += 1;
            }
        }

        let total = tokens.len().max(1) as f64;
        counts
            .into_iter()
            .map(|(term, count)| {
                let idf = self.idf.get(term).copied().unwrap_or(0.0);
                (term.to_string(), count as f64 / total * idf)
            })
            .collect()
    }
}

impl ScoringModel for TfidfModel {
    fn score(&self, tokens: &[String]) -> HashMap<String, f64> {
        let doc = self.document_vector(tokens);
        let doc_norm = l2_norm(doc.values());
        if doc_norm == 0.0 {
            return HashMap::new();
        }

        let mut scores = HashMap::new();
        for (concept, vector) in &self.concepts {
            let concept_norm = self.norms.get(concept).copied().unwrap_or(0.0);
            if concept_norm == 0.0 {
                continue;
            }

            let dot: f64 = doc
                .iter()
                .filter_map(|(t, w)| vector.get(t).map(|v| w * v))
                .sum();

            if dot > 0.0 {
                scores.insert(concept.clone(), dot / (doc_norm * concept_norm));
            }
        }
        scores
    }
}

fn l2_norm<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    values.map(|v| v * v).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn model() -> TfidfModel {
        let idf = HashMap::from([
            ("apple".to_string(), 2.0),
            ("cherry".to_string(), 2.0),
            ("fruit".to_string(), 0.5),
        ]);
        let concepts = BTreeMap::from([
            (
                "A".to_string(),
                BTreeMap::from([("apple".to_string(), 1.0), ("fruit".to_string(), 0.2)]),
            ),
            ("C".to_string(), BTreeMap::from([("cherry".to_string(), 1.0)])),
        ]);
        TfidfModel::new(idf, concepts)
    }

    #[test]
    fn test_cosine_scores() {
        let scores = model().score(&tokens(&["apple", "apple", "fruit"]));
        assert!(scores["A"] > 0.9 && scores["A"] <= 1.0);
        assert!(!scores.contains_key("C"));
    }

    #[test]
    fn test_identical_direction_scores_one() {
        let scores = model().score(&tokens(&["cherry"]));
        assert!((scores["C"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_tokens_score_nothing() {
        assert!(model().score(&tokens(&["banana"])).is_empty());
        assert!(model().score(&[]).is_empty());
    }

    #[test]
    fn test_json_round_trip_restores_norms() {
        let json = serde_json::to_string(&model()).unwrap();
        let loaded = TfidfModel::from_json(&json).unwrap();
        assert_eq!(loaded.num_concepts(), 2);
        assert_eq!(loaded.num_terms(), 3);
        assert_eq!(
            loaded.score(&tokens(&["cherry"])),
            model().score(&tokens(&["cherry"]))
        );
    }
}
