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

//! Score calibration for `pav` ensembles
//!
//! Each source of a `pav` ensemble has one model: a set of per-concept
//! isotonic regressions (pool adjacent violators) that turn the raw score of
//! that source into a probability. A regression is stored as its threshold
//! points and evaluated by linear interpolation, clipped at both ends.
//! Concepts without a regression keep their raw score.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use subindex_core::{SuggestionList, Vocabulary};

/// Piecewise-linear, non-decreasing map from raw to calibrated score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Thresholds")]
pub struct Calibrator {
    x: Vec<f64>,
    y: Vec<f64>,
}

#[derive(Deserialize)]
struct Thresholds {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl TryFrom<Thresholds> for Calibrator {
    type Error = String;

    fn try_from(t: Thresholds) -> std::result::Result<Self, Self::Error> {
        Calibrator::new(t.x, t.y)
    }
}

impl Calibrator {
    /// Build from threshold points; `x` must be non-decreasing
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> std::result::Result<Self, String> {
        if x.is_empty() {
            return Err("calibrator has no threshold points".to_string());
        }
        if x.len() != y.len() {
            return Err(format!(
                "calibrator has {} x thresholds but {} y thresholds",
                x.len(),
                y.len()
            ));
        }
        if x.iter().chain(&y).any(|v| !v.is_finite()) {
            return Err("calibrator thresholds must be finite".to_string());
        }
        if x.windows(2).any(|w| w[0] > w[1]) {
            return Err("calibrator x thresholds must be non-decreasing".to_string());
        }
        Ok(Self { x, y })
    }

    pub fn predict(&self, score: f64) -> f64 {
        let last = self.x.len() - 1;
        if score <= self.x[0] {
            return self.y[0];
        }
        if score >= self.x[last] {
            return self.y[last];
        }

        // x[upper - 1] <= score < x[upper]
        let upper = self.x.partition_point(|&x| x <= score);
        let (x0, x1) = (self.x[upper - 1], self.x[upper]);
        let (y0, y1) = (self.y[upper - 1], self.y[upper]);
        y0 + (score - x0) * (y1 - y0) / (x1 - x0)
    }
}

/// Calibrators of one source, keyed by concept id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PavModel {
    concepts: BTreeMap<String, Calibrator>,
}

impl PavModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concept(mut self, concept: impl Into<String>, calibrator: Calibrator) -> Self {
        self.concepts.insert(concept.into(), calibrator);
        self
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Calibrated score of `concept`, or `score` itself without a regression
    pub fn calibrate_score(&self, concept: &str, score: f64) -> f64 {
        match self.concepts.get(concept) {
            Some(calibrator) => calibrator.predict(score),
            None => score,
        }
    }

    /// Calibrate a whole source list and re-rank it
    pub fn calibrate(&self, list: SuggestionList, vocabulary: &Vocabulary) -> SuggestionList {
        let limit = list.len();
        let (suggestions, degraded) = list.into_parts();
        SuggestionList::from_scores(
            suggestions.into_iter().map(|s| {
                let score = self.calibrate_score(s.concept.as_str(), s.score);
                (s.concept, score)
            }),
            vocabulary,
            limit,
        )
        .with_degraded(degraded)
    }
}
