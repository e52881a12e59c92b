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

//! Ensemble backend
//!
//! Runs every source project on the same text, concurrently and under one
//! deadline, then fuses the lists: the combined score of a concept is
//!
//! ```text
//! Σ wᵢ·sᵢ / Σ wᵢ
//! ```
//!
//! over all declared sources, where `sᵢ` is 0 when source `i` did not
//! suggest the concept or failed. With the default weight of 1 this is the
//! plain mean with zero fill.
//!
//! A `pav` ensemble first maps each source list through that source's
//! calibration model, then fuses the calibrated lists the same way.
//!
//! A source that fails, whatever the error, is reported as degraded and
//! contributes nothing. Only when every source failed does the request
//! fail.

use super::parse_timeout;
use crate::models::PavModel;
use crate::project::SuggestParams;
use crate::registry::ProjectRegistry;
use crate::{Backend, BackendKind};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use subindex_core::{
    parse_sources, Concept, DegradedSource, EngineConfig, IndexError, ProjectDefinition, Result,
    SourceRef, SuggestionList, Vocabulary,
};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Parameter keys of the ensemble backend
pub const ENSEMBLE_KEYS: [&str; 3] = ["sources", "source_limit", "timeout"];

/// Validated ensemble parameters
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleConfig {
    pub sources: Vec<SourceRef>,

    /// Minimum number of suggestions fetched from each source
    pub source_limit: usize,

    /// Deadline for all sources of one request
    pub timeout: Duration,
}

impl EnsembleConfig {
    pub fn from_definition(def: &ProjectDefinition, engine: &EngineConfig) -> Result<Self> {
        let sources = def.param("sources").ok_or_else(|| IndexError::MissingKey {
            project_id: def.id.clone(),
            key: "sources".to_string(),
        })?;

        Ok(Self {
            sources: parse_sources(&def.id, sources)?,
            source_limit: def.parse_param("source_limit")?.unwrap_or(0),
            timeout: parse_timeout(def, engine.ensemble_timeout_secs)?,
        })
    }

    pub fn total_weight(&self) -> f64 {
        self.sources.iter().map(|s| s.weight).sum()
    }
}

pub struct EnsembleBackend {
    project_id: String,
    config: EnsembleConfig,
    vocabulary: Arc<Vocabulary>,
    registry: Weak<ProjectRegistry>,
    /// One calibration model per source, in source order
    calibration: Option<Vec<Arc<PavModel>>>,
}

/// Weighted source lists ready for [`fuse`], plus the degraded sources
type Merged = (Vec<(f64, Option<SuggestionList>)>, Vec<DegradedSource>);

impl EnsembleBackend {
    pub fn new(
        project_id: impl Into<String>,
        config: EnsembleConfig,
        vocabulary: Arc<Vocabulary>,
        registry: Weak<ProjectRegistry>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            config,
            vocabulary,
            registry,
            calibration: None,
        }
    }

    /// Calibrate source scores before fusing, turning this into a `pav`
    /// ensemble. `models` follow the order of the configured sources; a
    /// source without a model keeps its raw scores.
    pub fn with_calibration(mut self, models: Vec<Arc<PavModel>>) -> Self {
        self.calibration = Some(models);
        self
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    /// Run all sources, returning one outcome per declared source and
    /// whether the deadline passed.
    ///
    /// `None` marks a source that produced no outcome: it missed the
    /// deadline or its task failed.
    async fn run_sources(
        &self,
        registry: &ProjectRegistry,
        text: &str,
        limit: usize,
    ) -> Result<(Vec<Option<Result<SuggestionList>>>, bool)> {
        let params = SuggestParams::with_limit(limit.max(self.config.source_limit));

        let mut tasks = JoinSet::new();
        for (index, source) in self.config.sources.iter().enumerate() {
            let project = registry.resolve(&source.project_id)?;
            let text = text.to_string();
            tasks.spawn(async move { (index, project.suggest_with(&text, params).await) });
        }

        let deadline = Instant::now() + self.config.timeout;
        let mut outcomes: Vec<Option<Result<SuggestionList>>> =
            (0..self.config.sources.len()).map(|_| None).collect();
        let mut timed_out = false;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, outcome)))) => outcomes[index] = Some(outcome),
                Ok(Some(Err(e))) => {
                    error!("Source task of ensemble {} failed: {}", self.project_id, e);
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Ensemble {}: {} sources missed the {:.1}s deadline",
                        self.project_id,
                        tasks.len(),
                        self.config.timeout.as_secs_f64()
                    );
                    timed_out = true;
                    break;
                }
            }
        }
        // Dropping the set aborts every unfinished source task
        drop(tasks);

        Ok((outcomes, timed_out))
    }

    /// Sort source outcomes into weighted lists and degraded sources.
    ///
    /// Fails with `AllSourcesUnavailable` when no source answered.
    fn merge_outcomes(
        &self,
        outcomes: Vec<Option<Result<SuggestionList>>>,
        timed_out: bool,
    ) -> Result<Merged> {
        let mut lists = Vec::with_capacity(outcomes.len());
        let mut degraded = Vec::new();

        for (index, (source, outcome)) in self.config.sources.iter().zip(outcomes).enumerate() {
            match outcome {
                Some(Ok(list)) => {
                    let model = self.calibration.as_ref().and_then(|m| m.get(index));
                    let list = match model {
                        Some(model) => model.calibrate(list, &self.vocabulary),
                        None => list,
                    };
                    degraded.extend(list.degraded().iter().cloned());
                    lists.push((source.weight, Some(list)));
                }
                Some(Err(e)) => {
                    if e.is_unavailable() {
                        warn!(
                            "Ensemble {}: source {} unavailable: {}",
                            self.project_id, source.project_id, e
                        );
                    } else {
                        error!(
                            "Ensemble {}: source {} failed: {}",
                            self.project_id, source.project_id, e
                        );
                    }
                    degraded.push(DegradedSource::new(&source.project_id, e.to_string()));
                    lists.push((source.weight, None));
                }
                None => {
                    let reason = if timed_out {
                        format!("no answer within {:.1}s", self.config.timeout.as_secs_f64())
                    } else {
                        "source task failed".to_string()
                    };
                    warn!(
                        "Ensemble {}: source {} did not answer: {}",
                        self.project_id, source.project_id, reason
                    );
                    degraded.push(DegradedSource::new(&source.project_id, reason));
                    lists.push((source.weight, None));
                }
            }
        }

        if lists.iter().all(|(_, list)| list.is_none()) {
            return Err(IndexError::AllSourcesUnavailable {
                project_id: self.project_id.clone(),
                failures: degraded,
            });
        }
        Ok((lists, degraded))
    }
}

#[async_trait]
impl Backend for EnsembleBackend {
    fn kind(&self) -> BackendKind {
        if self.is_calibrated() {
            BackendKind::Pav
        } else {
            BackendKind::Ensemble
        }
    }

    fn sources(&self) -> &[SourceRef] {
        &self.config.sources
    }

    async fn suggest(&self, text: &str, limit: usize) -> Result<SuggestionList> {
        if limit == 0 || text.trim().is_empty() {
            return Ok(SuggestionList::empty());
        }

        let registry = self.registry.upgrade().ok_or_else(|| {
            IndexError::unavailable(&self.project_id, "project registry has been dropped")
        })?;
        let (outcomes, timed_out) = self.run_sources(&registry, text, limit).await?;
        let (lists, degraded) = self.merge_outcomes(outcomes, timed_out)?;

        let inputs: Vec<(f64, Option<&SuggestionList>)> =
            lists.iter().map(|(w, list)| (*w, list.as_ref())).collect();
        let fused = fuse(&inputs, &self.vocabulary, limit);

        debug!(
            "Ensemble {} fused {}/{} sources into {} suggestions",
            self.project_id,
            lists.iter().filter(|(_, list)| list.is_some()).count(),
            self.config.sources.len(),
            fused.len()
        );
        Ok(fused.with_degraded(degraded))
    }
}

/// Combine weighted source lists into one ranked list.
///
/// A `None` list stands for a failed source: its weight still counts in
/// the denominator. Terms are summed in source order so that identical
/// inputs always give bit-identical scores.
pub fn fuse(
    sources: &[(f64, Option<&SuggestionList>)],
    vocabulary: &Vocabulary,
    limit: usize,
) -> SuggestionList {
    let total_weight: f64 = sources.iter().map(|(weight, _)| weight).sum();
    if total_weight <= 0.0 {
        return SuggestionList::empty();
    }

    let mut combined: BTreeMap<&Concept, f64> = BTreeMap::new();
    for (weight, list) in sources {
        let Some(list) = list else { continue };
        for suggestion in list.iter() {
            *combined.entry(&suggestion.concept).or_insert(0.0) += weight * suggestion.score;
        }
    }

    SuggestionList::from_scores(
        combined
            .into_iter()
            .map(|(concept, sum)| (concept.clone(), sum / total_weight)),
        vocabulary,
        limit,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn vocabulary() -> Vocabulary {
        Vocabulary::from_pairs(
            "yso",
            "en",
            [("A", Some("a")), ("B", Some("b")), ("C", Some("c"))],
        )
    }

    fn list(scores: &[(&str, f64)]) -> SuggestionList {
        SuggestionList::from_scores(scores.iter().map(|(c, s)| (*c, *s)), &vocabulary(), 100)
    }

    #[test]
    fn test_mean_with_zero_fill() {
        let tfidf = list(&[("A", 0.9), ("B", 0.4)]);
        let fasttext = list(&[("A", 0.7)]);
        let fused = fuse(
            &[(1.0, Some(&tfidf)), (1.0, Some(&fasttext)), (1.0, None)],
            &vocabulary(),
            10,
        );

        let concepts: Vec<&str> = fused.iter().map(|s| s.concept.as_str()).collect();
        assert_eq!(concepts, vec!["A", "B"]);
        assert_eq!(fused.get("A"), Some((0.9 + 0.7) / 3.0));
        assert_eq!(fused.get("B"), Some(0.4 / 3.0));
    }

    #[test]
    fn test_weights() {
        let a = list(&[("A", 1.0)]);
        let b = list(&[("B", 1.0)]);
        let fused = fuse(&[(3.0, Some(&a)), (1.0, Some(&b))], &vocabulary(), 10);
        assert_eq!(fused.get("A"), Some(0.75));
        assert_eq!(fused.get("B"), Some(0.25));
    }

    #[test]
    fn test_ties_break_by_concept_and_limit_applies() {
        let a = list(&[("C", 0.5), ("B", 0.5)]);
        let b = list(&[("A", 0.5), ("C", 0.5)]);
        let fused = fuse(&[(1.0, Some(&a)), (1.0, Some(&b))], &vocabulary(), 2);

        let concepts: Vec<&str> = fused.iter().map(|s| s.concept.as_str()).collect();
        assert_eq!(concepts, vec!["C", "A"]);
    }

    #[test]
    fn test_filters_to_own_vocabulary() {
        let a = list(&[("A", 0.8), ("C", 0.6)]);
        let narrow = Vocabulary::from_pairs("yso", "en", [("A", Some("a"))]);
        let fused = fuse(&[(1.0, Some(&a))], &narrow, 10);
        assert_eq!(fused.len(), 1);
        assert!(fused.get("C").is_none());
    }

    #[test]
    fn test_config_from_definition() {
        let def = ProjectDefinition::new("ensemble-en", "Ensemble", "en", "ensemble", "yso")
            .with_param("sources", "tfidf-en:2,fasttext-en")
            .with_param("source_limit", 50)
            .with_param("timeout", 5);
        let config = EnsembleConfig::from_definition(&def, &EngineConfig::default()).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.total_weight(), 3.0);
        assert_eq!(config.source_limit, 50);
        assert_eq!(config.timeout, Duration::from_secs(5));

        let missing = ProjectDefinition::new("ensemble-en", "Ensemble", "en", "ensemble", "yso");
        assert!(matches!(
            EnsembleConfig::from_definition(&missing, &EngineConfig::default()),
            Err(IndexError::MissingKey { .. })
        ));
    }

    fn backend(sources: &str) -> EnsembleBackend {
        let def = ProjectDefinition::new("ens", "Ensemble", "en", "ensemble", "yso")
            .with_param("sources", sources);
        let config = EnsembleConfig::from_definition(&def, &EngineConfig::default()).unwrap();
        EnsembleBackend::new("ens", config, Arc::new(vocabulary()), Weak::new())
    }

    #[test]
    fn test_any_source_error_degrades() {
        let ensemble = backend("tfidf-en,fasttext-en,maui-en");
        let outcomes = vec![
            Some(Ok(list(&[("A", 0.9)]))),
            Some(Err(IndexError::InvalidModel {
                project_id: "fasttext-en".to_string(),
                reason: "corrupt".to_string(),
            })),
            Some(Err(IndexError::unavailable("maui-en", "503"))),
        ];

        let (lists, degraded) = ensemble.merge_outcomes(outcomes, false).unwrap();
        assert_eq!(lists.len(), 3);
        assert!(lists[1].1.is_none());
        let ids: Vec<&str> = degraded.iter().map(|d| d.project_id.as_str()).collect();
        assert_eq!(ids, vec!["fasttext-en", "maui-en"]);
    }

    #[test]
    fn test_no_answer_fails_with_every_reason() {
        let ensemble = backend("tfidf-en,maui-en");
        let outcomes = vec![
            None,
            Some(Err(IndexError::unavailable("maui-en", "connection refused"))),
        ];

        match ensemble.merge_outcomes(outcomes, true).unwrap_err() {
            IndexError::AllSourcesUnavailable { project_id, failures } => {
                assert_eq!(project_id, "ens");
                assert_eq!(failures.len(), 2);
                assert!(failures[0].reason.contains("no answer"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_calibration_applies_per_source() {
        let halve = PavModel::new().with_concept(
            "A",
            crate::models::Calibrator::new(vec![0.0, 1.0], vec![0.0, 0.5]).unwrap(),
        );
        let ensemble = backend("tfidf-en,fasttext-en")
            .with_calibration(vec![Arc::new(halve), Arc::new(PavModel::new())]);
        assert!(ensemble.is_calibrated());
        assert_eq!(ensemble.kind(), BackendKind::Pav);

        let outcomes = vec![
            Some(Ok(list(&[("A", 0.8), ("B", 0.6)]))),
            Some(Ok(list(&[("A", 0.8)]))),
        ];
        let (lists, _) = ensemble.merge_outcomes(outcomes, false).unwrap();
        let first = lists[0].1.as_ref().unwrap();
        assert_eq!(first.as_slice()[0].concept.as_str(), "B");
        assert!((first.get("A").unwrap() - 0.4).abs() < 1e-12);
        assert_eq!(lists[1].1.as_ref().unwrap().get("A"), Some(0.8));
    }

    proptest! {
        #[test]
        fn prop_two_of_three(s1 in 0.0f64..=1.0, s2 in 0.0f64..=1.0) {
            let first = list(&[("A", s1)]);
            let second = list(&[("A", s2)]);
            let third = list(&[("B", 0.5)]);
            let fused = fuse(
                &[(1.0, Some(&first)), (1.0, Some(&second)), (1.0, Some(&third))],
                &vocabulary(),
                10,
            );
            prop_assert_eq!(fused.get("A"), Some((s1 + s2 + 0.0) / 3.0));
        }

        #[test]
        fn prop_fused_list_is_bounded_and_sorted(
            scores in prop::collection::vec((0usize..3, 0.0f64..=1.0), 0..12),
            limit in 0usize..5,
        ) {
            let ids = ["A", "B", "C"];
            let source = list(
                &scores.iter().map(|(i, s)| (ids[*i], *s)).collect::<Vec<_>>(),
            );
            let fused = fuse(&[(1.0, Some(&source)), (1.0, None)], &vocabulary(), limit);
            prop_assert!(fused.len() <= limit);
            let all: Vec<f64> = fused.iter().map(|s| s.score).collect();
            prop_assert!(all.windows(2).all(|w| w[0] >= w[1]));
        }
    }
}
