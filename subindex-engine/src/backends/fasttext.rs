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

//! Embedding classifier backend.
//!
//! The tunable parameters are parsed and handed to the model provider at
//! construction; the backend itself does not interpret them.

use super::score_text;
use crate::models::{EmbeddingParams, ModelProvider, ModelRequest, ScoringModel};
use crate::project::ProjectSettings;
use crate::{Backend, BackendKind};
use async_trait::async_trait;
use std::sync::Arc;
use subindex_core::{Analyzer, ProjectDefinition, Result, SuggestionList, Vocabulary};

pub struct FasttextBackend {
    params: EmbeddingParams,
    analyzer: Analyzer,
    vocabulary: Arc<Vocabulary>,
    model: Arc<dyn ScoringModel>,
}

impl FasttextBackend {
    pub fn new(
        def: &ProjectDefinition,
        settings: &ProjectSettings,
        models: &dyn ModelProvider,
    ) -> Result<Self> {
        let params = EmbeddingParams::from_definition(def)?;
        let model = models.load(&settings.id, &ModelRequest::Embedding(params.clone()))?;
        Ok(Self {
            params,
            analyzer: settings.analyzer.clone(),
            vocabulary: Arc::clone(&settings.vocabulary),
            model,
        })
    }

    pub fn params(&self) -> &EmbeddingParams {
        &self.params
    }
}

#[async_trait]
impl Backend for FasttextBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Fasttext
    }

    async fn suggest(&self, text: &str, limit: usize) -> Result<SuggestionList> {
        Ok(score_text(
            &self.analyzer,
            self.model.as_ref(),
            &self.vocabulary,
            text,
            limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmbeddingModelData, InMemoryModelProvider};
    use std::collections::BTreeMap;
    use subindex_core::{EngineConfig, IndexError, InMemoryVocabularyLoader, SharedVocabularies};

    fn definition() -> ProjectDefinition {
        ProjectDefinition::new("fasttext-en", "fastText", "en", "fasttext", "yso")
            .with_param("dim", 2)
            .with_param("lr", 0.25)
            .with_param("epoch", 5)
            .with_param("loss", "softmax")
            .with_param("chunksize", 4)
    }

    fn settings(def: &ProjectDefinition) -> ProjectSettings {
        let loader = InMemoryVocabularyLoader::new().with(Vocabulary::from_pairs(
            "yso",
            "en",
            [("A", Some("apples")), ("C", Some("cherries"))],
        ));
        let mut vocabs = SharedVocabularies::new(&loader);
        ProjectSettings::resolve(def, BackendKind::Fasttext, &mut vocabs, &EngineConfig::default())
            .unwrap()
    }

    fn provider() -> InMemoryModelProvider {
        let provider = InMemoryModelProvider::new();
        provider.insert_embedding(
            "fasttext-en",
            EmbeddingModelData {
                dim: 2,
                words: BTreeMap::from([
                    ("apples".to_string(), vec![1.0, 0.0]),
                    ("cherries".to_string(), vec![0.0, 1.0]),
                ]),
                concepts: BTreeMap::from([
                    ("A".to_string(), vec![3.0, 0.0]),
                    ("C".to_string(), vec![0.0, 3.0]),
                ]),
            },
        );
        provider
    }

    #[tokio::test]
    async fn test_suggest() {
        let def = definition();
        let backend = FasttextBackend::new(&def, &settings(&def), &provider()).unwrap();
        assert_eq!(backend.params().epoch, Some(5));

        let list = backend.suggest("apples apples cherries", 10).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.as_slice()[0].concept.as_str(), "A");
        assert!(list.iter().all(|s| (0.0..=1.0).contains(&s.score)));
    }

    #[test]
    fn test_malformed_parameter_fails_build() {
        let def = definition().with_param("dim", "wide");
        let err = FasttextBackend::new(&def, &settings(&def), &provider())
            .err()
            .unwrap();
        assert!(matches!(err, IndexError::InvalidParameter { key, .. } if key == "dim"));
    }
}
