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

//! Statistical term-weighting backend

use super::score_text;
use crate::models::{ModelProvider, ModelRequest, ScoringModel};
use crate::project::ProjectSettings;
use crate::{Backend, BackendKind};
use async_trait::async_trait;
use std::sync::Arc;
use subindex_core::{Analyzer, Result, SuggestionList, Vocabulary};

/// Scores documents against a tf-idf model; no I/O on the request path
pub struct TfidfBackend {
    analyzer: Analyzer,
    vocabulary: Arc<Vocabulary>,
    model: Arc<dyn ScoringModel>,
}

impl TfidfBackend {
    pub fn new(settings: &ProjectSettings, models: &dyn ModelProvider) -> Result<Self> {
        Ok(Self::with_model(
            settings,
            models.load(&settings.id, &ModelRequest::Tfidf)?,
        ))
    }

    pub fn with_model(settings: &ProjectSettings, model: Arc<dyn ScoringModel>) -> Self {
        Self {
            analyzer: settings.analyzer.clone(),
            vocabulary: Arc::clone(&settings.vocabulary),
            model,
        }
    }
}

#[async_trait]
impl Backend for TfidfBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Tfidf
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
