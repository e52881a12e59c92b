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

//! Projects: a language-scoped binding of one backend

use crate::{Backend, BackendKind};
use std::sync::Arc;
use subindex_core::language::normalize_code;
use subindex_core::{
    Analyzer, AnalyzerSpec, EngineConfig, IndexError, ProjectDefinition, Result, SharedVocabularies,
    SourceRef, SuggestionList, Vocabulary,
};
use tracing::debug;

/// Per-request overrides
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SuggestParams {
    /// Overrides the project limit
    pub limit: Option<usize>,

    /// Minimum score to keep
    pub threshold: Option<f64>,
}

impl SuggestParams {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            threshold: None,
        }
    }
}

/// Settings shared by every backend kind, resolved and validated from a
/// project definition
#[derive(Debug, Clone)]
pub struct ProjectSettings {
    pub id: String,
    pub name: String,
    pub language: String,
    pub kind: BackendKind,
    pub vocabulary: Arc<Vocabulary>,
    pub analyzer: Analyzer,
    pub limit: usize,
}

impl ProjectSettings {
    pub fn resolve(
        def: &ProjectDefinition,
        kind: BackendKind,
        vocabularies: &mut SharedVocabularies<'_>,
        engine: &EngineConfig,
    ) -> Result<Self> {
        let language = normalize_code(&def.language);

        let spec = AnalyzerSpec::parse(def.param("analyzer").unwrap_or("simple"), &language)?;
        if spec.language != language {
            return Err(IndexError::LanguageMismatch {
                project_id: def.id.clone(),
                component: "analyzer".to_string(),
                expected: language,
                found: spec.language,
            });
        }
        let analyzer = Analyzer::from_spec(&spec)?;

        let vocabulary = vocabularies.get(&language, &def.vocab)?;
        if normalize_code(vocabulary.language()) != language {
            return Err(IndexError::LanguageMismatch {
                project_id: def.id.clone(),
                component: "vocabulary".to_string(),
                expected: language,
                found: vocabulary.language().to_string(),
            });
        }

        let limit = def.parse_param::<usize>("limit")?.unwrap_or(engine.default_limit);
        if limit == 0 {
            return Err(IndexError::invalid_parameter(&def.id, "limit", "must be positive"));
        }

        Ok(Self {
            id: def.id.clone(),
            name: def.name.clone(),
            language,
            kind,
            vocabulary,
            analyzer,
            limit,
        })
    }
}

/// A named, language-scoped binding of one backend instance
pub struct Project {
    settings: ProjectSettings,
    backend: Box<dyn Backend>,
}

impl Project {
    pub fn new(settings: ProjectSettings, backend: Box<dyn Backend>) -> Self {
        Self { settings, backend }
    }

    pub fn id(&self) -> &str {
        &self.settings.id
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn language(&self) -> &str {
        &self.settings.language
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.settings.vocabulary
    }

    pub fn analyzer(&self) -> &AnalyzerSpec {
        self.settings.analyzer.spec()
    }

    pub fn limit(&self) -> usize {
        self.settings.limit
    }

    /// Declared ensemble sources; empty for other backends
    pub fn sources(&self) -> &[SourceRef] {
        self.backend.sources()
    }

    /// Suggest concepts using the project's own limit
    pub async fn suggest(&self, text: &str) -> Result<SuggestionList> {
        self.suggest_with(text, SuggestParams::default()).await
    }

    pub async fn suggest_with(&self, text: &str, params: SuggestParams) -> Result<SuggestionList> {
        let limit = params.limit.unwrap_or(self.settings.limit);
        if limit == 0 || text.trim().is_empty() {
            return Ok(SuggestionList::empty());
        }

        let mut suggestions = self.backend.suggest(text, limit).await?;
        if let Some(threshold) = params.threshold {
            suggestions = suggestions.with_threshold(threshold);
        }

        debug!(
            "Project {} returned {} suggestions (limit {})",
            self.settings.id,
            suggestions.len(),
            limit
        );
        Ok(suggestions)
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("id", &self.settings.id)
            .field("kind", &self.kind())
            .field("language", &self.settings.language)
            .field("vocabulary", &self.settings.vocabulary.id())
            .field("limit", &self.settings.limit)
            .finish()
    }
}
