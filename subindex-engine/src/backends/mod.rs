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

//! Backend implementations and their construction from project definitions

pub mod dummy;
pub mod ensemble;
pub mod fasttext;
pub mod http;
pub mod tfidf;

use crate::models::{ScoringModel, EMBEDDING_KEYS};
use crate::project::ProjectSettings;
use crate::registry::RegistryContext;
use crate::{Backend, BackendKind};
use std::time::Duration;
use subindex_core::{Analyzer, IndexError, ProjectDefinition, Result, SuggestionList, Vocabulary};
use tracing::warn;

/// Keys understood by every backend kind
const COMMON_KEYS: [&str; 2] = ["analyzer", "limit"];

/// Backend-specific keys
pub fn known_keys(kind: BackendKind) -> &'static [&'static str] {
    match kind {
        BackendKind::Tfidf | BackendKind::Dummy => &[],
        BackendKind::Fasttext => &EMBEDDING_KEYS,
        BackendKind::Http => &http::HTTP_KEYS,
        BackendKind::Ensemble | BackendKind::Pav => &ensemble::ENSEMBLE_KEYS,
    }
}

/// Warn about keys the backend kind does not use; they are otherwise ignored
pub fn warn_unknown_keys(def: &ProjectDefinition, kind: BackendKind) -> usize {
    let specific = known_keys(kind);
    let mut unknown = 0;
    for key in def.params.keys() {
        if !COMMON_KEYS.contains(&key.as_str()) && !specific.contains(&key.as_str()) {
            warn!(
                "Project {}: ignoring key '{}' not used by the {} backend",
                def.id, key, kind
            );
            unknown += 1;
        }
    }
    unknown
}

/// Build the backend of a non-ensemble project
pub fn build(
    def: &ProjectDefinition,
    settings: &ProjectSettings,
    context: &RegistryContext,
) -> Result<Box<dyn Backend>> {
    let backend: Box<dyn Backend> = match settings.kind {
        BackendKind::Tfidf => Box::new(tfidf::TfidfBackend::new(settings, context.models.as_ref())?),
        BackendKind::Fasttext => Box::new(fasttext::FasttextBackend::new(
            def,
            settings,
            context.models.as_ref(),
        )?),
        BackendKind::Http => Box::new(http::HttpBackend::new(def, settings, &context.engine)?),
        BackendKind::Dummy => Box::new(dummy::DummyBackend::new(settings.vocabulary.clone())),
        BackendKind::Ensemble | BackendKind::Pav => {
            return Err(IndexError::Config(format!(
                "{} project '{}' must be built after its sources",
                settings.kind, def.id
            )))
        }
    };
    Ok(backend)
}

/// Parse a `timeout` parameter in seconds, falling back to `default_secs`
pub fn parse_timeout(def: &ProjectDefinition, default_secs: u64) -> Result<Duration> {
    match def.parse_param::<f64>("timeout")? {
        None => Ok(Duration::from_secs(default_secs)),
        Some(secs) if secs.is_finite() && secs > 0.0 => Ok(Duration::from_secs_f64(secs)),
        Some(secs) => Err(IndexError::invalid_parameter(
            &def.id,
            "timeout",
            format!("{} is not a positive number of seconds", secs),
        )),
    }
}

/// Analyze, score and filter: the request path of model-backed projects
pub(crate) fn score_text(
    analyzer: &Analyzer,
    model: &dyn ScoringModel,
    vocabulary: &Vocabulary,
    text: &str,
    limit: usize,
) -> SuggestionList {
    let tokens = analyzer.analyze(text);
    if tokens.is_empty() || limit == 0 {
        return SuggestionList::empty();
    }
    SuggestionList::from_scores(model.score(&tokens), vocabulary, limit)
}
