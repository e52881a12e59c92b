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

//! Project registry and its two-phase build
//!
//! Pass 1 builds every non-ensemble project. Pass 2 validates ensembles in
//! declaration order: a source must be a pass-1 project or an ensemble
//! declared earlier, so cycles cannot be expressed. Ensembles are then
//! created with a weak reference to the registry that owns them. Any error
//! aborts the whole build.
//!
//! Because ensembles only hold a weak reference, callers that keep a project
//! across a registry reload use a [`ProjectHandle`], which keeps the
//! snapshot the project belongs to alive.

use crate::backends::{self, ensemble::EnsembleBackend, ensemble::EnsembleConfig};
use crate::models::{ModelProvider, PavModel};
use crate::project::{Project, ProjectSettings, SuggestParams};
use crate::BackendKind;
use std::collections::{HashMap, HashSet};
use std::ops::Deref;
use std::sync::Arc;
use subindex_core::{
    EngineConfig, IndexError, ProjectDefinition, Result, SharedVocabularies, SuggestionList,
    VocabularyLoader,
};
use tracing::{debug, info};

/// Collaborators needed to build a registry
#[derive(Clone)]
pub struct RegistryContext {
    pub engine: EngineConfig,
    pub vocabularies: Arc<dyn VocabularyLoader>,
    pub models: Arc<dyn ModelProvider>,
}

impl RegistryContext {
    pub fn new(vocabularies: Arc<dyn VocabularyLoader>, models: Arc<dyn ModelProvider>) -> Self {
        Self {
            engine: EngineConfig::default(),
            vocabularies,
            models,
        }
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

/// Immutable set of resolved projects
pub struct ProjectRegistry {
    projects: HashMap<String, Arc<Project>>,
    order: Vec<String>,
}

struct PendingEnsemble {
    settings: ProjectSettings,
    config: EnsembleConfig,
    calibration: Option<Vec<Arc<PavModel>>>,
}

impl ProjectRegistry {
    /// Build every declared project, failing on the first error
    pub fn build(
        definitions: &[ProjectDefinition],
        context: &RegistryContext,
    ) -> Result<Arc<ProjectRegistry>> {
        let mut seen = HashSet::new();
        let mut kinds = Vec::with_capacity(definitions.len());
        for def in definitions {
            if !seen.insert(def.id.as_str()) {
                return Err(IndexError::DuplicateProject(def.id.clone()));
            }
            let kind = BackendKind::parse(&def.backend).ok_or_else(|| IndexError::UnknownBackend {
                project_id: def.id.clone(),
                kind: def.backend.clone(),
            })?;
            backends::warn_unknown_keys(def, kind);
            kinds.push(kind);
        }

        let mut vocabularies = SharedVocabularies::new(context.vocabularies.as_ref());

        // Pass 1: everything that is not an ensemble
        let mut projects: HashMap<String, Arc<Project>> = HashMap::new();
        for (def, kind) in definitions.iter().zip(&kinds) {
            if kind.is_ensemble() {
                continue;
            }
            let settings = ProjectSettings::resolve(def, *kind, &mut vocabularies, &context.engine)?;
            let backend = backends::build(def, &settings, context)?;
            info!("Registering project: {} ({}, {})", def.name, def.id, kind);
            projects.insert(def.id.clone(), Arc::new(Project::new(settings, backend)));
        }

        // Pass 2: validate ensembles against what exists so far
        let mut known: HashMap<String, (String, String)> = projects
            .values()
            .map(|p| {
                (
                    p.id().to_string(),
                    (p.language().to_string(), p.vocabulary().id().to_string()),
                )
            })
            .collect();
        let mut pending = Vec::new();
        for (def, kind) in definitions.iter().zip(&kinds) {
            if !kind.is_ensemble() {
                continue;
            }
            let settings = ProjectSettings::resolve(def, *kind, &mut vocabularies, &context.engine)?;
            let config = EnsembleConfig::from_definition(def, &context.engine)?;

            for source in &config.sources {
                let (language, vocab) =
                    known
                        .get(&source.project_id)
                        .ok_or_else(|| IndexError::MissingSource {
                            ensemble: def.id.clone(),
                            source_id: source.project_id.clone(),
                        })?;
                let incompatible = |reason: String| IndexError::IncompatibleSource {
                    ensemble: def.id.clone(),
                    source_id: source.project_id.clone(),
                    reason,
                };
                if *language != settings.language {
                    return Err(incompatible(format!(
                        "language '{}' differs from '{}'",
                        language, settings.language
                    )));
                }
                if vocab != settings.vocabulary.id() {
                    return Err(incompatible(format!(
                        "vocabulary '{}' differs from '{}'",
                        vocab,
                        settings.vocabulary.id()
                    )));
                }
            }

            let calibration = if *kind == BackendKind::Pav {
                let models = config
                    .sources
                    .iter()
                    .map(|source| context.models.load_calibration(&def.id, &source.project_id))
                    .collect::<Result<Vec<_>>>()?;
                Some(models)
            } else {
                None
            };

            debug!(
                "Ensemble {} validated with {} sources",
                def.id,
                config.sources.len()
            );
            known.insert(
                def.id.clone(),
                (settings.language.clone(), settings.vocabulary.id().to_string()),
            );
            pending.push(PendingEnsemble {
                settings,
                config,
                calibration,
            });
        }

        let order: Vec<String> = definitions.iter().map(|d| d.id.clone()).collect();
        let registry = Arc::new_cyclic(|weak| {
            for PendingEnsemble {
                settings,
                config,
                calibration,
            } in pending
            {
                info!(
                    "Registering project: {} ({}, {} of {})",
                    settings.name,
                    settings.id,
                    settings.kind,
                    config.sources.len()
                );
                let mut backend = EnsembleBackend::new(
                    settings.id.clone(),
                    config,
                    Arc::clone(&settings.vocabulary),
                    weak.clone(),
                );
                if let Some(models) = calibration {
                    backend = backend.with_calibration(models);
                }
                projects.insert(
                    settings.id.clone(),
                    Arc::new(Project::new(settings, Box::new(backend))),
                );
            }
            ProjectRegistry { projects, order }
        });

        info!("Project registry built with {} projects", registry.len());
        Ok(registry)
    }

    /// Look up a project by id
    pub fn resolve(&self, project_id: &str) -> Result<Arc<Project>> {
        self.projects
            .get(project_id)
            .cloned()
            .ok_or_else(|| IndexError::UnknownProject(project_id.to_string()))
    }

    /// Look up a project and keep this registry alive for as long as the
    /// returned handle lives
    pub fn checkout(self: &Arc<Self>, project_id: &str) -> Result<ProjectHandle> {
        Ok(ProjectHandle {
            project: self.resolve(project_id)?,
            registry: Arc::clone(self),
        })
    }

    /// All projects in declaration order
    pub fn projects(&self) -> Vec<Arc<Project>> {
        self.order
            .iter()
            .filter_map(|id| self.projects.get(id).cloned())
            .collect()
    }

    pub fn project_ids(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, project_id: &str) -> bool {
        self.projects.contains_key(project_id)
    }

    /// Resolve and run a project in one call
    pub async fn suggest(
        &self,
        project_id: &str,
        text: &str,
        params: SuggestParams,
    ) -> Result<SuggestionList> {
        self.resolve(project_id)?.suggest_with(text, params).await
    }
}

/// A project together with the registry snapshot it was resolved from
#[derive(Clone)]
pub struct ProjectHandle {
    project: Arc<Project>,
    registry: Arc<ProjectRegistry>,
}

impl ProjectHandle {
    pub fn project(&self) -> &Arc<Project> {
        &self.project
    }

    pub fn registry(&self) -> &Arc<ProjectRegistry> {
        &self.registry
    }
}

impl Deref for ProjectHandle {
    type Target = Project;

    fn deref(&self) -> &Project {
        &self.project
    }
}

impl std::fmt::Debug for ProjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ProjectHandle").field(&self.project).finish()
    }
}

impl std::fmt::Debug for ProjectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectRegistry")
            .field("projects", &self.order)
            .finish()
    }
}
