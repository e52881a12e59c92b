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

//! Trained models and the providers that load them
//!
//! Backends never look inside a model: they analyze the text, hand the
//! tokens to a [`ScoringModel`] and turn the raw scores into a
//! [`SuggestionList`](subindex_core::SuggestionList).

pub mod embedding;
pub mod pav;
pub mod tfidf;

pub use embedding::{EmbeddingModel, EmbeddingModelData, EmbeddingParams, Loss, EMBEDDING_KEYS};
pub use pav::{Calibrator, PavModel};
pub use tfidf::TfidfModel;

use crate::BackendKind;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use subindex_core::{IndexError, Result};
use tracing::{debug, info};

/// A loaded model that maps analyzed tokens to raw concept scores
pub trait ScoringModel: Send + Sync {
    fn score(&self, tokens: &[String]) -> HashMap<String, f64>;
}

/// What a backend asks its provider for
#[derive(Debug, Clone, PartialEq)]
pub enum ModelRequest {
    Tfidf,
    Embedding(EmbeddingParams),
}

impl ModelRequest {
    pub fn kind(&self) -> BackendKind {
        match self {
            ModelRequest::Tfidf => BackendKind::Tfidf,
            ModelRequest::Embedding(_) => BackendKind::Fasttext,
        }
    }

    fn file_name(&self) -> String {
        format!("{}-model.json", self.kind().name())
    }
}

/// Source of trained models
pub trait ModelProvider: Send + Sync {
    fn load(&self, project_id: &str, request: &ModelRequest) -> Result<Arc<dyn ScoringModel>>;

    /// Calibration of the scores of `source_id` inside the `pav` project
    /// `project_id`
    fn load_calibration(&self, project_id: &str, source_id: &str) -> Result<Arc<PavModel>>;
}

#[derive(Clone)]
enum StoredModel {
    Tfidf(Arc<TfidfModel>),
    Embedding(Arc<EmbeddingModelData>),
    Scoring(Arc<dyn ScoringModel>),
}

/// Models registered in memory, keyed by project and backend kind
#[derive(Default)]
pub struct InMemoryModelProvider {
    models: RwLock<HashMap<(String, BackendKind), StoredModel>>,
    calibrations: RwLock<HashMap<(String, String), Arc<PavModel>>>,
}

impl InMemoryModelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tfidf(&self, project_id: impl Into<String>, model: TfidfModel) {
        self.models
            .write()
            .insert((project_id.into(), BackendKind::Tfidf), StoredModel::Tfidf(Arc::new(model)));
    }

    pub fn insert_embedding(&self, project_id: impl Into<String>, data: EmbeddingModelData) {
        self.models.write().insert(
            (project_id.into(), BackendKind::Fasttext),
            StoredModel::Embedding(Arc::new(data)),
        );
    }

    /// Register an arbitrary scoring model for `kind`
    pub fn insert_scoring(
        &self,
        project_id: impl Into<String>,
        kind: BackendKind,
        model: Arc<dyn ScoringModel>,
    ) {
        self.models
            .write()
            .insert((project_id.into(), kind), StoredModel::Scoring(model));
    }

    pub fn insert_calibration(
        &self,
        project_id: impl Into<String>,
        source_id: impl Into<String>,
        model: PavModel,
    ) {
        self.calibrations
            .write()
            .insert((project_id.into(), source_id.into()), Arc::new(model));
    }
}

impl ModelProvider for InMemoryModelProvider {
    fn load(&self, project_id: &str, request: &ModelRequest) -> Result<Arc<dyn ScoringModel>> {
        let stored = self
            .models
            .read()
            .get(&(project_id.to_string(), request.kind()))
            .cloned()
            .ok_or_else(|| IndexError::ModelNotFound {
                project_id: project_id.to_string(),
                reason: format!("no {} model registered", request.kind()),
            })?;

        match (stored, request) {
            (StoredModel::Tfidf(model), _) => Ok(model),
            (StoredModel::Scoring(model), _) => Ok(model),
            (StoredModel::Embedding(data), ModelRequest::Embedding(params)) => {
                Ok(Arc::new(EmbeddingModel::from_data(project_id, &data, params)?))
            }
            (StoredModel::Embedding(_), ModelRequest::Tfidf) => Err(IndexError::InvalidModel {
                project_id: project_id.to_string(),
                reason: "embedding data registered for a tfidf project".to_string(),
            }),
        }
    }

    fn load_calibration(&self, project_id: &str, source_id: &str) -> Result<Arc<PavModel>> {
        self.calibrations
            .read()
            .get(&(project_id.to_string(), source_id.to_string()))
            .cloned()
            .ok_or_else(|| IndexError::ModelNotFound {
                project_id: project_id.to_string(),
                reason: format!("no PAV model registered for source {}", source_id),
            })
    }
}

/// Loads JSON models from `<datadir>/projects/<project-id>/<kind>-model.json`
#[derive(Debug, Clone)]
pub struct FileModelProvider {
    datadir: PathBuf,
}

impl FileModelProvider {
    pub fn new(datadir: impl Into<PathBuf>) -> Self {
        Self {
            datadir: datadir.into(),
        }
    }

    pub fn datadir(&self) -> &Path {
        &self.datadir
    }

    pub fn path_for(&self, project_id: &str, request: &ModelRequest) -> PathBuf {
        self.datadir
            .join("projects")
            .join(project_id)
            .join(request.file_name())
    }

    pub fn calibration_path(&self, project_id: &str, source_id: &str) -> PathBuf {
        self.datadir
            .join("projects")
            .join(project_id)
            .join(format!("pav-model-{}.json", source_id))
    }
}

impl ModelProvider for FileModelProvider {
    fn load(&self, project_id: &str, request: &ModelRequest) -> Result<Arc<dyn ScoringModel>> {
        let path = self.path_for(project_id, request);
        debug!("Loading model for {} from {}", project_id, path.display());

        let content = std::fs::read_to_string(&path).map_err(|e| IndexError::ModelNotFound {
            project_id: project_id.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })?;
        let invalid = |e: serde_json::Error| IndexError::InvalidModel {
            project_id: project_id.to_string(),
            reason: e.to_string(),
        };

        let model: Arc<dyn ScoringModel> = match request {
            ModelRequest::Tfidf => {
                let model = TfidfModel::from_json(&content).map_err(invalid)?;
                info!(
                    "Loaded tfidf model for {} ({} concepts, {} terms)",
                    project_id,
                    model.num_concepts(),
                    model.num_terms()
                );
                Arc::new(model)
            }
            ModelRequest::Embedding(params) => {
                let data: EmbeddingModelData = serde_json::from_str(&content).map_err(invalid)?;
                let model = EmbeddingModel::from_data(project_id, &data, params)?;
                info!("Loaded embedding model for {} (dim {})", project_id, model.dim());
                Arc::new(model)
            }
        };
        Ok(model)
    }

    fn load_calibration(&self, project_id: &str, source_id: &str) -> Result<Arc<PavModel>> {
        let path = self.calibration_path(project_id, source_id);
        debug!("Loading PAV model for {} from {}", project_id, path.display());

        let content = std::fs::read_to_string(&path).map_err(|e| IndexError::ModelNotFound {
            project_id: project_id.to_string(),
            reason: format!("PAV model {}: {}", path.display(), e),
        })?;
        let model: PavModel =
            serde_json::from_str(&content).map_err(|e| IndexError::InvalidModel {
                project_id: project_id.to_string(),
                reason: format!("PAV model for source {}: {}", source_id, e),
            })?;

        info!(
            "Loaded PAV model for {} source {} ({} concepts)",
            project_id,
            source_id,
            model.len()
        );
        Ok(Arc::new(model))
    }
}
