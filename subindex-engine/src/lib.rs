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

//! # Subindex Engine
//!
//! Resolves declared projects into runnable classifiers and serves
//! suggestions from them.
//!
//! ## Features
//!
//! - **Trait-based backends**: statistical, embedding, remote and dummy
//!   backends behind one [`Backend`] contract
//! - **Ensembles**: fuse the suggestion lists of other projects with a
//!   weighted mean, degrading gracefully when a source is unavailable;
//!   `pav` ensembles first calibrate each source with isotonic regression
//!   models
//! - **Two-phase registry build**: misconfiguration fails at startup, never
//!   at the first request
//! - **Process-wide handle**: install once, reload by atomic swap
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use subindex_core::{FileVocabularyLoader, ProjectsFile};
//! use subindex_engine::{FileModelProvider, ProjectRegistry, RegistryContext};
//!
//! #[tokio::main]
//! async fn main() {
//!     let file = ProjectsFile::load("projects.toml").unwrap();
//!     let context = RegistryContext::new(
//!         Arc::new(FileVocabularyLoader::new("data/vocabs")),
//!         Arc::new(FileModelProvider::new("data")),
//!     )
//!     .with_engine(file.engine.clone());
//!
//!     let registry = ProjectRegistry::build(&file.projects, &context).unwrap();
//!     subindex_engine::global::install(registry).unwrap();
//!
//!     // The handle keeps its registry snapshot alive across a reload
//!     let project = subindex_engine::global::resolve("ensemble-en").unwrap();
//!     let suggestions = project.suggest("A history of apple cultivation").await.unwrap();
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use subindex_core::{Result, SourceRef, SuggestionList};

pub mod backends;
pub mod global;
pub mod models;
pub mod project;
pub mod registry;

pub use backends::ensemble::fuse;
pub use models::{
    Calibrator, EmbeddingModel, EmbeddingModelData, EmbeddingParams, FileModelProvider,
    InMemoryModelProvider, ModelProvider, ModelRequest, PavModel, ScoringModel, TfidfModel,
};
pub use project::{Project, SuggestParams};
pub use registry::{ProjectHandle, ProjectRegistry, RegistryContext};

/// Core trait that all backends implement
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Suggest at most `limit` concepts for `text`.
    ///
    /// Empty text and a zero limit yield an empty list. Unavailability of
    /// an external collaborator is an error, never an empty list.
    async fn suggest(&self, text: &str, limit: usize) -> Result<SuggestionList>;

    /// Source projects of a combining backend, in declaration order
    fn sources(&self) -> &[SourceRef] {
        &[]
    }
}

/// Backend variants selectable with the `backend` key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Tfidf,
    Fasttext,
    Http,
    Ensemble,
    Pav,
    Dummy,
}

impl BackendKind {
    /// Parse a backend name; `maui` is accepted for the remote backend
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "tfidf" => Some(Self::Tfidf),
            "fasttext" => Some(Self::Fasttext),
            "http" | "maui" => Some(Self::Http),
            "ensemble" => Some(Self::Ensemble),
            "pav" => Some(Self::Pav),
            "dummy" => Some(Self::Dummy),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Tfidf => "tfidf",
            Self::Fasttext => "fasttext",
            Self::Http => "http",
            Self::Ensemble => "ensemble",
            Self::Pav => "pav",
            Self::Dummy => "dummy",
        }
    }

    /// Whether projects of this kind combine other projects
    pub fn is_ensemble(&self) -> bool {
        matches!(self, Self::Ensemble | Self::Pav)
    }

    pub fn all() -> &'static [BackendKind] {
        &[
            Self::Tfidf,
            Self::Fasttext,
            Self::Http,
            Self::Ensemble,
            Self::Pav,
            Self::Dummy,
        ]
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        for kind in BackendKind::all() {
            assert_eq!(BackendKind::parse(kind.name()), Some(*kind));
        }
        assert_eq!(BackendKind::parse("maui"), Some(BackendKind::Http));
        assert_eq!(BackendKind::parse(" TFIDF "), Some(BackendKind::Tfidf));
        assert_eq!(BackendKind::parse("omikuji"), None);
        assert!(BackendKind::Pav.is_ensemble());
        assert!(!BackendKind::Http.is_ensemble());
    }

    #[test]
    fn test_backend_kind_serde() {
        let json = serde_json::to_string(&BackendKind::Fasttext).unwrap();
        assert_eq!(json, "\"fasttext\"");
    }
}
