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

//! Error types shared by every subindex crate

use crate::suggestion::DegradedSource;
use thiserror::Error;

/// Result type for subindex operations
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors that can occur while building the registry or serving suggestions
#[derive(Debug, Error)]
pub enum IndexError {
    // Build-time errors
    #[error("Unsupported analyzer '{analyzer}' for language '{language}'")]
    UnsupportedAnalyzer { language: String, analyzer: String },

    #[error("Ensemble '{ensemble}' references undefined source project '{source_id}'")]
    MissingSource { ensemble: String, source_id: String },

    #[error("Ensemble '{ensemble}' cannot use source '{source_id}': {reason}")]
    IncompatibleSource {
        ensemble: String,
        source_id: String,
        reason: String,
    },

    #[error("Project '{project_id}': language '{expected}' does not match {component} language '{found}'")]
    LanguageMismatch {
        project_id: String,
        component: String,
        expected: String,
        found: String,
    },

    #[error("Duplicate project ID: {0}")]
    DuplicateProject(String),

    #[error("Project '{project_id}': unknown backend '{kind}'")]
    UnknownBackend { project_id: String, kind: String },

    #[error("Project '{project_id}': missing required key '{key}'")]
    MissingKey { project_id: String, key: String },

    #[error("Project '{project_id}': invalid value for '{key}': {reason}")]
    InvalidParameter {
        project_id: String,
        key: String,
        reason: String,
    },

    #[error("Vocabulary '{vocab_id}' not found for language '{language}'")]
    VocabularyNotFound { vocab_id: String, language: String },

    #[error("Model for project '{project_id}' not found: {reason}")]
    ModelNotFound { project_id: String, reason: String },

    #[error("Invalid model for project '{project_id}': {reason}")]
    InvalidModel { project_id: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    // Runtime errors
    #[error("Unknown project: {0}")]
    UnknownProject(String),

    #[error("Backend of project '{project_id}' unavailable: {reason}")]
    BackendUnavailable { project_id: String, reason: String },

    #[error("All {} sources of ensemble '{project_id}' are unavailable", .failures.len())]
    AllSourcesUnavailable {
        project_id: String,
        failures: Vec<DegradedSource>,
    },

    // Registry handle errors
    #[error("Project registry has not been installed")]
    RegistryNotInstalled,

    #[error("Project registry is already installed")]
    RegistryAlreadyInstalled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IndexError {
    /// Whether this error can only arise while building a registry
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            IndexError::UnsupportedAnalyzer { .. }
                | IndexError::MissingSource { .. }
                | IndexError::IncompatibleSource { .. }
                | IndexError::LanguageMismatch { .. }
                | IndexError::DuplicateProject(_)
                | IndexError::UnknownBackend { .. }
                | IndexError::MissingKey { .. }
                | IndexError::InvalidParameter { .. }
                | IndexError::VocabularyNotFound { .. }
                | IndexError::ModelNotFound { .. }
                | IndexError::InvalidModel { .. }
                | IndexError::Config(_)
        )
    }

    /// Whether this error means a backend could not answer a request.
    ///
    /// Ensembles degrade on these instead of failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            IndexError::BackendUnavailable { .. } | IndexError::AllSourcesUnavailable { .. }
        )
    }

    pub fn unavailable(project_id: impl Into<String>, reason: impl Into<String>) -> Self {
        IndexError::BackendUnavailable {
            project_id: project_id.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_parameter(
        project_id: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        IndexError::InvalidParameter {
            project_id: project_id.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = IndexError::MissingSource {
            ensemble: "ensemble-en".to_string(),
            source_id: "nope".to_string(),
        };
        assert!(err.is_build_error());
        assert!(!err.is_unavailable());

        let err = IndexError::unavailable("maui-en", "connection refused");
        assert!(err.is_unavailable());
        assert!(!err.is_build_error());
        assert!(err.to_string().contains("maui-en"));
    }

    #[test]
    fn test_all_sources_message_counts_failures() {
        let err = IndexError::AllSourcesUnavailable {
            project_id: "ensemble-en".to_string(),
            failures: vec![
                DegradedSource::new("a", "timeout"),
                DegradedSource::new("b", "status 500"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "All 2 sources of ensemble 'ensemble-en' are unavailable"
        );
        assert!(err.is_unavailable());
    }
}
