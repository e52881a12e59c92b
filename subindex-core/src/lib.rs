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

//! Subindex Core
//!
//! Data model shared by the suggestion engine: concepts and suggestion
//! lists, vocabularies, the analyzer pipeline, project configuration and
//! the error taxonomy.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod language;
pub mod suggestion;
pub mod vocabulary;

pub use analyzer::{analyze, Analyzer, AnalyzerFamily, AnalyzerSpec};
pub use config::{
    parse_sources, EngineConfig, ProjectDefinition, ProjectsFile, SourceRef, DEFAULT_LIMIT,
    ENGINE_TABLE, REQUIRED_KEYS,
};
pub use error::{IndexError, Result};
pub use language::Language;
pub use suggestion::{Concept, DegradedSource, Suggestion, SuggestionList};
pub use vocabulary::{
    FileVocabularyLoader, InMemoryVocabularyLoader, SharedVocabularies, Vocabulary,
    VocabularyLoader,
};
