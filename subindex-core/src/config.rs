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

//! Project configuration
//!
//! Projects are declared in a TOML file, one table per project. The table
//! name is the project id and declaration order is preserved:
//!
//! ```toml
//! [engine]
//! remote_timeout_secs = 10
//!
//! [tfidf-en]
//! name = "TF-IDF English"
//! language = "en"
//! backend = "tfidf"
//! vocab = "yso"
//! analyzer = "snowball(english)"
//! limit = 100
//!
//! [ensemble-en]
//! name = "Ensemble English"
//! language = "en"
//! backend = "ensemble"
//! vocab = "yso"
//! sources = "tfidf-en:2,fasttext-en"
//! ```
//!
//! The `engine` table is reserved for [`EngineConfig`].

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

/// Name of the reserved engine settings table
pub const ENGINE_TABLE: &str = "engine";

/// Keys every project declaration must have
pub const REQUIRED_KEYS: [&str; 4] = ["name", "language", "backend", "vocab"];

/// Default number of suggestions per request
pub const DEFAULT_LIMIT: usize = 100;

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout for a single remote backend call
    pub remote_timeout_secs: u64,

    /// Overall deadline for all sources of one ensemble request
    pub ensemble_timeout_secs: u64,

    /// Result limit for projects that declare none
    pub default_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            remote_timeout_secs: 30,
            ensemble_timeout_secs: 60,
            default_limit: DEFAULT_LIMIT,
        }
    }
}

/// One declared project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDefinition {
    pub id: String,
    pub name: String,
    pub language: String,
    pub backend: String,
    pub vocab: String,

    /// Every other key, values normalized to strings
    pub params: BTreeMap<String, String>,
}

impl ProjectDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        language: impl Into<String>,
        backend: impl Into<String>,
        vocab: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: language.into(),
            backend: backend.into(),
            vocab: vocab.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Parse an optional parameter, failing with `InvalidParameter`
    pub fn parse_param<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.param(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| IndexError::invalid_parameter(&self.id, key, format!("'{}': {}", raw, e))),
        }
    }

    /// Build a definition from one TOML table
    pub fn from_table(id: &str, table: &toml::Table) -> Result<Self> {
        let mut values = BTreeMap::new();
        for (key, value) in table {
            values.insert(key.clone(), normalize_value(id, key, value)?);
        }

        let mut take = |key: &str| {
            values.remove(key).ok_or_else(|| IndexError::MissingKey {
                project_id: id.to_string(),
                key: key.to_string(),
            })
        };
        let name = take("name")?;
        let language = take("language")?;
        let backend = take("backend")?;
        let vocab = take("vocab")?;

        Ok(Self {
            id: id.to_string(),
            name,
            language,
            backend,
            vocab,
            params: values,
        })
    }
}

fn normalize_value(id: &str, key: &str, value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| normalize_value(id, key, item))
            .collect::<Result<Vec<_>>>()
            .map(|parts| parts.join(",")),
        other => Err(IndexError::invalid_parameter(
            id,
            key,
            format!("unsupported value type '{}'", other.type_str()),
        )),
    }
}

/// Parsed projects file
#[derive(Debug, Clone, Default)]
pub struct ProjectsFile {
    pub engine: EngineConfig,
    pub projects: Vec<ProjectDefinition>,
}

impl ProjectsFile {
    pub fn parse(content: &str) -> Result<Self> {
        let document: toml::Table = toml::from_str(content)?;
        let mut file = ProjectsFile::default();

        for (id, value) in document {
            let table = match value {
                toml::Value::Table(table) => table,
                _ => {
                    return Err(IndexError::Config(format!(
                        "top-level key '{}' must be a table",
                        id
                    )))
                }
            };

            if id == ENGINE_TABLE {
                file.engine = toml::Value::Table(table).try_into()?;
            } else {
                file.projects.push(ProjectDefinition::from_table(&id, &table)?);
            }
        }

        Ok(file)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }
}

/// One ensemble source with its weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub project_id: String,
    pub weight: f64,
}

/// Parse an ensemble `sources` value: `id[:weight], id[:weight], ...`
pub fn parse_sources(project_id: &str, value: &str) -> Result<Vec<SourceRef>> {
    let invalid = |reason: String| IndexError::invalid_parameter(project_id, "sources", reason);
    let mut sources: Vec<SourceRef> = Vec::new();

    for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (source_id, weight) = match item.split_once(':') {
            Some((source_id, weight)) => {
                let weight: f64 = weight
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("bad weight in '{}'", item)))?;
                (source_id.trim(), weight)
            }
            None => (item, 1.0),
        };

        if source_id.is_empty() {
            return Err(invalid(format!("empty project id in '{}'", item)));
        }
        if !weight.is_finite() || weight <= 0.0 {
            return Err(invalid(format!("weight of '{}' must be positive", source_id)));
        }
        if sources.iter().any(|s| s.project_id == source_id) {
            return Err(invalid(format!("source '{}' listed twice", source_id)));
        }

        sources.push(SourceRef {
            project_id: source_id.to_string(),
            weight,
        });
    }

    if sources.is_empty() {
        return Err(invalid("no sources declared".to_string()));
    }
    Ok(sources)
}
