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

//! Embedding classifier model
//!
//! A document vector is the mean of the embeddings of its known tokens; each
//! concept has an output vector and its raw score is the dot product, mapped
//! through softmax (`loss = "softmax"`) or a per-concept sigmoid (`ova`,
//! `hs`, `ns`). Long documents are scored in chunks of `chunksize` tokens and
//! the chunk scores averaged.

use super::ScoringModel;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use subindex_core::{IndexError, ProjectDefinition, Result};

/// Parameter keys of the embedding backend
pub const EMBEDDING_KEYS: [&str; 5] = ["dim", "lr", "epoch", "loss", "chunksize"];

/// Tunable embedding parameters, forwarded unchanged to the model provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingParams {
    pub dim: Option<usize>,
    pub lr: Option<f64>,
    pub epoch: Option<usize>,
    pub loss: Option<String>,
    pub chunksize: Option<usize>,
}

impl EmbeddingParams {
    pub fn from_definition(def: &ProjectDefinition) -> Result<Self> {
        Ok(Self {
            dim: def.parse_param("dim")?,
            lr: def.parse_param("lr")?,
            epoch: def.parse_param("epoch")?,
            loss: def.param("loss").map(str::to_string),
            chunksize: def.parse_param("chunksize")?,
        })
    }
}

/// Output activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    Softmax,
    OneVsAll,
}

impl Loss {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "softmax" => Some(Self::Softmax),
            "ova" | "hs" | "ns" => Some(Self::OneVsAll),
            _ => None,
        }
    }
}

/// Serialized embedding tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingModelData {
    pub dim: usize,
    pub words: BTreeMap<String, Vec<f64>>,
    pub concepts: BTreeMap<String, Vec<f64>>,
}

/// Embedding model ready for inference
#[derive(Debug, Clone)]
pub struct EmbeddingModel {
    word_index: HashMap<String, usize>,
    word_vectors: Array2<f64>,
    concept_ids: Vec<String>,
    output: Array2<f64>,
    loss: Loss,
    chunksize: usize,
}

impl EmbeddingModel {
    /// Build the inference matrices, validating them against `params`
    pub fn from_data(project_id: &str, data: &EmbeddingModelData, params: &EmbeddingParams) -> Result<Self> {
        let invalid = |reason: String| IndexError::InvalidModel {
            project_id: project_id.to_string(),
            reason,
        };

        if let Some(dim) = params.dim {
            if dim != data.dim {
                return Err(IndexError::invalid_parameter(
                    project_id,
                    "dim",
                    format!("model has dimension {}, configured {}", data.dim, dim),
                ));
            }
        }
        let loss = match params.loss.as_deref() {
            None => Loss::Softmax,
            Some(name) => Loss::parse(name).ok_or_else(|| {
                IndexError::invalid_parameter(project_id, "loss", format!("unknown loss '{}'", name))
            })?,
        };
        let chunksize = params.chunksize.unwrap_or(1);
        if chunksize == 0 {
            return Err(IndexError::invalid_parameter(project_id, "chunksize", "must be positive"));
        }

        let word_vectors = stack(data.dim, data.words.values())
            .map_err(|e| invalid(format!("word vectors: {}", e)))?;
        let output = stack(data.dim, data.concepts.values())
            .map_err(|e| invalid(format!("concept vectors: {}", e)))?;

        Ok(Self {
            word_index: data
                .words
                .keys()
                .enumerate()
                .map(|(i, w)| (w.clone(), i))
                .collect(),
            word_vectors,
            concept_ids: data.concepts.keys().cloned().collect(),
            output,
            loss,
            chunksize,
        })
    }

    pub fn dim(&self) -> usize {
        self.word_vectors.ncols()
    }

    pub fn loss(&self) -> Loss {
        self.loss
    }

    fn chunk_scores(&self, chunk: &[String]) -> Option<Array1<f64>> {
        let mut doc = Array1::<f64>::zeros(self.dim());
        let mut known = 0usize;
        for token in chunk {
            if let Some(&row) = self.word_index.get(token) {
                doc += &self.word_vectors.row(row);
                known += 1;
            }
        }
        if known == 0 {
            return None;
        }
        doc /= known as f64;

        let logits = self.output.dot(&doc);
        Some(match self.loss {
            Loss::Softmax => {
                let max = logits.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
                let exp = logits.mapv(|v| (v - max).exp());
                let sum = exp.sum();
                exp / sum
            }
            Loss::OneVsAll => logits.mapv(|v| 1.0 / (1.0 + (-v).exp())),
        })
    }
}

fn stack<'a>(dim: usize, rows: impl ExactSizeIterator<Item = &'a Vec<f64>>) -> std::result::Result<Array2<f64>, String> {
    let n = rows.len();
    let mut flat = Vec::with_capacity(n * dim);
    for (i, row) in rows.enumerate() {
        if row.len() != dim {
            return Err(format!("row {} has length {}, expected {}", i, row.len(), dim));
        }
        flat.extend_from_slice(row);
    }
    Array2::from_shape_vec((n, dim), flat).map_err(|e| e.to_string())
}

impl ScoringModel for EmbeddingModel {
    fn score(&self, tokens: &[String]) -> HashMap<String, f64> {
        let mut total = Array1::<f64>::zeros(self.concept_ids.len());
        let mut chunks = 0usize;
        for chunk in tokens.chunks(self.chunksize) {
            if let Some(scores) = self.chunk_scores(chunk) {
                total += &scores;
                chunks += 1;
            }
        }
        if chunks == 0 {
            return HashMap::new();
        }
        total /= chunks as f64;

        self.concept_ids
            .iter()
            .zip(total.iter())
            .map(|(concept, &score)| (concept.clone(), score))
            .collect()
    }
}
