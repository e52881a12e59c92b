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

//! Backend that always suggests the first vocabulary concept

use crate::{Backend, BackendKind};
use async_trait::async_trait;
use std::sync::Arc;
use subindex_core::{Result, SuggestionList, Vocabulary};

pub struct DummyBackend {
    vocabulary: Arc<Vocabulary>,
}

impl DummyBackend {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self { vocabulary }
    }
}

#[async_trait]
impl Backend for DummyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Dummy
    }

    async fn suggest(&self, text: &str, limit: usize) -> Result<SuggestionList> {
        if limit == 0 || text.trim().is_empty() {
            return Ok(SuggestionList::empty());
        }
        let first = self.vocabulary.concepts().next().cloned();
        Ok(SuggestionList::from_scores(
            first.map(|concept| (concept, 1.0)),
            &self.vocabulary,
            limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_concept() {
        let vocab = Vocabulary::from_pairs("yso", "en", [("B", Some("b")), ("A", Some("a"))]);
        let backend = DummyBackend::new(Arc::new(vocab));

        let list = backend.suggest("anything", 10).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.as_slice()[0].concept.as_str(), "A");
        assert_eq!(list.as_slice()[0].label.as_deref(), Some("a"));
        assert!(backend.suggest("anything", 0).await.unwrap().is_empty());
        assert!(backend.suggest("", 10).await.unwrap().is_empty());
        assert!(backend.suggest(" \n\t", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_vocabulary() {
        let backend = DummyBackend::new(Arc::new(Vocabulary::new("empty", "en")));
        assert!(backend.suggest("anything", 10).await.unwrap().is_empty());
    }
}
